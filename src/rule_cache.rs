/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/rule_cache.rs
 *
 * RuleCache: a namespace-scoped, watch-synchronized cache of Operarius
 * resources. Adapts the hand-rolled `Arc<RwLock<HashMap<...>>>` rule cache
 * (`autoheal_controller::Context::rules_cache`) into the reflector-backed
 * `Store<Operarius>` kube-runtime itself recommends for read-mostly caches
 * that need the full ordered list, not just single-key lookup.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use futures::StreamExt;
use kube::ResourceExt;
use kube_runtime::reflector::{self, Store};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::crds::Operarius;
use crate::gateway::ClusterGateway;

pub struct RuleCache {
    store: Store<Operarius>,
}

impl RuleCache {
    /// Performs an initial LIST (via the watch stream's init events) and
    /// spawns the long-running watch loop; resolves once the initial sync
    /// completes. On watch disconnect the underlying stream transparently
    /// re-lists; `list()`/`get()` keep serving the last-good snapshot during
    /// the gap.
    pub async fn initialize(
        gateway: Arc<dyn ClusterGateway>,
        namespace: String,
        cancel: CancellationToken,
    ) -> Self {
        let (store, writer) = reflector::store();
        let raw = gateway.watch_operarii(&namespace);
        let mut reflected = Box::pin(reflector::reflector(writer, raw));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = reflected.next() => {
                        match next {
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(namespace = %namespace, error = %err, "operarius watch error, retrying");
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        store.wait_until_ready().await.ok();
        Self { store }
    }

    #[cfg(test)]
    pub fn from_store(store: Store<Operarius>) -> Self {
        Self { store }
    }

    /// Test-only convenience: seeds a store directly from a fixed rule list,
    /// bypassing the watch machinery entirely.
    #[cfg(test)]
    pub fn from_rules(rules: Vec<Operarius>) -> Self {
        use kube_runtime::watcher::Event;
        let (store, mut writer) = reflector::store();
        writer.apply_watcher_event(&Event::Init);
        for rule in rules {
            writer.apply_watcher_event(&Event::InitApply(rule));
        }
        writer.apply_watcher_event(&Event::InitDone);
        Self { store }
    }

    /// In-memory snapshot, stable-ordered by name so priority ties resolve
    /// deterministically in RuleMatcher.
    pub fn list(&self) -> Vec<Operarius> {
        let mut items: Vec<Operarius> = self.store.state().iter().map(|r| (**r).clone()).collect();
        items.sort_by(|a, b| a.name_any().cmp(&b.name_any()));
        items
    }

    pub fn get(&self, name: &str) -> Option<Operarius> {
        self.store
            .state()
            .iter()
            .find(|r| r.name_any() == name)
            .map(|r| (**r).clone())
    }
}
