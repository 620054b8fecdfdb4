/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/job_watcher.rs
 *
 * JobWatcher: observes engine-created Jobs and reflects their outcome back
 * onto the owning Operarius's status, the same `update_status`-shaped patch
 * `autoheal_controller::update_status` performs after a runbook Job is
 * created, run continuously off a Job watch instead of once per webhook
 * call.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use futures::StreamExt;
use kube::ResourceExt;
use kube_runtime::watcher::Event;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::gateway::ClusterGateway;
use crate::live_hub::LiveUpdateHub;
use crate::rule_cache::RuleCache;
use crate::types::{reserved_labels, ExecutionStatus};

pub struct JobWatcher {
    namespace: String,
    gateway: Arc<dyn ClusterGateway>,
    rule_cache: Arc<RuleCache>,
    live_hub: Arc<LiveUpdateHub>,
}

impl JobWatcher {
    pub fn new(
        namespace: String,
        gateway: Arc<dyn ClusterGateway>,
        rule_cache: Arc<RuleCache>,
        live_hub: Arc<LiveUpdateHub>,
    ) -> Self {
        Self {
            namespace,
            gateway,
            rule_cache,
            live_hub,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let selector = format!(
            "{}={}",
            reserved_labels::MANAGED_BY,
            reserved_labels::MANAGED_BY_VALUE
        );
        let mut stream = self.gateway.watch_jobs(&self.namespace, &selector);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => self.handle_event(event).await,
                        Some(Err(err)) => warn!(error = %err, "job watch error, will retry on re-delivery"),
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: Event<k8s_openapi::api::batch::v1::Job>) {
        match event {
            Event::Apply(job) | Event::InitApply(job) => self.handle_job(job).await,
            Event::Init | Event::InitDone | Event::Delete(_) => {}
        }
    }

    async fn handle_job(&self, job: k8s_openapi::api::batch::v1::Job) {
        let Some(labels) = job.metadata.labels.as_ref() else {
            return;
        };
        let Some(rule_name) = labels.get(reserved_labels::OPERARIUS) else {
            return;
        };
        let Some(mut rule) = self.rule_cache.get(rule_name) else {
            debug!(rule = %rule_name, "job references unknown operarius, ignoring");
            return;
        };

        let new_status = compute_execution_status(&job);
        let current_status = rule
            .status
            .as_ref()
            .and_then(|s| s.last_execution_status.clone());

        if current_status.as_ref() != Some(&new_status)
            && matches!(new_status, ExecutionStatus::Successful | ExecutionStatus::Failed)
        {
            let mut status = rule.status.clone().unwrap_or_default();
            status.last_execution_status = Some(new_status.clone());
            rule.status = Some(status);
            if let Err(err) = self.gateway.update_operarius_status(&rule).await {
                warn!(rule = %rule_name, error = %err, "failed to persist job status, will retry next event");
            }
        }

        self.live_hub
            .publish(
                "operarius_update",
                serde_json::json!({
                    "operarius": rule_name,
                    "jobName": job.name_any(),
                    "lastExecutionStatus": new_status.to_string(),
                }),
            )
            .await;
    }
}

/// Derives `lastExecutionStatus` from a Job's status counters.
fn compute_execution_status(job: &k8s_openapi::api::batch::v1::Job) -> ExecutionStatus {
    let Some(status) = &job.status else {
        return ExecutionStatus::Pending;
    };
    if status.succeeded.unwrap_or(0) >= 1 {
        ExecutionStatus::Successful
    } else if status.failed.unwrap_or(0) >= 1 {
        ExecutionStatus::Failed
    } else if status.active.unwrap_or(0) >= 1 {
        ExecutionStatus::Running
    } else {
        ExecutionStatus::Pending
    }
}
