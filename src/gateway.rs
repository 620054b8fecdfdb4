/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/gateway.rs
 *
 * The ClusterGateway capability set: the small interface the core calls
 * through instead of depending on `kube` directly everywhere. `KubeGateway`
 * is the production implementation; `FakeGateway` is an in-memory stand-in
 * used by the component/orchestrator tests — the core has no transitive
 * dependency on a live cluster to be exercised.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use kube_runtime::watcher;

use crate::crds::Operarius;
use crate::error::Error;

#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_operarii(&self, namespace: &str) -> Result<Vec<Operarius>, Error>;
    async fn get_operarius(&self, name: &str, namespace: &str) -> Result<Operarius, Error>;
    async fn update_operarius_status(&self, op: &Operarius) -> Result<(), Error>;
    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, Error>;
    async fn get_job(&self, name: &str, namespace: &str) -> Result<Job, Error>;
    async fn create_job(&self, job: &Job, namespace: &str) -> Result<Job, Error>;
    /// Best-effort cluster reachability probe, used by GET /readiness.
    async fn server_version(&self) -> Result<String, Error>;
    /// Backs RuleCache's watch loop. Re-establishes on disconnect is the
    /// watcher's own job; callers just keep polling the stream.
    fn watch_operarii(&self, namespace: &str) -> BoxStream<'static, watcher::Result<watcher::Event<Operarius>>>;
    /// Backs JobWatcher, filtered to Jobs carrying `selector`.
    fn watch_jobs(
        &self,
        namespace: &str,
        selector: &str,
    ) -> BoxStream<'static, watcher::Result<watcher::Event<Job>>>;
}

/// Production wiring: a thin wrapper over `kube::Client`, using the same
/// `Api::namespaced` / `PatchParams::apply(...).force()` idiom as the
/// cluster controllers elsewhere in this codebase.
pub struct KubeGateway {
    client: Client,
    field_manager: &'static str,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: "openfero",
        }
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_operarii(&self, namespace: &str) -> Result<Vec<Operarius>, Error> {
        let api: Api<Operarius> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_operarius(&self, name: &str, namespace: &str) -> Result<Operarius, Error> {
        let api: Api<Operarius> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn update_operarius_status(&self, op: &Operarius) -> Result<(), Error> {
        let namespace = op.namespace().ok_or_else(|| {
            Error::StatusUpdate("operarius resource has no namespace".to_string())
        })?;
        let api: Api<Operarius> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({
            "apiVersion": "openfero.io/v1alpha1",
            "kind": "Operarius",
            "status": op.status,
        });
        let ps = PatchParams::apply(self.field_manager).force();
        api.patch_status(&op.name_any(), &ps, &Patch::Apply(&patch))
            .await
            .map_err(|e| Error::StatusUpdate(e.to_string()))?;
        Ok(())
    }

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, Error> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(selector);
        let list = api.list(&lp).await?;
        Ok(list.items)
    }

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Job, Error> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create_job(&self, job: &Job, namespace: &str) -> Result<Job, Error> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), job).await?)
    }

    async fn server_version(&self) -> Result<String, Error> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    fn watch_operarii(&self, namespace: &str) -> BoxStream<'static, watcher::Result<watcher::Event<Operarius>>> {
        use futures::StreamExt;
        let api: Api<Operarius> = Api::namespaced(self.client.clone(), namespace);
        kube_runtime::watcher(api, watcher::Config::default()).boxed()
    }

    fn watch_jobs(
        &self,
        namespace: &str,
        selector: &str,
    ) -> BoxStream<'static, watcher::Result<watcher::Event<Job>>> {
        use futures::StreamExt;
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let config = watcher::Config::default().labels(selector);
        kube_runtime::watcher(api, config).boxed()
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// In-memory ClusterGateway used by component and orchestrator tests.
    #[derive(Default)]
    pub struct FakeGateway {
        pub operarii: Mutex<Vec<Operarius>>,
        pub jobs: Mutex<Vec<Job>>,
        pub create_job_calls: Mutex<u32>,
        pub fail_create_job: Mutex<bool>,
        pub fail_list_jobs: Mutex<bool>,
    }

    impl FakeGateway {
        pub fn with_rules(rules: Vec<Operarius>) -> Self {
            Self {
                operarii: Mutex::new(rules),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ClusterGateway for FakeGateway {
        async fn list_operarii(&self, namespace: &str) -> Result<Vec<Operarius>, Error> {
            Ok(self
                .operarii
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.namespace().as_deref() == Some(namespace))
                .cloned()
                .collect())
        }

        async fn get_operarius(&self, name: &str, namespace: &str) -> Result<Operarius, Error> {
            self.operarii
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.name_any() == name && o.namespace().as_deref() == Some(namespace))
                .cloned()
                .ok_or_else(|| Error::StatusUpdate(format!("operarius '{name}' not found")))
        }

        async fn update_operarius_status(&self, op: &Operarius) -> Result<(), Error> {
            let mut rules = self.operarii.lock().unwrap();
            if let Some(existing) = rules
                .iter_mut()
                .find(|o| o.name_any() == op.name_any() && o.namespace() == op.namespace())
            {
                existing.status = op.status.clone();
            }
            Ok(())
        }

        async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, Error> {
            if *self.fail_list_jobs.lock().unwrap() {
                return Err(Error::Cluster("simulated cluster failure".to_string()));
            }
            let wanted: std::collections::BTreeMap<&str, &str> = selector
                .split(',')
                .filter_map(|pair| pair.split_once('='))
                .collect();
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.namespace().as_deref() == Some(namespace))
                .filter(|j| {
                    let labels = j.metadata.labels.clone().unwrap_or_default();
                    wanted
                        .iter()
                        .all(|(k, v)| labels.get(*k).map(String::as_str) == Some(*v))
                })
                .cloned()
                .collect())
        }

        async fn get_job(&self, name: &str, namespace: &str) -> Result<Job, Error> {
            self.jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.name_any() == name && j.namespace().as_deref() == Some(namespace))
                .cloned()
                .ok_or_else(|| Error::StatusUpdate(format!("job '{name}' not found")))
        }

        async fn create_job(&self, job: &Job, namespace: &str) -> Result<Job, Error> {
            *self.create_job_calls.lock().unwrap() += 1;
            if *self.fail_create_job.lock().unwrap() {
                return Err(Error::Cluster("simulated cluster failure".to_string()));
            }
            let mut created = job.clone();
            let generated = format!(
                "{}{}",
                created
                    .metadata
                    .generate_name
                    .clone()
                    .unwrap_or_else(|| "job-".to_string()),
                self.create_job_calls.lock().unwrap()
            );
            created.metadata.name = Some(generated);
            created.metadata.namespace = Some(namespace.to_string());
            self.jobs.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn server_version(&self) -> Result<String, Error> {
            Ok("fake-v0".to_string())
        }

        fn watch_operarii(
            &self,
            _namespace: &str,
        ) -> BoxStream<'static, watcher::Result<watcher::Event<Operarius>>> {
            use futures::StreamExt;
            // Tests exercise RuleCache/JobWatcher by driving a reflector
            // Writer directly; FakeGateway never needs to emit real events.
            futures::stream::empty().boxed()
        }

        fn watch_jobs(
            &self,
            _namespace: &str,
            _selector: &str,
        ) -> BoxStream<'static, watcher::Result<watcher::Event<Job>>> {
            use futures::StreamExt;
            futures::stream::empty().boxed()
        }
    }
}
