/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/orchestrator.rs
 *
 * RemediationOrchestrator: the top-level pipeline wiring RuleCache,
 * RuleMatcher, Deduplicator, JobBuilder, ClusterGateway and the two
 * observability sinks (AlertStore, LiveUpdateHub) together. Structured the
 * same way `process_rule` drives a rule from webhook receipt through Job
 * creation and status update, expanded to the full
 * match/dedup/build/create/record pipeline.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use kube::ResourceExt;
use tracing::{info, instrument, warn};

use crate::alert_store::AlertStore;
use crate::crds::{Operarius, StatusCondition};
use crate::dedup;
use crate::gateway::ClusterGateway;
use crate::job_builder;
use crate::live_hub::LiveUpdateHub;
use crate::matcher::select_rule;
use crate::rule_cache::RuleCache;
use crate::types::{AlertStoreEntry, ExecutionStatus, HookMessage, JobInfo};

pub struct RemediationOrchestrator {
    namespace: String,
    gateway: Arc<dyn ClusterGateway>,
    rule_cache: Arc<RuleCache>,
    alert_store: Arc<AlertStore>,
    live_hub: Arc<LiveUpdateHub>,
    created_count: AtomicU64,
    failed_count: AtomicU64,
}

impl RemediationOrchestrator {
    pub fn new(
        namespace: String,
        gateway: Arc<dyn ClusterGateway>,
        rule_cache: Arc<RuleCache>,
        alert_store: Arc<AlertStore>,
        live_hub: Arc<LiveUpdateHub>,
    ) -> Self {
        Self {
            namespace,
            gateway,
            rule_cache,
            alert_store,
            live_hub,
            created_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub fn created_count(&self) -> u64 {
        self.created_count.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::SeqCst)
    }

    /// Drives a single webhook payload through match → dedup → build →
    /// create → status-update → record. These steps always run in this
    /// order within one call, though two concurrent calls may interleave.
    #[instrument(skip(self, hook), fields(group_key = %hook.group_key, status = %hook.status))]
    pub async fn handle(&self, hook: HookMessage) {
        let rules = self.rule_cache.list();

        let rule = match select_rule(&hook, &rules) {
            Ok(rule) => rule.clone(),
            Err(err) => {
                info!(error = %err, "no rule matched incoming alert");
                self.record(&hook, None).await;
                return;
            }
        };

        let should_create =
            dedup::should_create(&rule, &hook.group_key, &self.namespace, self.gateway.as_ref())
                .await;

        if !should_create {
            info!(rule = %rule.name_any(), "deduplicated, skipping job creation");
            let job_info = self.deduplicated_job_info(&rule);
            self.record(&hook, Some(job_info)).await;
            return;
        }

        let job = match job_builder::build(&rule, &hook) {
            Ok(job) => job,
            Err(err) => {
                warn!(rule = %rule.name_any(), error = %err, "failed to build job");
                self.failed_count.fetch_add(1, Ordering::SeqCst);
                self.record(&hook, None).await;
                return;
            }
        };

        let created = match self.gateway.create_job(&job, &self.namespace).await {
            Ok(created) => created,
            Err(err) => {
                warn!(rule = %rule.name_any(), error = %err, "failed to create job");
                self.failed_count.fetch_add(1, Ordering::SeqCst);
                self.record(&hook, None).await;
                return;
            }
        };

        self.created_count.fetch_add(1, Ordering::SeqCst);
        let updated_rule = self.update_rule_status_after_create(rule, &created).await;
        let job_info = self.job_info_from_created(&updated_rule, &created);
        self.record(&hook, Some(job_info)).await;
    }

    fn deduplicated_job_info(&self, rule: &Operarius) -> JobInfo {
        let status = rule.status.clone().unwrap_or_default();
        JobInfo {
            operarius_name: rule.name_any(),
            job_name: "N/A (Deduplicated)".to_string(),
            namespace: self.namespace.clone(),
            image: None,
            execution_count: status.execution_count,
            last_execution_time: status.last_execution_time.unwrap_or_else(Utc::now),
            last_executed_job_name: status.last_executed_job_name.unwrap_or_default(),
            last_execution_status: ExecutionStatus::SkippedDeduplication,
        }
    }

    async fn update_rule_status_after_create(
        &self,
        mut rule: Operarius,
        created: &k8s_openapi::api::batch::v1::Job,
    ) -> Operarius {
        let job_name = created.name_any();
        let mut status = rule.status.clone().unwrap_or_default();
        status.execution_count += 1;
        status.last_execution_time = Some(Utc::now());
        status.last_executed_job_name = Some(job_name.clone());
        status.last_execution_status = Some(ExecutionStatus::Pending);
        status.conditions.push(StatusCondition::ready(
            "JobCreated",
            &format!("created remediation job '{job_name}'"),
        ));
        rule.status = Some(status);

        if let Err(err) = self.gateway.update_operarius_status(&rule).await {
            warn!(rule = %rule.name_any(), error = %err, "status update failed, continuing");
        }
        rule
    }

    fn job_info_from_created(
        &self,
        rule: &Operarius,
        created: &k8s_openapi::api::batch::v1::Job,
    ) -> JobInfo {
        let status = rule.status.clone().unwrap_or_default();
        let image = created
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.containers.first())
            .and_then(|c| c.image.clone());
        JobInfo {
            operarius_name: rule.name_any(),
            job_name: created.name_any(),
            namespace: self.namespace.clone(),
            image,
            execution_count: status.execution_count,
            last_execution_time: status.last_execution_time.unwrap_or_else(Utc::now),
            last_executed_job_name: status.last_executed_job_name.unwrap_or_default(),
            last_execution_status: ExecutionStatus::Pending,
        }
    }

    async fn record(&self, hook: &HookMessage, job_info: Option<JobInfo>) {
        for alert in &hook.alerts {
            self.alert_store
                .save(alert.clone(), hook.status, job_info.clone())
                .await;
            let entry = AlertStoreEntry {
                alert: alert.clone(),
                status: hook.status,
                ingested_at: Utc::now(),
                job_info: job_info.clone(),
            };
            let payload = serde_json::to_value(&entry).unwrap_or(serde_json::Value::Null);
            self.live_hub.publish("alert", payload).await;
        }
    }
}
