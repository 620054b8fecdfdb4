/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/dedup.rs
 *
 * Deduplicator: suppresses re-creating a remediation Job for the same
 * rule/group-key pair within a configured TTL, by listing existing Jobs
 * carrying the matching reserved labels. Listing failure defaults to
 * "proceed with create" (availability over strict suppression).
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::crds::Operarius;
use crate::gateway::ClusterGateway;
use crate::types::reserved_labels;

/// Folds an arbitrary Alertmanager group key into a short, label-safe token.
pub fn hash_group_key(group_key: &str) -> String {
    let digest = Sha256::digest(group_key.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

/// Returns `true` when a remediation Job should be created for `rule`/`group_key`.
pub async fn should_create(
    rule: &Operarius,
    group_key: &str,
    namespace: &str,
    gateway: &dyn ClusterGateway,
) -> bool {
    let Some(dedup) = &rule.spec.deduplication else {
        return true;
    };
    if !dedup.enabled {
        return true;
    }

    let rule_name = rule.metadata.name.clone().unwrap_or_default();
    let hashed = hash_group_key(group_key);
    let selector = format!(
        "{}={},{}={}",
        reserved_labels::OPERARIUS,
        rule_name,
        reserved_labels::GROUP_KEY,
        hashed,
    );

    let jobs = match gateway.list_jobs(namespace, &selector).await {
        Ok(jobs) => jobs,
        Err(err) => {
            warn!(error = %err, rule = %rule_name, "dedup list failed, proceeding with create");
            return true;
        }
    };

    let ttl = chrono::Duration::seconds(dedup.effective_ttl_seconds());
    let now = Utc::now();
    let within_ttl = jobs.iter().any(|job| {
        job.metadata
            .creation_timestamp
            .as_ref()
            .map(|t| now.signed_duration_since(t.0) < ttl)
            .unwrap_or(false)
    });

    !within_ttl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{AlertSelector, DeduplicationSpec, JobTemplateSpec, OperariusSpec};
    use crate::gateway::fake::FakeGateway;
    use crate::types::AlertStatus;
    use k8s_openapi::api::batch::v1::{Job, JobSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn rule_with_dedup(name: &str, ttl: i32) -> Operarius {
        Operarius {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("openfero".to_string()),
                ..Default::default()
            },
            spec: OperariusSpec {
                alert_selector: AlertSelector {
                    alert_name: "A".to_string(),
                    status: AlertStatus::Firing,
                    labels: BTreeMap::new(),
                },
                job_template: JobTemplateSpec {
                    spec: JobSpec::default(),
                },
                priority: 0,
                enabled: None,
                deduplication: Some(DeduplicationSpec {
                    enabled: true,
                    ttl_seconds: ttl,
                }),
            },
            status: None,
        }
    }

    fn job_created_at(name: &str, rule_name: &str, hashed_key: &str, seconds_ago: i64) -> Job {
        let mut labels = BTreeMap::new();
        labels.insert(reserved_labels::OPERARIUS.to_string(), rule_name.to_string());
        labels.insert(reserved_labels::GROUP_KEY.to_string(), hashed_key.to_string());
        Job {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("openfero".to_string()),
                labels: Some(labels),
                creation_timestamp: Some(Time(Utc::now() - chrono::Duration::seconds(seconds_ago))),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn disabled_dedup_always_creates() {
        let mut rule = rule_with_dedup("q", 60);
        rule.spec.deduplication.as_mut().unwrap().enabled = false;
        let gw = FakeGateway::default();
        assert!(should_create(&rule, "g1", "openfero", &gw).await);
    }

    #[tokio::test]
    async fn ttl_le_zero_falls_back_to_default_and_still_suppresses_recent_job() {
        let rule = rule_with_dedup("q", 0);
        let hashed = hash_group_key("g1");
        let job = job_created_at("q-abc", "q", &hashed, 30);
        let gw = FakeGateway {
            jobs: std::sync::Mutex::new(vec![job]),
            ..Default::default()
        };
        assert!(!should_create(&rule, "g1", "openfero", &gw).await);
    }

    #[tokio::test]
    async fn recent_job_suppresses_creation() {
        let rule = rule_with_dedup("q", 60);
        let hashed = hash_group_key("g1");
        let job = job_created_at("q-abc", "q", &hashed, 30);
        let gw = FakeGateway {
            jobs: std::sync::Mutex::new(vec![job]),
            ..Default::default()
        };
        assert!(!should_create(&rule, "g1", "openfero", &gw).await);
    }

    #[tokio::test]
    async fn expired_job_allows_creation() {
        let rule = rule_with_dedup("q", 60);
        let hashed = hash_group_key("g1");
        let job = job_created_at("q-abc", "q", &hashed, 61);
        let gw = FakeGateway {
            jobs: std::sync::Mutex::new(vec![job]),
            ..Default::default()
        };
        assert!(should_create(&rule, "g1", "openfero", &gw).await);
    }

    #[tokio::test]
    async fn list_failure_is_lenient() {
        let rule = rule_with_dedup("q", 60);
        let gw = FakeGateway {
            fail_list_jobs: std::sync::Mutex::new(true),
            ..Default::default()
        };
        assert!(should_create(&rule, "g1", "openfero", &gw).await);
    }
}
