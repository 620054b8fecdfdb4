/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/types.rs
 *
 * Core data model shared by every component of the remediation engine:
 * the ingress shapes (Alert, HookMessage), the declarative rule
 * (Operarius, re-exported from crds.rs) and the records the engine keeps
 * about what it has done (OperariusStatus, AlertStoreEntry, JobInfo).
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert lifecycle status as carried by an Alertmanager webhook.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Firing => write!(f, "firing"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// An immutable ingress record: one entry from a HookMessage's `alerts` array.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub status: Option<AlertStatus>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn alertname(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}

/// The unit of ingress: an Alertmanager-shaped webhook payload.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HookMessage {
    #[serde(default)]
    pub version: Option<String>,
    pub group_key: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub group_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl HookMessage {
    /// The first alert, when present; `None` for an empty `alerts` array.
    pub fn representative(&self) -> Option<&Alert> {
        self.alerts.first()
    }

    /// First non-empty of `alerts[0].labels.alertname` then `commonLabels.alertname`.
    pub fn alertname(&self) -> Option<&str> {
        self.representative()
            .and_then(Alert::alertname)
            .or_else(|| self.common_labels.get("alertname").map(String::as_str))
    }

    /// Resolved label set: commonLabels overridden by the first alert's labels.
    pub fn resolved_labels(&self) -> BTreeMap<String, String> {
        let mut resolved = self.common_labels.clone();
        if let Some(alert) = self.representative() {
            for (k, v) in &alert.labels {
                resolved.insert(k.clone(), v.clone());
            }
        }
        resolved
    }

    /// Resolved annotation set, same override rule as resolved_labels.
    pub fn resolved_annotations(&self) -> BTreeMap<String, String> {
        let mut resolved = self.common_annotations.clone();
        if let Some(alert) = self.representative() {
            for (k, v) in &alert.annotations {
                resolved.insert(k.clone(), v.clone());
            }
        }
        resolved
    }
}

/// Closed enumeration of execution outcomes an Operarius can report.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Successful,
    Failed,
    /// Rendered as the literal string "Skipped: Deduplication" on the wire —
    /// a plain PascalCase enum variant can't produce that text since it
    /// contains a space and a colon, so Display is implemented by hand below.
    SkippedDeduplication,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "Pending"),
            ExecutionStatus::Running => write!(f, "Running"),
            ExecutionStatus::Successful => write!(f, "Successful"),
            ExecutionStatus::Failed => write!(f, "Failed"),
            ExecutionStatus::SkippedDeduplication => write!(f, "Skipped: Deduplication"),
        }
    }
}

/// Job outcome info attached to an AlertStoreEntry once a remediation Job exists
/// (or was deliberately skipped).
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub operarius_name: String,
    pub job_name: String,
    pub namespace: String,
    #[serde(default)]
    pub image: Option<String>,
    pub execution_count: i64,
    pub last_execution_time: DateTime<Utc>,
    pub last_executed_job_name: String,
    pub last_execution_status: ExecutionStatus,
}

/// One record in the AlertStore ring. Created at ingress, mutated in place
/// only to refresh a job's live status.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AlertStoreEntry {
    pub alert: Alert,
    pub status: AlertStatus,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub job_info: Option<JobInfo>,
}

impl AlertStoreEntry {
    /// Case-insensitive, concatenated text used by AlertStore::query.
    pub fn searchable_text(&self) -> String {
        let mut buf = String::new();
        if let Some(name) = self.alert.alertname() {
            buf.push_str(name);
            buf.push(' ');
        }
        buf.push_str(&self.status.to_string());
        buf.push(' ');
        for (k, v) in &self.alert.labels {
            buf.push_str(k);
            buf.push(' ');
            buf.push_str(v);
            buf.push(' ');
        }
        for (k, v) in &self.alert.annotations {
            buf.push_str(k);
            buf.push(' ');
            buf.push_str(v);
            buf.push(' ');
        }
        if let Some(job) = &self.job_info {
            buf.push_str(&job.operarius_name);
            buf.push(' ');
            buf.push_str(&job.job_name);
            buf.push(' ');
            buf.push_str(&job.last_execution_status.to_string());
        }
        buf.to_lowercase()
    }
}

/// Reserved label keys the engine writes onto every Job it creates.
pub mod reserved_labels {
    pub const OPERARIUS: &str = "openfero.io/operarius";
    pub const ALERT: &str = "openfero.io/alert";
    pub const GROUP_KEY: &str = "openfero.io/group-key";
    pub const MANAGED_BY: &str = "openfero.io/managed-by";
    pub const STATUS: &str = "openfero.io/status";
    pub const MANAGED_BY_VALUE: &str = "openfero";
}
