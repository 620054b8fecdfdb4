/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/crds.rs
 *
 * Rust structs corresponding to the Operarius Custom Resource Definition.
 * Following the pattern established across the operator's other CRDs: a
 * `#[derive(CustomResource)]` struct for the resource's spec field, a
 * companion `*Status` struct for the observed state, and `schemars` for the
 * embedded OpenAPI schema used for server-side validation.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::JobSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{AlertStatus, ExecutionStatus};

/// Selects which alerts an Operarius responds to.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertSelector {
    pub alert_name: String,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Deduplication policy for a single Operarius.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeduplicationSpec {
    #[serde(default)]
    pub enabled: bool,
    /// ttl<=0 means "use the default of 300s" when enabled.
    #[serde(default)]
    pub ttl_seconds: i32,
}

impl DeduplicationSpec {
    pub const DEFAULT_TTL_SECONDS: i64 = 300;

    /// Effective TTL in seconds, applying the ttl<=0 default rule.
    pub fn effective_ttl_seconds(&self) -> i64 {
        if self.ttl_seconds <= 0 {
            Self::DEFAULT_TTL_SECONDS
        } else {
            self.ttl_seconds as i64
        }
    }
}

/// The declarative remediation rule. The operator watches these resources
/// in a namespace and matches incoming alerts against them via RuleMatcher.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "openfero.io",
    version = "v1alpha1",
    kind = "Operarius",
    namespaced,
    status = "OperariusStatus",
    printcolumn = r#"{"name":"AlertName", "type":"string", "jsonPath":".spec.alertSelector.alertName"}"#,
    printcolumn = r#"{"name":"Priority", "type":"integer", "jsonPath":".spec.priority"}"#,
    printcolumn = r#"{"name":"LastStatus", "type":"string", "jsonPath":".status.lastExecutionStatus"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    shortname = "operarius"
)]
#[serde(rename_all = "camelCase")]
pub struct OperariusSpec {
    pub alert_selector: AlertSelector,

    /// A Job template; rendered per-firing by the JobBuilder.
    pub job_template: JobTemplateSpec,

    #[serde(default)]
    pub priority: i32,

    /// Absent means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplication: Option<DeduplicationSpec>,
}

impl OperariusSpec {
    /// Matchable iff enabled != false.
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }
}

/// Wraps a bare `JobSpec` so the CRD schema has a named, documented field
/// instead of embedding the upstream batch/v1 type directly at the top level.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplateSpec {
    pub spec: JobSpec,
}

/// Observable state of an Operarius, updated by the engine.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct OperariusStatus {
    #[serde(default)]
    pub execution_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_status: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StatusCondition>,
}

/// One entry in an Operarius's ordered condition history.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_transition_time: chrono::DateTime<chrono::Utc>,
    pub reason: String,
    pub message: String,
}

impl StatusCondition {
    pub fn ready(reason: &str, message: &str) -> Self {
        Self {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            last_transition_time: chrono::Utc::now(),
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }
}
