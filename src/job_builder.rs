/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/job_builder.rs
 *
 * JobBuilder: turns a matched Operarius and an incoming hook into a
 * concrete Job, following the same Container/EnvVar/PodSpec assembly
 * `execute_runbook_action` uses, expanded to render every container's
 * command/args/env through TemplateRenderer instead of a fixed script path.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use kube::api::ObjectMeta;

use crate::crds::Operarius;
use crate::dedup::hash_group_key;
use crate::error::Error;
use crate::template::{render, Vars};
use crate::types::{reserved_labels, HookMessage};

/// Normalizes a label key into the `OPENFERO_LABEL_<K>` env var suffix:
/// upper-cased, non-`[A-Z0-9_]` characters replaced with `_`.
fn sanitize_env_key(key: &str) -> String {
    key.to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn render_container(
    container: &mut Container,
    vars: &Vars,
    label_env: &[EnvVar],
) -> Result<(), Error> {
    if let Some(command) = &mut container.command {
        for entry in command.iter_mut() {
            *entry = render(entry, vars)?;
        }
    }
    if let Some(args) = &mut container.args {
        for entry in args.iter_mut() {
            *entry = render(entry, vars)?;
        }
    }
    if let Some(env) = &mut container.env {
        for var in env.iter_mut() {
            if let Some(value) = &var.value {
                var.value = Some(render(value, vars)?);
            }
        }
        env.extend(label_env.iter().cloned());
    } else {
        container.env = Some(label_env.to_vec());
    }
    Ok(())
}

/// Builds a concrete Job from `rule`'s template for the given `hook`. The
/// rule's own template is never mutated (callers hold it behind a shared
/// read-only cache).
pub fn build(rule: &Operarius, hook: &HookMessage) -> Result<Job, Error> {
    let rule_name = rule.metadata.name.clone().unwrap_or_default();
    let namespace = rule
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| Error::Build {
            field: "namespace".to_string(),
            cause: format!("operarius '{rule_name}' has no namespace"),
        })?;

    let alertname = hook.alertname().unwrap_or("unknown").to_string();
    let resolved_labels = hook.resolved_labels();
    let resolved_annotations = hook.resolved_annotations();
    let vars = Vars::new(&resolved_labels, &resolved_annotations, hook);

    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    labels.insert(reserved_labels::OPERARIUS.to_string(), rule_name.clone());
    labels.insert(reserved_labels::ALERT.to_string(), alertname);
    labels.insert(
        reserved_labels::GROUP_KEY.to_string(),
        hash_group_key(&hook.group_key),
    );
    labels.insert(
        reserved_labels::MANAGED_BY.to_string(),
        reserved_labels::MANAGED_BY_VALUE.to_string(),
    );
    labels.insert(reserved_labels::STATUS.to_string(), hook.status.to_string());

    let label_env: Vec<EnvVar> = resolved_labels
        .iter()
        .map(|(k, v)| EnvVar {
            name: format!("OPENFERO_LABEL_{}", sanitize_env_key(k)),
            value: Some(v.clone()),
            ..Default::default()
        })
        .collect();

    // Deep-copy: rule.spec.job_template.spec is behind a shared cache and
    // must not be mutated in place.
    let mut job_spec = rule.spec.job_template.spec.clone();
    if let Some(pod_spec) = job_spec.template.spec.as_mut() {
        for container in pod_spec.containers.iter_mut() {
            render_container(container, &vars, &label_env)?;
        }
        if let Some(init_containers) = pod_spec.init_containers.as_mut() {
            for container in init_containers.iter_mut() {
                render_container(container, &vars, &label_env)?;
            }
        }
    }

    // Template-side labels come first so reserved labels always win on key
    // collision.
    let mut merged_labels = job_spec
        .template
        .metadata
        .as_ref()
        .and_then(|m| m.labels.clone())
        .unwrap_or_default();
    merged_labels.extend(labels.clone());
    let mut template_meta = job_spec.template.metadata.clone().unwrap_or_default();
    template_meta.labels = Some(merged_labels);
    job_spec.template.metadata = Some(template_meta);

    Ok(Job {
        metadata: ObjectMeta {
            generate_name: Some(format!("{rule_name}-")),
            namespace: Some(namespace),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(job_spec),
        status: None,
    })
}
