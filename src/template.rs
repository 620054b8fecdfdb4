/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/template.rs
 *
 * Scalar string interpolation over a fixed variable namespace. The template
 * language is intentionally not a general-purpose engine: `{{ .Path }}`
 * tokens are substituted by dotted attribute lookup, nothing else. Texts
 * with no `{{` are returned unchanged without parsing.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::BTreeMap;

use crate::error::Error;
use crate::types::HookMessage;

const NO_VALUE: &str = "<no value>";

/// The variable namespace a template is rendered against.
pub struct Vars<'a> {
    pub alert_labels: &'a BTreeMap<String, String>,
    pub alert_annotations: &'a BTreeMap<String, String>,
    pub hook: &'a HookMessage,
}

impl<'a> Vars<'a> {
    pub fn new(
        alert_labels: &'a BTreeMap<String, String>,
        alert_annotations: &'a BTreeMap<String, String>,
        hook: &'a HookMessage,
    ) -> Self {
        Self {
            alert_labels,
            alert_annotations,
            hook,
        }
    }

    /// Resolves a dotted path to its string value, or `None` if the path is
    /// unknown or the key is missing (both render as `<no value>`).
    fn resolve(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('.').collect();
        match segments.as_slice() {
            ["Alert", "Labels", key] | ["Labels", key] => self.alert_labels.get(*key).cloned(),
            ["Alert", "Annotations", key] | ["Annotations", key] => {
                self.alert_annotations.get(*key).cloned()
            }
            ["HookMessage", "Status"] | ["Status"] => Some(self.hook.status.to_string()),
            ["HookMessage", "GroupKey"] | ["GroupKey"] => Some(self.hook.group_key.clone()),
            ["HookMessage", "CommonLabels", key] => self.hook.common_labels.get(*key).cloned(),
            ["HookMessage", "CommonAnnotations", key] => {
                self.hook.common_annotations.get(*key).cloned()
            }
            _ => None,
        }
    }
}

/// Renders `text` against `vars`. Missing keys render as the literal string
/// `<no value>`; a malformed `{{ ... }}` expression is a hard error.
pub fn render(text: &str, vars: &Vars) -> Result<String, Error> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find("}}").ok_or_else(|| {
            Error::Build {
                field: "template".to_string(),
                cause: format!("unterminated '{{{{' in: {text}"),
            }
        })?;

        let expr = after_open[..end].trim();
        let path = expr.strip_prefix('.').ok_or_else(|| Error::Build {
            field: "template".to_string(),
            cause: format!("expression '{expr}' must start with '.'"),
        })?;

        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(Error::Build {
                field: "template".to_string(),
                cause: format!("invalid path '.{path}'"),
            });
        }

        out.push_str(&vars.resolve(path).unwrap_or_else(|| NO_VALUE.to_string()));
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertStatus;

    fn hook_with(common_labels: &[(&str, &str)]) -> HookMessage {
        let mut common = BTreeMap::new();
        for (k, v) in common_labels {
            common.insert(k.to_string(), v.to_string());
        }
        HookMessage {
            version: None,
            group_key: "g1".to_string(),
            status: AlertStatus::Firing,
            receiver: None,
            group_labels: BTreeMap::new(),
            common_labels: common,
            common_annotations: BTreeMap::new(),
            external_url: None,
            alerts: vec![],
        }
    }

    #[test]
    fn fast_path_returns_verbatim_without_braces() {
        let hook = hook_with(&[]);
        let labels = BTreeMap::new();
        let annotations = BTreeMap::new();
        let vars = Vars::new(&labels, &annotations, &hook);
        assert_eq!(render("echo hello", &vars).unwrap(), "echo hello");
    }

    #[test]
    fn substitutes_label_shorthand() {
        let hook = hook_with(&[]);
        let mut labels = BTreeMap::new();
        labels.insert("namespace".to_string(), "team-a".to_string());
        let annotations = BTreeMap::new();
        let vars = Vars::new(&labels, &annotations, &hook);
        assert_eq!(
            render("{{ .Labels.namespace }}", &vars).unwrap(),
            "team-a"
        );
    }

    #[test]
    fn missing_key_renders_no_value() {
        let hook = hook_with(&[]);
        let labels = BTreeMap::new();
        let annotations = BTreeMap::new();
        let vars = Vars::new(&labels, &annotations, &hook);
        assert_eq!(render("{{ .Labels.missing }}", &vars).unwrap(), "<no value>");
    }

    #[test]
    fn render_is_deterministic() {
        let hook = hook_with(&[("alertname", "X")]);
        let labels = BTreeMap::new();
        let annotations = BTreeMap::new();
        let vars = Vars::new(&labels, &annotations, &hook);
        let a = render("{{ .GroupKey }}", &vars).unwrap();
        let b = render("{{ .GroupKey }}", &vars).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_path_is_an_error() {
        let hook = hook_with(&[]);
        let labels = BTreeMap::new();
        let annotations = BTreeMap::new();
        let vars = Vars::new(&labels, &annotations, &hook);
        assert!(render("{{ .Invalid", &vars).is_err());
    }
}
