/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/matcher.rs
 *
 * RuleMatcher: selects the best Operarius for an incoming webhook.
 * Pure function, no I/O.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::crds::Operarius;
use crate::error::Error;
use crate::types::HookMessage;

/// Selects the highest-priority Operarius matching `hook` out of `rules`.
/// Ties resolve to the first match in `rules`' order — callers are
/// responsible for supplying a stable order (RuleCache::list does).
pub fn select_rule<'a>(hook: &HookMessage, rules: &'a [Operarius]) -> Result<&'a Operarius, Error> {
    let alertname = hook.alertname().ok_or_else(|| Error::NoMatch {
        alertname: "unknown".to_string(),
        status: hook.status.to_string(),
    })?;

    let resolved_labels = hook.resolved_labels();

    // Iterator::max_by_key keeps the *last* maximum on a tie; ties must go
    // to the *first* matching rule in input order, so fold by hand instead.
    let best = rules
        .iter()
        .filter(|rule| rule.spec.is_enabled())
        .filter(|rule| rule.spec.alert_selector.alert_name == alertname)
        .filter(|rule| rule.spec.alert_selector.status == hook.status)
        .filter(|rule| {
            rule.spec
                .alert_selector
                .labels
                .iter()
                .all(|(k, v)| resolved_labels.get(k) == Some(v))
        })
        .fold(None, |acc: Option<&Operarius>, candidate| match acc {
            Some(current) if current.spec.priority >= candidate.spec.priority => Some(current),
            _ => Some(candidate),
        });

    best.ok_or_else(|| Error::NoMatch {
        alertname: alertname.to_string(),
        status: hook.status.to_string(),
    })
}
