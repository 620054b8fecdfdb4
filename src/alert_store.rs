/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/alert_store.rs
 *
 * AlertStore: a fixed-capacity FIFO ring of recent alert events, queryable
 * by case-insensitive substring. Adapts the reader/writer cache pattern used
 * elsewhere for keyed lookups (`autoheal_controller::Context::rules_cache`'s
 * `Arc<RwLock<HashMap<...>>>`) into a `Mutex<VecDeque<_>>`, since entries
 * here are strictly ordered rather than keyed.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::VecDeque;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::{Alert, AlertStatus, AlertStoreEntry, JobInfo};

pub struct AlertStore {
    capacity: usize,
    entries: Mutex<VecDeque<AlertStoreEntry>>,
}

impl AlertStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a new entry; evicts the oldest if at capacity. Never fails
    /// observably — there is no I/O here to fail on.
    pub async fn save(&self, alert: Alert, status: AlertStatus, job_info: Option<JobInfo>) {
        let entry = AlertStoreEntry {
            alert,
            status,
            ingested_at: Utc::now(),
            job_info,
        };
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        debug!(len = entries.len(), capacity = self.capacity, "alert stored");
    }

    /// Newest-first entries whose searchable text contains `substring`
    /// (case-insensitive; empty substring matches all), bounded by `limit`.
    pub async fn query(&self, substring: &str, limit: usize) -> Vec<AlertStoreEntry> {
        let needle = substring.to_lowercase();
        let entries = self.entries.lock().await;
        entries
            .iter()
            .rev()
            .filter(|e| needle.is_empty() || e.searchable_text().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Updates the job status of the most recent matching entry, used by
    /// JobWatcher to refresh a live AlertStore entry in place.
    pub async fn update_job_info(&self, job_name: &str, job_info: JobInfo) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries
            .iter_mut()
            .rev()
            .find(|e| e.job_info.as_ref().map(|j| j.job_name.as_str()) == Some(job_name))
        {
            entry.job_info = Some(job_info);
        }
    }

    /// Releases any background resources. AlertStore holds none beyond the
    /// mutex-protected ring, so this is a no-op kept for interface parity
    /// with components that do hold a background task.
    pub async fn close(&self) {}

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn alert(alertname: &str) -> Alert {
        let mut labels = BTreeMap::new();
        labels.insert("alertname".to_string(), alertname.to_string());
        Alert {
            status: Some(AlertStatus::Firing),
            labels,
            annotations: BTreeMap::new(),
            starts_at: None,
            ends_at: None,
        }
    }

    #[tokio::test]
    async fn ring_fifo_keeps_last_n() {
        let store = AlertStore::new(3);
        for i in 0..5 {
            store
                .save(alert(&format!("A{i}")), AlertStatus::Firing, None)
                .await;
        }
        assert_eq!(store.len().await, 3);
        let all = store.query("", 10).await;
        let names: Vec<_> = all
            .iter()
            .map(|e| e.alert.alertname().unwrap().to_string())
            .collect();
        // newest-first: A4, A3, A2
        assert_eq!(names, vec!["A4", "A3", "A2"]);
    }

    #[tokio::test]
    async fn query_matches_case_insensitive_substring() {
        let store = AlertStore::new(10);
        store
            .save(alert("KubeQuotaAlmostFull"), AlertStatus::Firing, None)
            .await;
        let results = store.query("quota", 10).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn empty_substring_matches_all() {
        let store = AlertStore::new(10);
        store.save(alert("A"), AlertStatus::Firing, None).await;
        store.save(alert("B"), AlertStatus::Resolved, None).await;
        assert_eq!(store.query("", 10).await.len(), 2);
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let store = AlertStore::new(10);
        for i in 0..5 {
            store
                .save(alert(&format!("A{i}")), AlertStatus::Firing, None)
                .await;
        }
        assert_eq!(store.query("", 2).await.len(), 2);
    }
}
