/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/live_hub.rs
 *
 * LiveUpdateHub: single-process fan-out of typed JSON envelopes to
 * websocket subscribers. Adapts the reader/writer split used elsewhere for
 * the rule cache (`Arc<RwLock<HashMap<...>>>`) to a registry of
 * per-subscriber bounded channels; publishing never waits on a subscriber.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Queue depth for each subscriber's mailbox.
pub const QUEUE_DEPTH: usize = 256;

/// A typed envelope delivered to every subscriber, `{type, data}`.
#[derive(Clone, Debug, Serialize)]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

pub type LiveQueue = mpsc::Receiver<LiveEvent>;

#[derive(Default)]
pub struct LiveUpdateHub {
    subscribers: RwLock<Vec<mpsc::Sender<LiveEvent>>>,
}

impl LiveUpdateHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and returns its receive half. Callers are
    /// expected to drop the queue to unsubscribe; a closed receiver is
    /// reaped lazily on the next `publish`.
    pub async fn subscribe(&self) -> LiveQueue {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        self.subscribers.write().await.push(tx);
        rx
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Serializes once and offers to every subscriber with a non-blocking
    /// `try_send`. A subscriber whose queue is full or already closed is
    /// dropped from the registry: the publisher never awaits.
    pub async fn publish(&self, event_type: &str, data: serde_json::Value) {
        let event = LiveEvent {
            event_type: event_type.to_string(),
            data,
        };
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|tx| tx.try_send(event.clone()).is_ok());
        let dropped = before - subscribers.len();
        if dropped > 0 {
            debug!(dropped, remaining = subscribers.len(), "dropped slow live-update subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_all_subscribers() {
        let hub = LiveUpdateHub::new();
        let mut q1 = hub.subscribe().await;
        let mut q2 = hub.subscribe().await;

        hub.publish("alert", serde_json::json!({"x": 1})).await;

        let e1 = q1.recv().await.unwrap();
        let e2 = q2.recv().await.unwrap();
        assert_eq!(e1.event_type, "alert");
        assert_eq!(e2.event_type, "alert");
    }

    #[tokio::test]
    async fn publish_never_blocks_on_full_queue() {
        let hub = LiveUpdateHub::new();
        let _q = hub.subscribe().await;
        // Fill the queue beyond capacity; publish must still return promptly
        // rather than waiting on the subscriber to drain.
        for _ in 0..(QUEUE_DEPTH + 5) {
            hub.publish("alert", serde_json::json!({})).await;
        }
        // The full subscriber gets dropped once its mailbox saturates.
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_reaped_on_next_publish() {
        let hub = LiveUpdateHub::new();
        let q = hub.subscribe().await;
        drop(q);
        hub.publish("alert", serde_json::json!({})).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn healthy_subscriber_survives_publish() {
        let hub = LiveUpdateHub::new();
        let _q = hub.subscribe().await;
        hub.publish("connected", serde_json::json!({})).await;
        assert_eq!(hub.subscriber_count().await, 1);
    }
}
