//! # Event Publisher
//!
//! The publishing side of the bus. Ephemeral subscribers ride a broadcast
//! channel; durable groups get their own bounded queues so `publish`
//! returns only after durable acceptance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::message::BusMessage;
use crate::subjects::subject_matches;
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Errors from publish operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// A durable group's queue is gone (its worker stopped).
    #[error("Durable group closed: {0}")]
    GroupClosed(String),
}

/// Trait for publishing messages to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a message. Returns after every matching durable group has
    /// durably accepted it; the return value is the number of ephemeral
    /// receivers that saw it.
    async fn publish(&self, subject: &str, payload: Value) -> Result<usize, BusError>;

    /// Total messages published.
    fn messages_published(&self) -> u64;
}

/// A durable group's ingress queue, kept by the bus.
pub(crate) struct GroupQueue {
    pub(crate) name: String,
    pub(crate) pattern: String,
    pub(crate) tx: mpsc::Sender<BusMessage>,
}

/// In-memory implementation of the event bus.
///
/// Single-process deployments use this directly; a brokered deployment
/// would implement [`EventPublisher`] over the external broker instead.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<BusMessage>,
    pub(crate) groups: RwLock<Vec<GroupQueue>>,
    messages_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a bus with default ephemeral capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with a specific ephemeral channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            groups: RwLock::new(Vec::new()),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe ephemerally to subjects matching `pattern`.
    #[must_use]
    pub fn subscribe(&self, pattern: impl Into<String>) -> Subscription {
        let pattern = pattern.into();
        debug!(pattern = %pattern, "New ephemeral subscription");
        Subscription::new(self.sender.subscribe(), pattern)
    }

    /// Number of live ephemeral receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Ephemeral channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registered durable group names.
    #[must_use]
    pub fn durable_groups(&self) -> Vec<String> {
        self.groups
            .read()
            .map(|g| g.iter().map(|q| q.name.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn register_group(&self, queue: GroupQueue) {
        if let Ok(mut groups) = self.groups.write() {
            groups.push(queue);
        }
    }

    /// Collect the senders of groups whose pattern matches `subject`,
    /// pruning groups whose workers have stopped.
    fn matching_group_senders(&self, subject: &str) -> Vec<(String, mpsc::Sender<BusMessage>)> {
        let Ok(mut groups) = self.groups.write() else {
            return Vec::new();
        };
        groups.retain(|q| !q.tx.is_closed());
        groups
            .iter()
            .filter(|q| subject_matches(&q.pattern, subject))
            .map(|q| (q.name.clone(), q.tx.clone()))
            .collect()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, subject: &str, payload: Value) -> Result<usize, BusError> {
        let msg = BusMessage::new(subject, payload);
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        // Durable acceptance first: await each matching group's queue.
        for (name, tx) in self.matching_group_senders(subject) {
            if tx.send(msg.clone()).await.is_err() {
                warn!(group = %name, subject = %subject, "Durable group closed during publish");
                return Err(BusError::GroupClosed(name));
            }
        }

        // Ephemeral fan-out is best-effort.
        match self.sender.send(msg) {
            Ok(receivers) => {
                debug!(subject = %subject, receivers, "Message published");
                Ok(receivers)
            }
            Err(_) => {
                debug!(subject = %subject, "No ephemeral receivers");
                Ok(0)
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryEventBus::new();
        let receivers = bus.publish("evt.test", json!({"n": 1})).await.unwrap();
        assert_eq!(receivers, 0);
        assert_eq!(bus.messages_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let bus = InMemoryEventBus::new();
        let _sub = bus.subscribe("evt.>");
        let receivers = bus.publish("evt.test", json!({})).await.unwrap();
        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_counted() {
        let bus = InMemoryEventBus::new();
        let _a = bus.subscribe("evt.>");
        let _b = bus.subscribe("cmd.>");
        let receivers = bus.publish("evt.test", json!({})).await.unwrap();
        // Broadcast reaches every receiver; filters apply on the consumer side.
        assert_eq!(receivers, 2);
    }

    #[tokio::test]
    async fn test_custom_capacity() {
        let bus = InMemoryEventBus::with_capacity(64);
        assert_eq!(bus.capacity(), 64);
    }
}
