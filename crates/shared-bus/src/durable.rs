//! # Durable Consumer Groups
//!
//! Named consumer groups with bounded queues and explicit ack. One worker
//! task per group processes messages sequentially; a message is acked by a
//! successful handler return, redelivered a bounded number of times on
//! `Retry`, and dead-lettered on `Decode` or redelivery exhaustion.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::message::{BusMessage, DlqEnvelope};
use crate::publisher::{EventPublisher, GroupQueue, InMemoryEventBus};
use crate::subjects;
use crate::{DEFAULT_DURABLE_QUEUE_DEPTH, DEFAULT_MAX_REDELIVERIES};

/// Explicit acknowledgement of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Processed; do not redeliver.
    Ack,
}

/// How a handler failed to process one delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// Payload malformed or schema-invalid: ack and route to the DLQ.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Transient failure: redeliver, bounded by the group config.
    #[error("Retryable failure: {0}")]
    Retry(String),
}

/// Handler invoked for each delivery, one at a time per group.
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn handle(&self, msg: &BusMessage) -> Result<Ack, HandlerError>;
}

/// Per-group tuning.
#[derive(Debug, Clone)]
pub struct DurableConfig {
    pub queue_depth: usize,
    pub max_redeliveries: u32,
}

impl Default for DurableConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_DURABLE_QUEUE_DEPTH,
            max_redeliveries: DEFAULT_MAX_REDELIVERIES,
        }
    }
}

/// Handle to a running durable group worker. Aborting the handle stops
/// consumption; queued messages are dropped with a warning.
pub struct DurableSubscription {
    name: String,
    worker: JoinHandle<()>,
}

impl DurableSubscription {
    /// The durable group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the worker.
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Drop for DurableSubscription {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

impl InMemoryEventBus {
    /// Join a durable consumer group.
    ///
    /// Messages matching `pattern` are queued for the group and handled
    /// sequentially by `handler`. Decode failures are acked and forwarded
    /// to `dlq.<durable_name>` with the original subject and error.
    pub fn subscribe_durable(
        self: Arc<Self>,
        pattern: impl Into<String>,
        durable_name: impl Into<String>,
        handler: Arc<dyn BusHandler>,
        config: DurableConfig,
    ) -> DurableSubscription {
        let pattern = pattern.into();
        let name = durable_name.into();
        let (tx, rx) = mpsc::channel(config.queue_depth);

        self.register_group(GroupQueue {
            name: name.clone(),
            pattern: pattern.clone(),
            tx,
        });

        debug!(group = %name, pattern = %pattern, "Durable group registered");

        let bus = self;
        let worker_name = name.clone();
        let worker = tokio::spawn(async move {
            group_worker(bus, worker_name, handler, rx, config.max_redeliveries).await;
        });

        DurableSubscription { name, worker }
    }
}

async fn group_worker(
    bus: Arc<InMemoryEventBus>,
    name: String,
    handler: Arc<dyn BusHandler>,
    mut rx: mpsc::Receiver<BusMessage>,
    max_redeliveries: u32,
) {
    while let Some(msg) = rx.recv().await {
        let mut attempt = 0u32;
        loop {
            match handler.handle(&msg).await {
                Ok(Ack::Ack) => break,
                Err(HandlerError::Decode(detail)) => {
                    warn!(
                        group = %name,
                        subject = %msg.subject,
                        error = %detail,
                        "Decode failure, dead-lettering"
                    );
                    dead_letter(&bus, &name, &msg, &detail).await;
                    break;
                }
                Err(HandlerError::Retry(detail)) => {
                    attempt += 1;
                    if attempt > max_redeliveries {
                        error!(
                            group = %name,
                            subject = %msg.subject,
                            attempts = attempt,
                            "Redeliveries exhausted, dead-lettering"
                        );
                        dead_letter(&bus, &name, &msg, &detail).await;
                        break;
                    }
                    debug!(
                        group = %name,
                        subject = %msg.subject,
                        attempt,
                        "Redelivering after retryable failure"
                    );
                }
            }
        }
    }
    debug!(group = %name, "Durable group worker stopped");
}

async fn dead_letter(bus: &InMemoryEventBus, component: &str, msg: &BusMessage, error: &str) {
    let envelope = DlqEnvelope {
        original_subject: msg.subject.clone(),
        error: error.to_string(),
        payload: msg.payload.clone(),
        component: component.to_string(),
        dead_lettered_at: Utc::now(),
    };
    let payload = serde_json::to_value(&envelope).unwrap_or_default();
    if let Err(e) = bus.publish(&subjects::dlq(component), payload).await {
        error!(component, error = %e, "Failed to publish to DLQ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Recorder {
        seen: Mutex<Vec<BusMessage>>,
        fail_with: Option<HandlerError>,
    }

    #[async_trait]
    impl BusHandler for Recorder {
        async fn handle(&self, msg: &BusMessage) -> Result<Ack, HandlerError> {
            self.seen.lock().push(msg.clone());
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(Ack::Ack),
            }
        }
    }

    #[tokio::test]
    async fn test_durable_delivery_in_order() {
        let bus = Arc::new(InMemoryEventBus::new());
        let handler = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_with: None,
        });
        let _sub = Arc::clone(&bus).subscribe_durable(
            "evt.execution.fill.v1.*",
            "state-manager",
            handler.clone(),
            DurableConfig::default(),
        );

        for i in 0..3 {
            bus.publish("evt.execution.fill.v1.deribit", json!({"n": i}))
                .await
                .unwrap();
        }

        timeout(Duration::from_secs(1), async {
            while handler.seen.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("handler never saw 3 messages");

        let seen = handler.seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].payload["n"], 0);
        assert_eq!(seen[2].payload["n"], 2);
    }

    #[tokio::test]
    async fn test_non_matching_subject_not_delivered() {
        let bus = Arc::new(InMemoryEventBus::new());
        let handler = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_with: None,
        });
        let _sub = Arc::clone(&bus).subscribe_durable(
            "evt.execution.fill.v1.*",
            "state-manager",
            handler.clone(),
            DurableConfig::default(),
        );

        bus.publish("evt.breaker.trip.v1", json!({})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handler.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_routes_to_dlq() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut dlq_sub = bus.subscribe("dlq.>");
        let handler = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_with: Some(HandlerError::Decode("missing field `qty`".into())),
        });
        let _sub = Arc::clone(&bus).subscribe_durable(
            "evt.execution.fill.v1.*",
            "state-manager",
            handler,
            DurableConfig::default(),
        );

        bus.publish("evt.execution.fill.v1.deribit", json!({"bad": true}))
            .await
            .unwrap();

        let dlq_msg = timeout(Duration::from_secs(1), dlq_sub.recv())
            .await
            .expect("timeout")
            .expect("dlq message");
        assert_eq!(dlq_msg.subject, "dlq.state-manager");
        let envelope: DlqEnvelope = dlq_msg.decode().unwrap();
        assert_eq!(envelope.original_subject, "evt.execution.fill.v1.deribit");
        assert!(envelope.error.contains("qty"));
    }

    #[tokio::test]
    async fn test_retry_exhaustion_dead_letters() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut dlq_sub = bus.subscribe("dlq.>");
        let handler = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_with: Some(HandlerError::Retry("downstream flake".into())),
        });
        let _sub = Arc::clone(&bus).subscribe_durable(
            "cmd.sys.halt.v1",
            "halt-consumer",
            handler.clone(),
            DurableConfig {
                queue_depth: 8,
                max_redeliveries: 2,
            },
        );

        bus.publish("cmd.sys.halt.v1", json!({"reason": "drill"}))
            .await
            .unwrap();

        let dlq_msg = timeout(Duration::from_secs(1), dlq_sub.recv())
            .await
            .expect("timeout")
            .expect("dlq message");
        assert_eq!(dlq_msg.subject, "dlq.halt-consumer");
        // Initial delivery plus two redeliveries.
        assert_eq!(handler.seen.lock().len(), 3);
    }
}
