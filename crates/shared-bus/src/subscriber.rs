//! # Event Subscriber
//!
//! Ephemeral subscriptions over the broadcast channel, filtered by subject
//! pattern on the consumer side.

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::message::BusMessage;
use crate::subjects::subject_matches;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was dropped.
    #[error("Event bus closed")]
    Closed,
}

/// A live ephemeral subscription.
///
/// Slow consumers lag and silently drop messages; durable delivery goes
/// through consumer groups instead.
pub struct Subscription {
    receiver: broadcast::Receiver<BusMessage>,
    pattern: String,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<BusMessage>, pattern: String) -> Self {
        Self { receiver, pattern }
    }

    /// Receive the next message matching this subscription's pattern.
    ///
    /// Returns `None` when the bus is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            let msg = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, pattern = %self.pattern, "Subscriber lagged, messages dropped");
                    continue;
                }
            };
            if subject_matches(&self.pattern, &msg.subject) {
                return Some(msg);
            }
        }
    }

    /// Non-blocking receive.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::Closed` when the bus is gone.
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        loop {
            let msg = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };
            if subject_matches(&self.pattern, &msg.subject) {
                return Ok(Some(msg));
            }
        }
    }

    /// The subject pattern this subscription filters on.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
