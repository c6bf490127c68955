//! Bus message envelope and DLQ payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message on the bus: a subject plus its JSON payload.
///
/// The payload schema is implied by the subject; typed payload structs
/// live in [`crate::events`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl BusMessage {
    #[must_use]
    pub fn new(subject: impl Into<String>, payload: Value) -> Self {
        Self {
            subject: subject.into(),
            payload,
            published_at: Utc::now(),
        }
    }

    /// Decode the payload into a typed event.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the payload does not match `T`; durable
    /// handlers convert this into a DLQ route.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// What lands on `dlq.<component>` when a message cannot be processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqEnvelope {
    /// Subject the message was originally published on.
    pub original_subject: String,
    /// Why the message was dead-lettered.
    pub error: String,
    /// The offending payload, verbatim.
    pub payload: Value,
    /// Consumer group that gave up on the message.
    pub component: String,
    pub dead_lettered_at: DateTime<Utc>,
}
