//! # Typed Bus Payloads
//!
//! One struct per wire-stable subject. Publishers build these; durable
//! consumers decode them (decode failures route to the DLQ).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_types::{BreakerLayer, FillSide, RiskState};

use crate::message::BusMessage;
use crate::subjects;

/// Outbound order for the execution pipeline.
/// Subject: `cmd.execution.place.v1.<venue>.<account>.<symbol>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCommand {
    pub venue: String,
    pub account: String,
    pub symbol: String,
    pub side: FillSide,
    pub qty: f64,
    /// Only market orders are emitted by the control plane (flatten).
    pub order_type: String,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
}

impl OrderCommand {
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        BusMessage::new(
            subjects::exec_place(&self.venue, &self.account, &self.symbol),
            serde_json::to_value(self).unwrap_or_default(),
        )
    }
}

/// Inbound fill report. Subject: `evt.execution.fill.v1.<venue>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub venue: String,
    pub symbol: String,
    pub side: FillSide,
    pub qty: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Shadow fills are advisory; they never mutate positions.
    #[serde(default)]
    pub shadow: bool,
}

impl FillEvent {
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        BusMessage::new(
            subjects::exec_fill(&self.venue),
            serde_json::to_value(self).unwrap_or_default(),
        )
    }
}

/// Platform halt. Subject: `cmd.sys.halt.v1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltCommand {
    pub reason: String,
    /// Who initiated the halt: an operator id or a breaker layer.
    pub source: String,
    pub issued_at: DateTime<Utc>,
}

impl HaltCommand {
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        BusMessage::new(
            subjects::SYS_HALT,
            serde_json::to_value(self).unwrap_or_default(),
        )
    }
}

/// Breaker trip or reset. Subject: `evt.breaker.trip.v1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerTripEvent {
    pub layer: BreakerLayer,
    pub reason: String,
    /// Risk state after escalation.
    pub risk_state: RiskState,
    /// False for reset events.
    pub tripped: bool,
    pub at: DateTime<Utc>,
}

impl BreakerTripEvent {
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        BusMessage::new(
            subjects::BREAKER_TRIP,
            serde_json::to_value(self).unwrap_or_default(),
        )
    }
}

/// Config change notification. Subject: `evt.config.changed.v1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChangedEvent {
    pub key: String,
    pub new_value: serde_json::Value,
    /// `override`, `rollback`, or `preset:<name>`.
    pub action: String,
    pub receipt_id: String,
    pub at: DateTime<Utc>,
}

impl ConfigChangedEvent {
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        BusMessage::new(
            subjects::CONFIG_CHANGED,
            serde_json::to_value(self).unwrap_or_default(),
        )
    }
}
