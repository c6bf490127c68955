//! # Ledger Records
//!
//! Append-only records shared between the audit ledger, the config
//! registry, and the historical replay engine. Audit and fill records share
//! one monotonic ledger sequence so replay has a total order over both
//! streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One signed audit receipt. Every state-changing action (intent
/// execution, config override, breaker trip, resume) appends exactly one.
/// Rejected actions are never audited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the global ledger sequence (assigned on append).
    pub seq: u64,
    /// Record category, e.g. `intent`, `config_override`, `breaker_trip`.
    pub event_type: String,
    /// Operator or subsystem that caused the change.
    pub actor_id: String,
    /// Stable action name, e.g. `ARM`, `override`, `trip:reflex`.
    pub action: String,
    pub timestamp: DateTime<Utc>,
    /// Action-specific payload. For replayable actions this includes a
    /// `state_after` snapshot of the world state.
    pub details: Value,
    /// HMAC-SHA256 over `(seq, event_type, actor_id, action, timestamp,
    /// canonical(details))`, hex-encoded.
    pub signature: String,
}

/// One fill report from the execution pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    /// Position in the global ledger sequence (assigned on append).
    pub seq: u64,
    pub venue: String,
    pub symbol: String,
    pub side: FillSide,
    pub qty: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Shadow fills are advisory evidence only; they never mutate positions.
    #[serde(default)]
    pub shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillSide {
    Buy,
    Sell,
}

/// Which way a config receipt changed the override set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptAction {
    Override,
    Rollback,
}

/// Signed receipt for a config override or rollback. Persisted as JSON
/// lines; field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideReceipt {
    pub id: String,
    pub key: String,
    pub previous_value: Value,
    pub new_value: Value,
    pub operator_id: String,
    pub reason: String,
    pub action: ReceiptAction,
    pub timestamp: DateTime<Utc>,
    /// HMAC-SHA256 over all other fields; must verify on replay.
    pub signature: String,
    /// For rollbacks, the id of the override receipt being reversed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverses: Option<String>,
}
