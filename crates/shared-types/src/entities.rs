//! # Intent Entities
//!
//! The intent record is the central entity of the control plane: an
//! operator's authenticated, idempotent request to change trading-system
//! state, together with its lifecycle status and terminal receipt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every operator action the control plane recognizes.
///
/// The wire representation is SCREAMING_SNAKE_CASE, matching the operator
/// API contract and the audit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    /// Arm the trading system for order emission.
    Arm,
    /// Disarm: stop emitting new orders, keep positions.
    Disarm,
    /// Switch trading mode (paper / shadow / live).
    SetMode,
    /// Throttle one of the three signal phases.
    ThrottlePhase,
    /// Close all open positions at market.
    Flatten,
    /// Temporarily override a risk tunable.
    OverrideRisk,
    /// Apply an optimization proposal (allocation weights).
    ApplyProposal,
    /// Roll a config key back to its prior provenance layer.
    RollbackConfig,
    /// Run position/fill reconciliation.
    RunReconcile,
    /// Hard-halt the platform.
    Halt,
    /// Resume from halt / reset breakers to normal.
    Resume,
}

impl IntentKind {
    /// All recognized kinds, in registry order.
    pub const ALL: [IntentKind; 11] = [
        IntentKind::Arm,
        IntentKind::Disarm,
        IntentKind::SetMode,
        IntentKind::ThrottlePhase,
        IntentKind::Flatten,
        IntentKind::OverrideRisk,
        IntentKind::ApplyProposal,
        IntentKind::RollbackConfig,
        IntentKind::RunReconcile,
        IntentKind::Halt,
        IntentKind::Resume,
    ];

    /// Stable wire name (matches the serde representation).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Arm => "ARM",
            IntentKind::Disarm => "DISARM",
            IntentKind::SetMode => "SET_MODE",
            IntentKind::ThrottlePhase => "THROTTLE_PHASE",
            IntentKind::Flatten => "FLATTEN",
            IntentKind::OverrideRisk => "OVERRIDE_RISK",
            IntentKind::ApplyProposal => "APPLY_PROPOSAL",
            IntentKind::RollbackConfig => "ROLLBACK_CONFIG",
            IntentKind::RunReconcile => "RUN_RECONCILE",
            IntentKind::Halt => "HALT",
            IntentKind::Resume => "RESUME",
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent lifecycle status.
///
/// Transitions are monotonic along the DAG:
///
/// ```text
///   ACCEPTED ──► EXECUTING ──► VERIFIED
///       │            │     └──► FAILED
///       └────────────┴────────► EXPIRED   (TTL)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    /// Accepted, queued for execution.
    Accepted,
    /// Executor dispatched, effect in flight.
    Executing,
    /// Executed and (where a verifier exists) verification attempted.
    Verified,
    /// Executor raised an error.
    Failed,
    /// TTL elapsed before a terminal status was reached.
    Expired,
}

impl IntentStatus {
    /// True for statuses that permit no further transition.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Verified | IntentStatus::Failed | IntentStatus::Expired
        )
    }

    /// Whether moving `self → next` respects the lifecycle DAG.
    ///
    /// Terminal states admit nothing; `ACCEPTED` may move to `EXECUTING` or
    /// any terminal state; `EXECUTING` may only move to a terminal state.
    #[must_use]
    pub fn can_transition_to(&self, next: IntentStatus) -> bool {
        match self {
            IntentStatus::Accepted => {
                matches!(
                    next,
                    IntentStatus::Executing
                        | IntentStatus::Verified
                        | IntentStatus::Failed
                        | IntentStatus::Expired
                )
            }
            IntentStatus::Executing => next.is_terminal(),
            _ => false,
        }
    }

    /// Stable wire name (matches the serde representation).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Accepted => "ACCEPTED",
            IntentStatus::Executing => "EXECUTING",
            IntentStatus::Verified => "VERIFIED",
            IntentStatus::Failed => "FAILED",
            IntentStatus::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much damage an intent can do if mis-issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    Safe,
    Moderate,
    Critical,
}

/// Outcome of post-execution verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    /// External evidence confirmed the declared effect.
    Verified,
    /// The effect could not be confirmed within the retry budget. The
    /// intent is complete but its effect is not yet proven.
    Unverified,
    /// No verifier is registered for this kind.
    Skipped,
}

/// Immutable record of an executed change, populated on terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentReceipt {
    /// Human-readable summary of the applied effect.
    pub effect: String,
    /// World-state fragment observed before execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_state: Option<Value>,
    /// World-state fragment observed after execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<Value>,
    /// Verification outcome for the declared effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    /// Externally sourced proof (fill sequences, venue acks, shadow fills).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verification_evidence: Vec<Value>,
    /// Executor error, for `FAILED` / `EXPIRED` records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntentReceipt {
    /// Receipt for a successfully applied effect.
    #[must_use]
    pub fn applied(effect: impl Into<String>) -> Self {
        Self {
            effect: effect.into(),
            prior_state: None,
            new_state: None,
            verification: None,
            verification_evidence: Vec::new(),
            error: None,
        }
    }

    /// Receipt for a failed or expired intent.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            effect: "none".to_string(),
            prior_state: None,
            new_state: None,
            verification: None,
            verification_evidence: Vec::new(),
            error: Some(reason),
        }
    }
}

/// The central entity: one operator intent and its full lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    /// Client-generated unique identifier (UUID).
    pub id: String,
    /// Unique per logical submission; duplicates collapse to one record.
    pub idempotency_key: String,
    /// Payload schema version.
    #[serde(default = "default_version")]
    pub version: u16,
    #[serde(rename = "type")]
    pub kind: IntentKind,
    /// Kind-specific parameters, schema-validated at submission.
    pub params: Value,
    pub operator_id: String,
    /// Operator-supplied free-text justification.
    pub reason: String,
    pub submitted_at: DateTime<Utc>,
    pub ttl_seconds: u32,
    /// 16-hex-char fingerprint of the world state the operator saw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<String>,
    /// 64 hex chars, HMAC-SHA256 over `id.type.canonical(params).operator_id`.
    pub signature: String,
    pub status: IntentStatus,
    pub danger_level: DangerLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<IntentReceipt>,
}

impl IntentRecord {
    /// Absolute deadline implied by `submitted_at + ttl_seconds`.
    #[must_use]
    pub fn ttl_deadline(&self) -> DateTime<Utc> {
        self.submitted_at + chrono::Duration::seconds(i64::from(self.ttl_seconds))
    }
}

fn default_version() -> u16 {
    1
}

/// Submission outcome reported alongside the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitOutcome {
    /// A new record was created.
    Accepted,
    /// The idempotency key was seen before; the existing record is returned.
    IdempotentHit,
}

/// Non-blocking observations from the submission preview reasoner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewReason {
    /// Machine-stable reason code (e.g. `breaker_open`, `cap_exceeded`).
    pub code: String,
    /// Human-readable explanation.
    pub detail: String,
    /// Whether this reason blocks a live submission.
    pub blocking: bool,
}
