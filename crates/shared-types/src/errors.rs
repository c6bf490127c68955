//! # Error Taxonomy
//!
//! Surface-level error kinds with stable wire codes. The gateway maps
//! these onto HTTP statuses; subsystems never invent ad-hoc codes.

use thiserror::Error;

use crate::entities::PreviewReason;

/// Rejection reasons for an intent submission.
///
/// Authentication and authorization failures are deliberately silent from
/// the audit log; everything past acceptance is recorded.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    /// Payload shape or per-kind schema violation.
    #[error("Validation failed: {}", reasons.join("; "))]
    ValidationFailed { reasons: Vec<String> },

    /// HMAC signature mismatch. Not audited.
    #[error("Signature invalid")]
    SignatureInvalid,

    /// RBAC denial. Not audited.
    #[error("Insufficient permissions: missing {permission}")]
    InsufficientPermissions { permission: String },

    /// Optimistic concurrency: the operator acted on stale world state.
    #[error("State conflict: submitted {submitted}, current {current}")]
    StateConflict { submitted: String, current: String },

    /// A capacity blocker from the preview reasoner.
    #[error("Blocked by cap")]
    BlockedByCap { reasons: Vec<PreviewReason> },

    /// A breaker/posture blocker from the preview reasoner.
    #[error("Blocked by breaker")]
    BlockedByBreaker { reasons: Vec<PreviewReason> },

    /// In-memory intent buffer is full; the client should retry later.
    #[error("Queue saturated: {in_memory} records in memory (max {max_in_memory})")]
    QueueSaturated {
        in_memory: usize,
        max_in_memory: usize,
    },

    /// Unexpected internal failure before acceptance.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubmitError {
    /// Stable wire code for the operator API.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::ValidationFailed { .. } => "VALIDATION_FAILED",
            SubmitError::SignatureInvalid => "SIGNATURE_INVALID",
            SubmitError::InsufficientPermissions { .. } => "INSUFFICIENT_PERMISSIONS",
            SubmitError::StateConflict { .. } => "STATE_CONFLICT",
            SubmitError::BlockedByCap { .. } => "BLOCKED_BY_CAP",
            SubmitError::BlockedByBreaker { .. } => "BLOCKED_BY_BREAKER",
            SubmitError::QueueSaturated { .. } => "QUEUE_SATURATED",
            SubmitError::Internal(_) => "INTERNAL",
        }
    }

    /// Structured blocker reasons, where the variant carries them.
    #[must_use]
    pub fn reasons(&self) -> Vec<PreviewReason> {
        match self {
            SubmitError::BlockedByCap { reasons } | SubmitError::BlockedByBreaker { reasons } => {
                reasons.clone()
            }
            SubmitError::ValidationFailed { reasons } => reasons
                .iter()
                .map(|r| PreviewReason {
                    code: "schema".to_string(),
                    detail: r.clone(),
                    blocking: true,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Failures from the durable intent repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// `id` collision on insert.
    #[error("Duplicate intent id: {0}")]
    DuplicateId(String),

    /// `idempotency_key` collision on insert.
    #[error("Duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    /// Record not found for update/resolve.
    #[error("Intent not found: {0}")]
    NotFound(String),

    /// Transition would violate the status DAG.
    #[error("Illegal transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: String,
        to: String,
    },

    /// `resolve` called on an already-terminal record.
    #[error("Intent already resolved: {0}")]
    AlreadyResolved(String),

    /// Underlying persistence failure.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Failures from the append-only ledgers (audit / fills / receipts).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(String),

    /// A record read back from disk failed signature verification.
    #[error("Ledger signature verification failed at seq {seq}")]
    SignatureMismatch { seq: u64 },

    #[error("Ledger record malformed at line {line}: {detail}")]
    Malformed { line: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_are_stable() {
        assert_eq!(
            SubmitError::ValidationFailed { reasons: vec![] }.code(),
            "VALIDATION_FAILED"
        );
        assert_eq!(SubmitError::SignatureInvalid.code(), "SIGNATURE_INVALID");
        assert_eq!(
            SubmitError::StateConflict {
                submitted: "a".into(),
                current: "b".into()
            }
            .code(),
            "STATE_CONFLICT"
        );
        assert_eq!(
            SubmitError::QueueSaturated {
                in_memory: 10,
                max_in_memory: 10
            }
            .code(),
            "QUEUE_SATURATED"
        );
    }

    #[test]
    fn test_validation_reasons_surface_as_blocking() {
        let err = SubmitError::ValidationFailed {
            reasons: vec!["params.mode must be one of paper|shadow|live".into()],
        };
        let reasons = err.reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].blocking);
    }
}
