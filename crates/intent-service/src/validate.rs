//! Submission payload shape validation.
//!
//! Validation accumulates every violation instead of bailing on the
//! first, so the operator console can render a complete error list.

use chrono::{DateTime, Utc};
use serde_json::Value;

use shared_types::IntentKind;

use crate::registry::IntentRegistry;

/// Maximum accepted TTL. Anything longer is a client bug.
pub const MAX_TTL_SECONDS: u32 = 3_600;

/// A shape-valid submission, ready for the signature check.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSubmission {
    pub id: String,
    pub idempotency_key: String,
    pub version: u16,
    pub kind: IntentKind,
    pub params: Value,
    pub operator_id: String,
    pub reason: String,
    pub submitted_at: DateTime<Utc>,
    pub ttl_seconds: u32,
    pub state_hash: Option<String>,
    pub signature: String,
}

fn require_string(payload: &Value, field: &str, reasons: &mut Vec<String>) -> Option<String> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            reasons.push(format!("{field} must be non-empty"));
            None
        }
        Some(_) => {
            reasons.push(format!("{field} must be a string"));
            None
        }
        None => {
            reasons.push(format!("{field} is required"));
            None
        }
    }
}

/// Parse and shape-validate a raw submission payload.
///
/// # Errors
///
/// Every violation found, for a structured `VALIDATION_FAILED` response.
pub fn parse_submission(
    payload: &Value,
    registry: &IntentRegistry,
) -> Result<ParsedSubmission, Vec<String>> {
    let mut reasons = Vec::new();

    if !payload.is_object() {
        return Err(vec!["payload must be a JSON object".to_string()]);
    }

    let id = require_string(payload, "id", &mut reasons);
    let idempotency_key = require_string(payload, "idempotency_key", &mut reasons);
    let operator_id = require_string(payload, "operator_id", &mut reasons);
    let reason = require_string(payload, "reason", &mut reasons);
    let signature = require_string(payload, "signature", &mut reasons);

    let version = match payload.get("version") {
        None => 1,
        Some(v) => match v.as_u64() {
            Some(1) => 1,
            Some(other) => {
                reasons.push(format!("version {other} is unsupported (expected 1)"));
                1
            }
            None => {
                reasons.push("version must be an integer".to_string());
                1
            }
        },
    };

    let kind = match payload.get("type") {
        None => {
            reasons.push("type is required".to_string());
            None
        }
        Some(v) => match serde_json::from_value::<IntentKind>(v.clone()) {
            Ok(kind) => Some(kind),
            Err(_) => {
                reasons.push(format!("type {v} is not a recognized intent type"));
                None
            }
        },
    };

    let params = match payload.get("params") {
        None => {
            reasons.push("params is required".to_string());
            Value::Null
        }
        Some(v) if v.is_object() => v.clone(),
        Some(_) => {
            reasons.push("params must be an object".to_string());
            Value::Null
        }
    };

    let submitted_at = match payload.get("submitted_at").and_then(Value::as_str) {
        None => {
            reasons.push("submitted_at is required (RFC3339)".to_string());
            None
        }
        Some(s) => match s.parse::<DateTime<Utc>>() {
            Ok(t) => Some(t),
            Err(_) => {
                reasons.push(format!("submitted_at {s:?} is not RFC3339"));
                None
            }
        },
    };

    let ttl_seconds = match payload.get("ttl_seconds").and_then(Value::as_u64) {
        Some(ttl) if (1..=u64::from(MAX_TTL_SECONDS)).contains(&ttl) => ttl as u32,
        Some(ttl) => {
            reasons.push(format!(
                "ttl_seconds {ttl} out of range [1, {MAX_TTL_SECONDS}]"
            ));
            0
        }
        None => {
            reasons.push("ttl_seconds is required".to_string());
            0
        }
    };

    let state_hash = match payload.get("state_hash") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            if s.len() == 16 && s.chars().all(|c| c.is_ascii_hexdigit()) {
                Some(s.clone())
            } else {
                reasons.push("state_hash must be 16 hex chars".to_string());
                None
            }
        }
        Some(_) => {
            reasons.push("state_hash must be a string".to_string());
            None
        }
    };

    // Per-kind parameter schema, once the kind itself parsed.
    if let Some(kind) = kind {
        if let Some(spec) = registry.spec(kind) {
            if params.is_object() {
                reasons.extend(spec.schema.validate(&params));
            }
        } else {
            reasons.push(format!("type {kind} has no registered handler"));
        }
    }

    if !reasons.is_empty() {
        return Err(reasons);
    }

    // All unwraps below are guarded by the empty-reasons check.
    Ok(ParsedSubmission {
        id: id.unwrap_or_default(),
        idempotency_key: idempotency_key.unwrap_or_default(),
        version,
        kind: kind.unwrap_or(IntentKind::Arm),
        params,
        operator_id: operator_id.unwrap_or_default(),
        reason: reason.unwrap_or_default(),
        submitted_at: submitted_at.unwrap_or_else(Utc::now),
        ttl_seconds,
        state_hash,
        signature: signature.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecutorError, IntentExecutor};
    use crate::registry::IntentRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use shared_types::{DangerLevel, IntentReceipt, IntentRecord};
    use std::sync::Arc;

    struct NoopExecutor;

    #[async_trait]
    impl IntentExecutor for NoopExecutor {
        async fn execute(&self, _i: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
            Ok(IntentReceipt::applied("noop"))
        }
    }

    fn registry() -> IntentRegistry {
        let mut registry = IntentRegistry::new();
        for kind in IntentKind::ALL {
            registry.register(kind, DangerLevel::Safe, true, Arc::new(NoopExecutor), None);
        }
        registry
    }

    fn valid_payload() -> Value {
        json!({
            "id": "11111111-2222-3333-4444-555555555555",
            "idempotency_key": "idem-1",
            "version": 1,
            "type": "SET_MODE",
            "params": {"mode": "paper"},
            "operator_id": "op-1",
            "reason": "routine",
            "submitted_at": "2026-03-01T12:00:00Z",
            "ttl_seconds": 30,
            "signature": "ab".repeat(32),
        })
    }

    #[test]
    fn test_valid_payload_parses() {
        let parsed = parse_submission(&valid_payload(), &registry()).unwrap();
        assert_eq!(parsed.kind, IntentKind::SetMode);
        assert_eq!(parsed.ttl_seconds, 30);
        assert!(parsed.state_hash.is_none());
    }

    #[test]
    fn test_missing_fields_accumulate() {
        let errors = parse_submission(&json!({}), &registry()).unwrap_err();
        assert!(errors.len() >= 6);
        assert!(errors.iter().any(|r| r.contains("id is required")));
        assert!(errors.iter().any(|r| r.contains("type is required")));
        assert!(errors.iter().any(|r| r.contains("ttl_seconds")));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut payload = valid_payload();
        payload["type"] = json!("SELF_DESTRUCT");
        let errors = parse_submission(&payload, &registry()).unwrap_err();
        assert!(errors.iter().any(|r| r.contains("not a recognized")));
    }

    #[test]
    fn test_kind_schema_enforced() {
        let mut payload = valid_payload();
        payload["params"] = json!({"mode": "turbo"});
        let errors = parse_submission(&payload, &registry()).unwrap_err();
        assert!(errors.iter().any(|r| r.contains("params.mode")));
    }

    #[test]
    fn test_bad_state_hash_shape() {
        let mut payload = valid_payload();
        payload["state_hash"] = json!("xyz");
        let errors = parse_submission(&payload, &registry()).unwrap_err();
        assert!(errors.iter().any(|r| r.contains("16 hex")));
    }

    #[test]
    fn test_ttl_bounds() {
        let mut payload = valid_payload();
        payload["ttl_seconds"] = json!(0);
        assert!(parse_submission(&payload, &registry()).is_err());
        payload["ttl_seconds"] = json!(999_999);
        assert!(parse_submission(&payload, &registry()).is_err());
    }

    #[test]
    fn test_non_object_payload() {
        let errors = parse_submission(&json!("hi"), &registry()).unwrap_err();
        assert_eq!(errors, vec!["payload must be a JSON object".to_string()]);
    }
}
