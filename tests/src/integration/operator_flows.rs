//! Intent pipeline end to end over a fully wired runtime.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared_types::{IntentStatus, SubmitError, SubmitOutcome, TradingMode};

    use crate::harness::{runtime, settle, signed_intent};

    #[tokio::test]
    async fn test_arm_idempotent_hit_end_to_end() {
        let runtime = runtime();
        let payload = signed_intent("ARM", json!({}), "op-admin", "idem-1");

        let first = runtime.intents.submit(&payload).await.unwrap();
        assert_eq!(first.outcome, SubmitOutcome::Accepted);

        let second = runtime.intents.submit(&payload).await.unwrap();
        assert_eq!(second.outcome, SubmitOutcome::IdempotentHit);
        assert_eq!(second.intent, first.intent);

        settle().await;
        // World armed, exactly one audit entry, exactly one record.
        assert!(runtime.state.snapshot().armed);
        assert_eq!(runtime.audit.len(), 1);
        assert_eq!(runtime.intents.list(&Default::default()).total, 1);
    }

    #[tokio::test]
    async fn test_bad_signature_is_silent() {
        let runtime = runtime();
        let mut payload = signed_intent("DISARM", json!({}), "op-admin", "idem-2");
        payload["signature"] = json!("00".repeat(32));

        let err = runtime.intents.submit(&payload).await.unwrap_err();
        assert_eq!(err, SubmitError::SignatureInvalid);

        settle().await;
        assert_eq!(runtime.intents.list(&Default::default()).total, 0);
        assert_eq!(runtime.audit.len(), 0);
        assert_eq!(runtime.intents.hub().last_event_id(), 0);
    }

    #[tokio::test]
    async fn test_stale_state_hash_conflicts() {
        let runtime = runtime();
        let mut payload = signed_intent("SET_MODE", json!({"mode": "live"}), "op-admin", "idem-3");
        payload["state_hash"] = json!("deadbeefdeadbeef");

        let err = runtime.intents.submit(&payload).await.unwrap_err();
        assert_eq!(err.code(), "STATE_CONFLICT");
        assert_eq!(runtime.state.snapshot().mode, TradingMode::Paper);
    }

    #[tokio::test]
    async fn test_fresh_state_hash_never_conflicts() {
        let runtime = runtime();
        let mut payload = signed_intent("SET_MODE", json!({"mode": "shadow"}), "op-admin", "idem-4");
        payload["state_hash"] = json!(runtime.state.current_hash());

        let response = runtime.intents.submit(&payload).await.unwrap();
        assert_eq!(response.outcome, SubmitOutcome::Accepted);
        settle().await;
        assert_eq!(runtime.state.snapshot().mode, TradingMode::Shadow);
    }

    #[tokio::test]
    async fn test_rbac_scopes_by_role() {
        let runtime = runtime();

        // Desk operators may arm but not halt.
        let arm = signed_intent("ARM", json!({}), "op-desk", "idem-5a");
        assert!(runtime.intents.submit(&arm).await.is_ok());

        let halt = signed_intent("HALT", json!({}), "op-desk", "idem-5b");
        let err = runtime.intents.submit(&halt).await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_PERMISSIONS");

        // Viewers change nothing.
        let view_arm = signed_intent("ARM", json!({}), "op-view", "idem-5c");
        assert!(runtime.intents.submit(&view_arm).await.is_err());
    }

    #[tokio::test]
    async fn test_lifecycle_reaches_verified_with_receipt() {
        let runtime = runtime();
        let payload = signed_intent(
            "THROTTLE_PHASE",
            json!({"phase": "phase2", "pct": 25}),
            "op-admin",
            "idem-6",
        );
        let response = runtime.intents.submit(&payload).await.unwrap();
        settle().await;

        let record = runtime.intents.get(&response.intent.id).unwrap();
        assert_eq!(record.status, IntentStatus::Verified);
        let receipt = record.receipt.unwrap();
        assert!(receipt.effect.contains("phase2"));
        assert_eq!(runtime.state.snapshot().phases.phase2, 25);
    }

    #[tokio::test]
    async fn test_sse_reconnect_catchup_is_monotonic() {
        let runtime = runtime();

        // A connected client sees some traffic, then "disconnects".
        runtime
            .intents
            .submit(&signed_intent("ARM", json!({}), "op-admin", "idem-7a"))
            .await
            .unwrap();
        settle().await;
        let last_seen = runtime.intents.hub().last_event_id();
        assert!(last_seen > 0);

        // Traffic continues while disconnected.
        runtime
            .intents
            .submit(&signed_intent("DISARM", json!({}), "op-admin", "idem-7b"))
            .await
            .unwrap();
        runtime
            .intents
            .submit(&signed_intent(
                "SET_MODE",
                json!({"mode": "shadow"}),
                "op-admin",
                "idem-7c",
            ))
            .await
            .unwrap();
        settle().await;

        // Reconnect: catch-up covers everything after last_seen, strictly
        // ascending, ending at the hub's current head.
        let catchup = runtime.intents.hub().replay_after(last_seen);
        assert!(catchup.complete);
        assert!(!catchup.events.is_empty());
        assert!(catchup.events.first().unwrap().id > last_seen);
        for pair in catchup.events.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
        assert_eq!(
            catchup.events.last().unwrap().id,
            runtime.intents.hub().last_event_id()
        );
    }

    #[tokio::test]
    async fn test_preview_is_side_effect_free() {
        let runtime = runtime();
        let reasons = runtime
            .intents
            .preview(&signed_intent("ARM", json!({}), "op-admin", "idem-8"))
            .await
            .unwrap();
        assert!(reasons.iter().any(|r| r.code == "rbac"));
        assert!(!runtime.state.snapshot().armed);
        assert_eq!(runtime.intents.list(&Default::default()).total, 0);
    }
}
