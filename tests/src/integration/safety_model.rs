//! Breaker escalation, config safety classes, and audit discipline.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared_types::{BreakerLayer, Posture, RiskState};

    use crate::harness::{runtime, settle, signed_intent};

    #[tokio::test]
    async fn test_reflex_trip_escalates_within_one_cycle() {
        let runtime = runtime();
        let outcome = runtime.breakers.trip(BreakerLayer::Reflex, "flash-crash").await;

        assert_eq!(outcome.risk_state, RiskState::Emergency);
        assert!(outcome.halted);
        assert!(!runtime.breakers.can_trade());

        runtime.projection.invalidate();
        let view = runtime.projection.view();
        assert_eq!(view.posture, Posture::Emergency);
        assert_eq!(view.breaker.risk_state, RiskState::Emergency);
        assert!(view.breaker.layers.reflex.tripped);
        assert_eq!(view.breaker.layers.reflex.trip_count, 1);
        assert_eq!(view.active_incidents.len(), 1);
    }

    #[tokio::test]
    async fn test_breaker_trip_lands_in_audit_with_state() {
        let runtime = runtime();
        runtime
            .breakers
            .trip(BreakerLayer::Transactional, "reject-rate")
            .await;
        settle().await;

        let records = runtime.audit.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "breaker");
        assert_eq!(records[0].action, "trip:transactional");
        let state_after = records[0].details.get("state_after").unwrap();
        assert_eq!(state_after["risk_state"], "CAUTIOUS");
    }

    #[tokio::test]
    async fn test_emergency_blocks_arm_until_resume() {
        let runtime = runtime();
        runtime.breakers.trip(BreakerLayer::Reflex, "heartbeat-loss").await;

        let err = runtime
            .intents
            .submit(&signed_intent("ARM", json!({}), "op-admin", "idem-s1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BLOCKED_BY_BREAKER");

        runtime
            .intents
            .submit(&signed_intent("RESUME", json!({}), "op-admin", "idem-s2"))
            .await
            .unwrap();
        settle().await;
        assert!(runtime.breakers.can_trade());
        assert_eq!(runtime.state.snapshot().risk_state, RiskState::Normal);

        let response = runtime
            .intents
            .submit(&signed_intent("ARM", json!({}), "op-admin", "idem-s3"))
            .await
            .unwrap();
        assert_eq!(response.outcome, shared_types::SubmitOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_risk_never_downgrades_without_operator() {
        let runtime = runtime();
        runtime.breakers.trip(BreakerLayer::Strategic, "drawdown").await;
        runtime.breakers.reset_layer(BreakerLayer::Strategic).await;
        // Layer is clear, risk state is not.
        assert!(!runtime
            .breakers
            .layer_state(BreakerLayer::Strategic)
            .tripped);
        assert_eq!(runtime.breakers.risk_state(), RiskState::Defensive);
    }

    #[tokio::test]
    async fn test_tighten_only_violation_leaves_no_receipt() {
        let runtime = runtime();
        let err = runtime
            .config_registry
            .create_override("risk.maxPositionNotional", json!(200_000.0), "op-admin", "size up")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Tighten-only"));
        assert!(runtime.config_registry.receipts().is_empty());
        assert_eq!(
            runtime
                .config_registry
                .effective_value("risk.maxPositionNotional")
                .unwrap(),
            json!(50_000.0)
        );
    }

    #[tokio::test]
    async fn test_override_then_rollback_restores_provenance() {
        let runtime = runtime();
        let before = runtime
            .config_registry
            .get_effective("exec.maxSlippageBps")
            .unwrap();

        let override_receipt = runtime
            .config_registry
            .create_override("exec.maxSlippageBps", json!(8.0), "op-admin", "tighter")
            .await
            .unwrap();
        let rollback_receipt = runtime
            .config_registry
            .rollback("exec.maxSlippageBps", "op-admin")
            .await
            .unwrap();

        assert_eq!(
            rollback_receipt.reverses.as_deref(),
            Some(override_receipt.id.as_str())
        );
        let after = runtime
            .config_registry
            .get_effective("exec.maxSlippageBps")
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_override_risk_intent_writes_receipt_and_audit() {
        let runtime = runtime();
        let payload = signed_intent(
            "OVERRIDE_RISK",
            json!({"key": "risk.maxPositionNotional", "value": 20_000.0}),
            "op-admin",
            "idem-s4",
        );
        runtime.intents.submit(&payload).await.unwrap();
        settle().await;

        assert_eq!(runtime.config_registry.receipts().len(), 1);
        assert_eq!(
            runtime
                .config_registry
                .effective_value("risk.maxPositionNotional")
                .unwrap(),
            json!(20_000.0)
        );
        // Exactly one audit entry: the intent resolution.
        assert_eq!(runtime.audit.len(), 1);
        assert_eq!(runtime.audit.all()[0].action, "OVERRIDE_RISK");
    }
}
