//! # Standard Executors
//!
//! The platform's built-in executor and verifier set, one per intent
//! kind, wired against the state manager, breaker tree, config registry,
//! and bus. The runtime registers these into an [`IntentRegistry`] at
//! startup; tests swap in stubs where needed.
//!
//! [`IntentRegistry`]: crate::registry::IntentRegistry

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use circuit_breakers::BreakerTree;
use config_registry::ConfigRegistry;
use shared_bus::{EventPublisher, HaltCommand, OrderCommand};
use shared_types::{
    Allocation, DangerLevel, FillSide, IntentKind, IntentReceipt, IntentRecord, TradingMode,
    WorldState,
};
use state_manager::StateManager;

use crate::exec::{ExecutorError, IntentExecutor, IntentVerifier, VerifyOutcome};
use crate::registry::IntentRegistry;

/// Shared handles for the standard executor set.
#[derive(Clone)]
pub struct StandardDeps {
    pub state: Arc<StateManager>,
    pub breakers: Arc<BreakerTree>,
    pub config: Arc<ConfigRegistry>,
    pub publisher: Arc<dyn EventPublisher>,
    /// Venue account used for flatten orders.
    pub account: String,
}

/// Build the full production registry: all eleven kinds, with verifiers
/// where the effect is observable in world state.
#[must_use]
pub fn standard_registry(deps: &StandardDeps) -> IntentRegistry {
    let mut registry = IntentRegistry::new();
    registry
        .register(
            IntentKind::Arm,
            DangerLevel::Moderate,
            false,
            Arc::new(ArmExecutor {
                state: deps.state.clone(),
                armed: true,
            }),
            Some(Arc::new(WorldProbeVerifier::armed(deps.state.clone(), true))),
        )
        .register(
            IntentKind::Disarm,
            DangerLevel::Safe,
            true,
            Arc::new(ArmExecutor {
                state: deps.state.clone(),
                armed: false,
            }),
            Some(Arc::new(WorldProbeVerifier::armed(
                deps.state.clone(),
                false,
            ))),
        )
        .register(
            IntentKind::SetMode,
            DangerLevel::Critical,
            false,
            Arc::new(SetModeExecutor {
                state: deps.state.clone(),
            }),
            Some(Arc::new(WorldProbeVerifier::mode(deps.state.clone()))),
        )
        .register(
            IntentKind::ThrottlePhase,
            DangerLevel::Moderate,
            true,
            Arc::new(ThrottlePhaseExecutor {
                state: deps.state.clone(),
            }),
            None,
        )
        .register(
            IntentKind::Flatten,
            DangerLevel::Critical,
            true,
            Arc::new(FlattenExecutor {
                state: deps.state.clone(),
                publisher: deps.publisher.clone(),
                account: deps.account.clone(),
            }),
            Some(Arc::new(WorldProbeVerifier::flat(deps.state.clone()))),
        )
        .register(
            IntentKind::OverrideRisk,
            DangerLevel::Critical,
            false,
            Arc::new(OverrideRiskExecutor {
                config: deps.config.clone(),
            }),
            None,
        )
        .register(
            IntentKind::ApplyProposal,
            DangerLevel::Moderate,
            false,
            Arc::new(ApplyProposalExecutor {
                state: deps.state.clone(),
            }),
            None,
        )
        .register(
            IntentKind::RollbackConfig,
            DangerLevel::Moderate,
            true,
            Arc::new(RollbackConfigExecutor {
                config: deps.config.clone(),
            }),
            None,
        )
        .register(
            IntentKind::RunReconcile,
            DangerLevel::Safe,
            true,
            Arc::new(RunReconcileExecutor {
                state: deps.state.clone(),
            }),
            None,
        )
        .register(
            IntentKind::Halt,
            DangerLevel::Critical,
            true,
            Arc::new(HaltExecutor {
                state: deps.state.clone(),
                publisher: deps.publisher.clone(),
            }),
            Some(Arc::new(WorldProbeVerifier::halted(deps.state.clone()))),
        )
        .register(
            IntentKind::Resume,
            DangerLevel::Critical,
            true,
            Arc::new(ResumeExecutor {
                breakers: deps.breakers.clone(),
            }),
            Some(Arc::new(WorldProbeVerifier::resumed(deps.state.clone()))),
        );
    registry
}

// =============================================================================
// EXECUTORS
// =============================================================================

struct ArmExecutor {
    state: Arc<StateManager>,
    armed: bool,
}

#[async_trait]
impl IntentExecutor for ArmExecutor {
    async fn execute(&self, _intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let prior = self.state.snapshot().armed;
        self.state.set_armed(self.armed);
        let mut receipt = IntentReceipt::applied(if self.armed { "armed" } else { "disarmed" });
        receipt.prior_state = Some(json!({"armed": prior}));
        receipt.new_state = Some(json!({"armed": self.armed}));
        Ok(receipt)
    }
}

struct SetModeExecutor {
    state: Arc<StateManager>,
}

#[async_trait]
impl IntentExecutor for SetModeExecutor {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let mode = match intent.params.get("mode").and_then(Value::as_str) {
            Some("paper") => TradingMode::Paper,
            Some("shadow") => TradingMode::Shadow,
            Some("live") => TradingMode::Live,
            other => {
                return Err(ExecutorError::new(format!("unrecognized mode {other:?}")));
            }
        };
        let prior = self.state.snapshot().mode;
        self.state.set_mode(mode);
        let mut receipt = IntentReceipt::applied(format!("mode set to {}", mode.as_str()));
        receipt.prior_state = Some(json!({"mode": prior.as_str()}));
        receipt.new_state = Some(json!({"mode": mode.as_str()}));
        Ok(receipt)
    }
}

struct ThrottlePhaseExecutor {
    state: Arc<StateManager>,
}

#[async_trait]
impl IntentExecutor for ThrottlePhaseExecutor {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let phase = intent
            .params
            .get("phase")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutorError::new("missing phase"))?;
        let pct = intent
            .params
            .get("pct")
            .and_then(Value::as_u64)
            .ok_or_else(|| ExecutorError::new("missing pct"))?;
        let pct = u8::try_from(pct).map_err(|_| ExecutorError::new("pct out of range"))?;

        let prior = self.state.snapshot().phases;
        self.state
            .set_phase_throttle(phase, pct)
            .ok_or_else(|| ExecutorError::new(format!("unknown phase {phase}")))?;

        let mut receipt = IntentReceipt::applied(format!("{phase} throttled to {pct}%"));
        receipt.prior_state = Some(json!({"phases": prior}));
        receipt.new_state = Some(json!({"phases": self.state.snapshot().phases}));
        Ok(receipt)
    }
}

struct FlattenExecutor {
    state: Arc<StateManager>,
    publisher: Arc<dyn EventPublisher>,
    account: String,
}

#[async_trait]
impl IntentExecutor for FlattenExecutor {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let closed = self.state.clear_positions();

        // One market order per closed position, opposite side.
        for position in &closed {
            let order = OrderCommand {
                venue: position.venue.clone(),
                account: self.account.clone(),
                symbol: position.symbol.clone(),
                side: if position.qty > 0.0 {
                    FillSide::Sell
                } else {
                    FillSide::Buy
                },
                qty: position.qty.abs(),
                order_type: "market".to_string(),
                reason: format!("flatten:{}", intent.id),
                issued_at: Utc::now(),
            };
            let msg = order.to_message();
            if let Err(e) = self.publisher.publish(&msg.subject, msg.payload).await {
                warn!(symbol = %position.symbol, error = %e, "Flatten order publish failed");
            }
        }

        let mut receipt =
            IntentReceipt::applied(format!("flattened {} position(s)", closed.len()));
        receipt.prior_state = Some(json!({"positions": closed}));
        receipt.new_state = Some(json!({"positions": []}));
        Ok(receipt)
    }
}

struct OverrideRiskExecutor {
    config: Arc<ConfigRegistry>,
}

#[async_trait]
impl IntentExecutor for OverrideRiskExecutor {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let key = intent
            .params
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutorError::new("missing key"))?;
        let value = intent
            .params
            .get("value")
            .cloned()
            .ok_or_else(|| ExecutorError::new("missing value"))?;

        let receipt = self
            .config
            .create_override(key, value.clone(), &intent.operator_id, &intent.reason)
            .await
            .map_err(|e| ExecutorError::new(e.to_string()))?;

        let mut out = IntentReceipt::applied(format!("override {key}"));
        out.prior_state = Some(json!({key: receipt.previous_value}));
        out.new_state = Some(json!({key: receipt.new_value}));
        out.verification_evidence = vec![json!({"receipt_id": receipt.id})];
        Ok(out)
    }
}

struct ApplyProposalExecutor {
    state: Arc<StateManager>,
}

#[async_trait]
impl IntentExecutor for ApplyProposalExecutor {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let proposal_id = intent
            .params
            .get("proposal_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let allocation: Allocation = intent
            .params
            .get("allocation")
            .cloned()
            .ok_or_else(|| ExecutorError::new("missing allocation"))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| ExecutorError::new(e.to_string()))
            })?;
        if !allocation.is_normalized() {
            return Err(ExecutorError::new("allocation weights must sum to 1.0"));
        }

        let prior = self.state.snapshot().allocation;
        self.state.set_allocation(allocation.clone());

        let mut receipt = IntentReceipt::applied(format!("proposal {proposal_id} applied"));
        receipt.prior_state = Some(json!({"allocation": prior}));
        receipt.new_state = Some(json!({"allocation": allocation}));
        Ok(receipt)
    }
}

struct RollbackConfigExecutor {
    config: Arc<ConfigRegistry>,
}

#[async_trait]
impl IntentExecutor for RollbackConfigExecutor {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let key = intent
            .params
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutorError::new("missing key"))?;

        let receipt = self
            .config
            .rollback(key, &intent.operator_id)
            .await
            .map_err(|e| ExecutorError::new(e.to_string()))?;

        let mut out = IntentReceipt::applied(format!("rollback {key}"));
        out.prior_state = Some(json!({key: receipt.previous_value}));
        out.new_state = Some(json!({key: receipt.new_value}));
        out.verification_evidence = vec![json!({"receipt_id": receipt.id})];
        Ok(out)
    }
}

struct RunReconcileExecutor {
    state: Arc<StateManager>,
}

#[async_trait]
impl IntentExecutor for RunReconcileExecutor {
    async fn execute(&self, _intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        // Reconciliation walks current positions and reports what it saw;
        // position mutation happens only through the fills consumer.
        let world = self.state.snapshot();
        let gross: f64 = world
            .positions
            .iter()
            .map(|p| p.qty.abs() * p.avg_price)
            .sum();
        let mut receipt = IntentReceipt::applied(format!(
            "reconciled {} position(s), gross notional {gross:.2}",
            world.positions.len()
        ));
        receipt.new_state = Some(json!({
            "positions": world.positions.len(),
            "gross_notional": gross,
            "equity": world.equity,
        }));
        Ok(receipt)
    }
}

struct HaltExecutor {
    state: Arc<StateManager>,
    publisher: Arc<dyn EventPublisher>,
}

#[async_trait]
impl IntentExecutor for HaltExecutor {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let prior = self.state.snapshot().halted;
        self.state.set_halted(true);

        let halt = HaltCommand {
            reason: intent.reason.clone(),
            source: intent.operator_id.clone(),
            issued_at: Utc::now(),
        };
        let msg = halt.to_message();
        if let Err(e) = self.publisher.publish(&msg.subject, msg.payload).await {
            warn!(error = %e, "Halt command publish failed");
        }

        let mut receipt = IntentReceipt::applied("platform halted");
        receipt.prior_state = Some(json!({"halted": prior}));
        receipt.new_state = Some(json!({"halted": true}));
        Ok(receipt)
    }
}

struct ResumeExecutor {
    breakers: Arc<BreakerTree>,
}

#[async_trait]
impl IntentExecutor for ResumeExecutor {
    async fn execute(&self, _intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError> {
        let risk = self.breakers.resume().await;
        let mut receipt = IntentReceipt::applied("resumed, breakers reset");
        receipt.new_state = Some(json!({"risk_state": risk, "halted": false}));
        Ok(receipt)
    }
}

// =============================================================================
// VERIFIERS
// =============================================================================

/// Verifies an effect by probing the world state.
struct WorldProbeVerifier {
    state: Arc<StateManager>,
    probe: Probe,
}

enum Probe {
    Armed(bool),
    Mode,
    Flat,
    Halted,
    Resumed,
}

impl WorldProbeVerifier {
    fn armed(state: Arc<StateManager>, expect: bool) -> Self {
        Self {
            state,
            probe: Probe::Armed(expect),
        }
    }

    fn mode(state: Arc<StateManager>) -> Self {
        Self {
            state,
            probe: Probe::Mode,
        }
    }

    fn flat(state: Arc<StateManager>) -> Self {
        Self {
            state,
            probe: Probe::Flat,
        }
    }

    fn halted(state: Arc<StateManager>) -> Self {
        Self {
            state,
            probe: Probe::Halted,
        }
    }

    fn resumed(state: Arc<StateManager>) -> Self {
        Self {
            state,
            probe: Probe::Resumed,
        }
    }

    fn check(&self, world: &WorldState, intent: &IntentRecord) -> (bool, Value) {
        match &self.probe {
            Probe::Armed(expect) => (
                world.armed == *expect,
                json!({"check": "world.armed", "observed": world.armed}),
            ),
            Probe::Mode => {
                let wanted = intent.params.get("mode").and_then(Value::as_str);
                (
                    wanted == Some(world.mode.as_str()),
                    json!({"check": "world.mode", "observed": world.mode.as_str()}),
                )
            }
            Probe::Flat => (
                world.positions.is_empty(),
                json!({"check": "world.positions", "observed": world.positions.len()}),
            ),
            Probe::Halted => (
                world.halted,
                json!({"check": "world.halted", "observed": world.halted}),
            ),
            Probe::Resumed => (
                !world.halted && world.risk_state == shared_types::RiskState::Normal,
                json!({
                    "check": "world.risk_state",
                    "observed": world.risk_state,
                    "halted": world.halted,
                }),
            ),
        }
    }
}

#[async_trait]
impl IntentVerifier for WorldProbeVerifier {
    async fn verify(&self, intent: &IntentRecord, _receipt: &IntentReceipt) -> VerifyOutcome {
        let world = self.state.snapshot();
        let (verified, evidence) = self.check(&world, intent);
        VerifyOutcome {
            verified,
            evidence: vec![evidence],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_registry::{default_catalog, default_presets};
    use shared_bus::InMemoryEventBus;
    use shared_crypto::OpsSecret;
    use shared_types::IntentStatus;

    fn deps() -> StandardDeps {
        let state = Arc::new(StateManager::new(WorldState::default()));
        StandardDeps {
            breakers: Arc::new(BreakerTree::new(state.clone())),
            state,
            config: Arc::new(ConfigRegistry::in_memory(
                default_catalog(),
                default_presets(),
                OpsSecret::new(b"s".to_vec()),
            )),
            publisher: Arc::new(InMemoryEventBus::new()),
            account: "main".to_string(),
        }
    }

    fn intent(kind: IntentKind, params: Value) -> IntentRecord {
        IntentRecord {
            id: "i-1".into(),
            idempotency_key: "k-1".into(),
            version: 1,
            kind,
            params,
            operator_id: "op-1".into(),
            reason: "test".into(),
            submitted_at: Utc::now(),
            ttl_seconds: 30,
            state_hash: None,
            signature: "00".repeat(32),
            status: IntentStatus::Executing,
            danger_level: DangerLevel::Moderate,
            receipt: None,
        }
    }

    #[tokio::test]
    async fn test_registry_covers_all_kinds() {
        let registry = standard_registry(&deps());
        assert_eq!(registry.len(), IntentKind::ALL.len());
        for kind in IntentKind::ALL {
            assert!(registry.spec(kind).is_some(), "missing spec for {kind}");
        }
    }

    #[tokio::test]
    async fn test_arm_executor_and_verifier() {
        let deps = deps();
        let registry = standard_registry(&deps);
        let spec = registry.spec(IntentKind::Arm).unwrap();

        let record = intent(IntentKind::Arm, json!({}));
        let receipt = spec.executor.execute(&record).await.unwrap();
        assert!(deps.state.snapshot().armed);
        assert_eq!(receipt.new_state, Some(json!({"armed": true})));

        let outcome = spec
            .verifier
            .as_ref()
            .unwrap()
            .verify(&record, &receipt)
            .await;
        assert!(outcome.verified);
        assert!(!outcome.evidence.is_empty());
    }

    #[tokio::test]
    async fn test_set_mode_rejects_garbage_at_executor_boundary() {
        let deps = deps();
        let registry = standard_registry(&deps);
        let spec = registry.spec(IntentKind::SetMode).unwrap();
        let record = intent(IntentKind::SetMode, json!({"mode": "warp"}));
        let err = spec.executor.execute(&record).await.unwrap_err();
        assert!(err.0.contains("unrecognized mode"));
    }

    #[tokio::test]
    async fn test_flatten_publishes_orders_and_empties_book() {
        let deps = deps();
        let bus = Arc::new(InMemoryEventBus::new());
        let deps = StandardDeps {
            publisher: bus.clone(),
            ..deps
        };
        let mut orders = bus.subscribe("cmd.execution.place.v1.>");

        // Seed two positions through the fills path.
        deps.state.apply_fill(&shared_types::FillRecord {
            seq: 1,
            venue: "deribit".into(),
            symbol: "BTC-PERP".into(),
            side: FillSide::Buy,
            qty: 1.0,
            price: 60_000.0,
            timestamp: Utc::now(),
            shadow: false,
        });

        let registry = standard_registry(&deps);
        let spec = registry.spec(IntentKind::Flatten).unwrap();
        let record = intent(IntentKind::Flatten, json!({}));
        let receipt = spec.executor.execute(&record).await.unwrap();

        assert!(deps.state.snapshot().positions.is_empty());
        assert!(receipt.effect.contains("1 position"));

        let msg = tokio::time::timeout(std::time::Duration::from_millis(200), orders.recv())
            .await
            .expect("timeout")
            .expect("order");
        let order: OrderCommand = msg.decode().unwrap();
        assert_eq!(order.side, FillSide::Sell);
        assert_eq!(order.qty, 1.0);

        let outcome = spec
            .verifier
            .as_ref()
            .unwrap()
            .verify(&record, &receipt)
            .await;
        assert!(outcome.verified);
    }

    #[tokio::test]
    async fn test_override_risk_goes_through_registry_safety() {
        let deps = deps();
        let registry = standard_registry(&deps);
        let spec = registry.spec(IntentKind::OverrideRisk).unwrap();

        // A loosening override is rejected by the tighten-only class and
        // surfaces as an executor failure, not a panic.
        let record = intent(
            IntentKind::OverrideRisk,
            json!({"key": "risk.maxPositionNotional", "value": 500_000.0}),
        );
        let err = spec.executor.execute(&record).await.unwrap_err();
        assert!(err.0.contains("Tighten-only"));
    }

    #[tokio::test]
    async fn test_apply_proposal_validates_weights() {
        let deps = deps();
        let registry = standard_registry(&deps);
        let spec = registry.spec(IntentKind::ApplyProposal).unwrap();

        let bad = intent(
            IntentKind::ApplyProposal,
            json!({"proposal_id": "p-1", "allocation": {"w1": 0.9, "w2": 0.9, "w3": 0.9}}),
        );
        assert!(spec.executor.execute(&bad).await.is_err());

        let good = intent(
            IntentKind::ApplyProposal,
            json!({"proposal_id": "p-1", "allocation": {"w1": 0.5, "w2": 0.3, "w3": 0.2}}),
        );
        spec.executor.execute(&good).await.unwrap();
        let allocation = deps.state.snapshot().allocation;
        assert!((allocation.w1 - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_halt_and_resume_round_trip() {
        let deps = deps();
        let registry = standard_registry(&deps);

        let halt = registry.spec(IntentKind::Halt).unwrap();
        halt.executor
            .execute(&intent(IntentKind::Halt, json!({})))
            .await
            .unwrap();
        assert!(deps.state.snapshot().halted);

        let resume = registry.spec(IntentKind::Resume).unwrap();
        let record = intent(IntentKind::Resume, json!({}));
        let receipt = resume.executor.execute(&record).await.unwrap();
        assert!(!deps.state.snapshot().halted);

        let outcome = resume
            .verifier
            .as_ref()
            .unwrap()
            .verify(&record, &receipt)
            .await;
        assert!(outcome.verified);
    }
}
