//! The breaker tree and its escalation rules.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use shared_bus::{BreakerTripEvent, EventPublisher};
use shared_types::{BreakerLayer, BreakerLayerState, BreakerStates, RiskState};
use state_manager::StateManager;

/// Result of one trip call.
#[derive(Debug, Clone, PartialEq)]
pub struct TripOutcome {
    pub layer: BreakerLayer,
    /// Risk state after escalation.
    pub risk_state: RiskState,
    /// Whether this trip forces a platform halt (reflex only).
    pub halted: bool,
    pub layer_state: BreakerLayerState,
}

struct LayerCell {
    trip_count: AtomicU32,
    state: RwLock<BreakerLayerState>,
}

impl LayerCell {
    fn new() -> Self {
        Self {
            trip_count: AtomicU32::new(0),
            state: RwLock::new(BreakerLayerState::default()),
        }
    }

    fn snapshot(&self) -> BreakerLayerState {
        let mut state = self.state.read().clone();
        state.trip_count = self.trip_count.load(Ordering::Relaxed);
        state
    }
}

/// The breaker tree. Exclusive owner of breaker and risk-state
/// transitions; mirrors every change into the world state.
pub struct BreakerTree {
    reflex: LayerCell,
    transactional: LayerCell,
    strategic: LayerCell,
    risk: RwLock<RiskState>,
    state: Arc<StateManager>,
    publisher: RwLock<Option<Arc<dyn EventPublisher>>>,
}

impl BreakerTree {
    #[must_use]
    pub fn new(state: Arc<StateManager>) -> Self {
        Self {
            reflex: LayerCell::new(),
            transactional: LayerCell::new(),
            strategic: LayerCell::new(),
            risk: RwLock::new(RiskState::Normal),
            state,
            publisher: RwLock::new(None),
        }
    }

    /// Attach the bus publisher used for trip/reset events.
    pub fn attach_publisher(&self, publisher: Arc<dyn EventPublisher>) {
        *self.publisher.write() = Some(publisher);
    }

    fn cell(&self, layer: BreakerLayer) -> &LayerCell {
        match layer {
            BreakerLayer::Reflex => &self.reflex,
            BreakerLayer::Transactional => &self.transactional,
            BreakerLayer::Strategic => &self.strategic,
        }
    }

    /// Trip one layer: bump counters, escalate the risk state per the
    /// table, mirror into the world, and emit a breaker event.
    pub async fn trip(&self, layer: BreakerLayer, reason: &str) -> TripOutcome {
        let cell = self.cell(layer);
        cell.trip_count.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = cell.state.write();
            state.tripped = true;
            state.last_trip_time = Some(Utc::now());
            state.reason = Some(reason.to_string());
        }

        let (risk_after, halt) = {
            let mut risk = self.risk.write();
            let escalated = escalate(*risk, layer);
            *risk = escalated;
            (escalated, layer == BreakerLayer::Reflex)
        };

        match layer {
            BreakerLayer::Reflex => {
                error!(layer = %layer, reason, risk = %risk_after, "Reflex breaker tripped, halting")
            }
            _ => warn!(layer = %layer, reason, risk = %risk_after, "Breaker tripped"),
        }

        // Mirror into the world state within the same mutation cycle.
        self.state.apply_risk(risk_after, self.snapshot_layers(), halt);

        self.publish(BreakerTripEvent {
            layer,
            reason: reason.to_string(),
            risk_state: risk_after,
            tripped: true,
            at: Utc::now(),
        })
        .await;

        TripOutcome {
            layer,
            risk_state: risk_after,
            halted: halt,
            layer_state: self.cell(layer).snapshot(),
        }
    }

    /// Reset one layer without touching the risk state. Used by targeted
    /// operator resets; a full resume goes through [`resume`].
    ///
    /// [`resume`]: BreakerTree::resume
    pub async fn reset_layer(&self, layer: BreakerLayer) {
        {
            let mut state = self.cell(layer).state.write();
            state.tripped = false;
            state.reason = None;
        }
        info!(layer = %layer, "Breaker layer reset");
        self.state
            .apply_risk(self.risk_state(), self.snapshot_layers(), false);
        self.publish(BreakerTripEvent {
            layer,
            reason: "reset".to_string(),
            risk_state: self.risk_state(),
            tripped: false,
            at: Utc::now(),
        })
        .await;
    }

    /// Operator resume: clear every layer, return the risk state to
    /// `NORMAL`, and lift the halt.
    pub async fn resume(&self) -> RiskState {
        for layer in [
            BreakerLayer::Reflex,
            BreakerLayer::Transactional,
            BreakerLayer::Strategic,
        ] {
            let mut state = self.cell(layer).state.write();
            state.tripped = false;
            state.reason = None;
        }
        *self.risk.write() = RiskState::Normal;
        info!("Breakers resumed, risk state normal");

        self.state.apply_resume(self.snapshot_layers());
        self.publish(BreakerTripEvent {
            layer: BreakerLayer::Reflex,
            reason: "resume".to_string(),
            risk_state: RiskState::Normal,
            tripped: false,
            at: Utc::now(),
        })
        .await;
        RiskState::Normal
    }

    /// Current risk state.
    #[must_use]
    pub fn risk_state(&self) -> RiskState {
        *self.risk.read()
    }

    /// Whether any trading activity is allowed at all.
    #[must_use]
    pub fn can_trade(&self) -> bool {
        self.risk_state() != RiskState::Emergency
    }

    /// Whether new position-opening orders are allowed. Defensive mode
    /// only manages existing exposure.
    #[must_use]
    pub fn can_open_new_positions(&self) -> bool {
        self.risk_state() <= RiskState::Cautious
    }

    /// Introspection snapshot of one layer.
    #[must_use]
    pub fn layer_state(&self, layer: BreakerLayer) -> BreakerLayerState {
        self.cell(layer).snapshot()
    }

    /// Snapshot of all three layers.
    #[must_use]
    pub fn snapshot_layers(&self) -> BreakerStates {
        BreakerStates {
            reflex: self.reflex.snapshot(),
            transactional: self.transactional.snapshot(),
            strategic: self.strategic.snapshot(),
        }
    }

    async fn publish(&self, event: BreakerTripEvent) {
        let publisher = self.publisher.read().clone();
        if let Some(publisher) = publisher {
            let msg = event.to_message();
            if let Err(e) = publisher.publish(&msg.subject, msg.payload).await {
                error!(error = %e, "Breaker event publish failed");
            }
        }
    }
}

/// The escalation table. Risk only ever rises here.
fn escalate(current: RiskState, layer: BreakerLayer) -> RiskState {
    match layer {
        BreakerLayer::Reflex => RiskState::Emergency,
        BreakerLayer::Transactional => {
            if current == RiskState::Normal {
                RiskState::Cautious
            } else {
                current
            }
        }
        BreakerLayer::Strategic => {
            if current <= RiskState::Cautious {
                RiskState::Defensive
            } else {
                current
            }
        }
    }
}
