//! Read-model composition and caching.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use circuit_breakers::BreakerTree;
use config_registry::ConfigRegistry;
use intent_service::IntentService;
use shared_types::{
    BreakerLayer, BreakerStates, DangerLevel, IntentKind, IntentStatus, PhaseThrottles, Posture,
    RiskState, TradingMode,
};
use state_manager::StateManager;

/// Cache lifetime for the composed view.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(250);

/// How many recent intents ride along in the view.
const LAST_INTENTS: usize = 10;

/// Breaker section of the operator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerView {
    pub risk_state: RiskState,
    pub can_trade: bool,
    pub can_open_new_positions: bool,
    pub layers: BreakerStates,
}

/// One open breaker trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub layer: BreakerLayer,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tripped_at: Option<DateTime<Utc>>,
    pub trip_count: u32,
}

/// Compressed intent line for the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub status: IntentStatus,
    pub operator_id: String,
    pub submitted_at: DateTime<Utc>,
    pub danger_level: DangerLevel,
}

/// The unified operator state payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorStateView {
    pub mode: TradingMode,
    pub posture: Posture,
    pub phases: PhaseThrottles,
    pub truth_confidence: f64,
    pub breaker: BreakerView,
    pub active_incidents: Vec<Incident>,
    pub last_intents: Vec<IntentSummary>,
    pub state_hash: String,
    pub last_updated: DateTime<Utc>,
}

struct CacheSlot {
    built_at: Instant,
    view: Arc<OperatorStateView>,
}

/// Read-only aggregation over the four owning subsystems.
pub struct StateProjection {
    state: Arc<StateManager>,
    breakers: Arc<BreakerTree>,
    intents: Arc<IntentService>,
    config: Arc<ConfigRegistry>,
    cache: Mutex<Option<CacheSlot>>,
    cache_ttl: Duration,
}

impl StateProjection {
    #[must_use]
    pub fn new(
        state: Arc<StateManager>,
        breakers: Arc<BreakerTree>,
        intents: Arc<IntentService>,
        config: Arc<ConfigRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            breakers,
            intents,
            config,
            cache: Mutex::new(None),
            cache_ttl: DEFAULT_CACHE_TTL,
        })
    }

    /// Start the invalidation listener: any world mutation drops the
    /// cached view immediately instead of waiting out the TTL.
    pub fn spawn_invalidator(self: Arc<Self>) {
        let mut rx = self.state.subscribe();
        let projection = self;
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                projection.invalidate();
            }
            debug!("State watch closed, invalidator stopping");
        });
    }

    /// Drop the cached view.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    /// The current view, rebuilt at most once per TTL window.
    #[must_use]
    pub fn view(&self) -> Arc<OperatorStateView> {
        {
            let cache = self.cache.lock();
            if let Some(slot) = cache.as_ref() {
                if slot.built_at.elapsed() < self.cache_ttl {
                    return Arc::clone(&slot.view);
                }
            }
        }

        let view = Arc::new(self.build());
        *self.cache.lock() = Some(CacheSlot {
            built_at: Instant::now(),
            view: Arc::clone(&view),
        });
        view
    }

    /// Effective config values, top of each key's provenance chain.
    #[must_use]
    pub fn config_summary(&self) -> BTreeMap<String, Value> {
        self.config
            .effective_summary()
            .into_iter()
            .map(|(key, effective)| (key, effective.value))
            .collect()
    }

    fn build(&self) -> OperatorStateView {
        let world = self.state.snapshot();
        let layers = self.breakers.snapshot_layers();

        let active_incidents = [
            (BreakerLayer::Reflex, &layers.reflex),
            (BreakerLayer::Transactional, &layers.transactional),
            (BreakerLayer::Strategic, &layers.strategic),
        ]
        .into_iter()
        .filter(|(_, state)| state.tripped)
        .map(|(layer, state)| Incident {
            layer,
            reason: state.reason.clone().unwrap_or_default(),
            tripped_at: state.last_trip_time,
            trip_count: state.trip_count,
        })
        .collect();

        let last_intents = self
            .intents
            .recent(LAST_INTENTS)
            .into_iter()
            .map(|r| IntentSummary {
                id: r.id,
                kind: r.kind,
                status: r.status,
                operator_id: r.operator_id,
                submitted_at: r.submitted_at,
                danger_level: r.danger_level,
            })
            .collect();

        OperatorStateView {
            mode: world.mode,
            posture: world.posture,
            phases: world.phases,
            truth_confidence: world.truth_confidence,
            breaker: BreakerView {
                risk_state: self.breakers.risk_state(),
                can_trade: self.breakers.can_trade(),
                can_open_new_positions: self.breakers.can_open_new_positions(),
                layers,
            },
            active_incidents,
            last_intents,
            state_hash: self.state.current_hash(),
            last_updated: Utc::now(),
        }
    }
}
