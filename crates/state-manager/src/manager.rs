//! World-state ownership and mutation.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};

use shared_crypto::state_hash;
use shared_types::{
    Allocation, BreakerStates, FillRecord, FillSide, Position, RiskState, TradingMode, WorldState,
};

/// Version stamp pushed on every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVersion {
    /// Monotonic mutation counter.
    pub version: u64,
    /// Fingerprint after the mutation.
    pub state_hash: String,
}

struct Inner {
    world: WorldState,
    hash: String,
    version: u64,
}

/// Exclusive owner of the canonical world state.
pub struct StateManager {
    inner: RwLock<Inner>,
    notify: watch::Sender<StateVersion>,
}

impl StateManager {
    #[must_use]
    pub fn new(initial: WorldState) -> Self {
        let hash = hash_of(&initial);
        let (notify, _) = watch::channel(StateVersion {
            version: 0,
            state_hash: hash.clone(),
        });
        Self {
            inner: RwLock::new(Inner {
                world: initial,
                hash,
                version: 0,
            }),
            notify,
        }
    }

    /// Read-only copy of the current world state.
    #[must_use]
    pub fn snapshot(&self) -> WorldState {
        self.inner.read().world.clone()
    }

    /// Current 16-hex-char fingerprint.
    #[must_use]
    pub fn current_hash(&self) -> String {
        self.inner.read().hash.clone()
    }

    /// Subscribe to mutation notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StateVersion> {
        self.notify.subscribe()
    }

    /// Apply one transactional mutation. The posture is re-derived and the
    /// fingerprint recomputed before the writer lock is released; the
    /// notification is sent after.
    fn mutate<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> (R, String) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let result = f(&mut inner.world);
        inner.world.posture = inner.world.derived_posture();
        inner.hash = hash_of(&inner.world);
        inner.version += 1;
        let version = StateVersion {
            version: inner.version,
            state_hash: inner.hash.clone(),
        };
        drop(guard);
        let hash = version.state_hash.clone();
        let _ = self.notify.send(version);
        (result, hash)
    }

    /// Arm or disarm order emission. Returns the new fingerprint.
    pub fn set_armed(&self, armed: bool) -> String {
        let ((), hash) = self.mutate(|w| {
            debug!(armed, "World armed flag set");
            w.armed = armed;
        });
        hash
    }

    pub fn set_mode(&self, mode: TradingMode) -> String {
        let ((), hash) = self.mutate(|w| {
            debug!(mode = mode.as_str(), "Trading mode set");
            w.mode = mode;
        });
        hash
    }

    pub fn set_halted(&self, halted: bool) -> String {
        let ((), hash) = self.mutate(|w| {
            if halted {
                warn!("World halted");
            } else {
                debug!("World halt cleared");
            }
            w.halted = halted;
        });
        hash
    }

    /// Set one phase throttle percentage. Returns `None` for an unknown
    /// phase name (schema validation should have caught it upstream).
    pub fn set_phase_throttle(&self, phase: &str, pct: u8) -> Option<String> {
        let (ok, hash) = self.mutate(|w| w.phases.set(phase, pct));
        ok.then_some(hash)
    }

    pub fn set_allocation(&self, allocation: Allocation) -> String {
        let ((), hash) = self.mutate(|w| {
            debug!(w1 = allocation.w1, w2 = allocation.w2, w3 = allocation.w3, "Allocation applied");
            w.allocation = allocation;
        });
        hash
    }

    pub fn set_truth_confidence(&self, confidence: f64) -> String {
        let ((), hash) = self.mutate(|w| w.truth_confidence = confidence.clamp(0.0, 1.0));
        hash
    }

    /// Drop all open positions (flatten). Returns the closed positions.
    pub fn clear_positions(&self) -> Vec<Position> {
        let (closed, _) = self.mutate(|w| std::mem::take(&mut w.positions));
        closed
    }

    /// Mirror the breaker tree's escalation into the world. `halt` is set
    /// (never cleared) by this path; clearing halt is an operator resume.
    pub fn apply_risk(&self, risk: RiskState, breakers: BreakerStates, halt: bool) -> String {
        let ((), hash) = self.mutate(|w| {
            w.risk_state = risk;
            w.breaker_states = breakers;
            if halt {
                w.halted = true;
            }
        });
        hash
    }

    /// Operator resume: clear halt, reset risk to normal, mirror the reset
    /// breaker states.
    pub fn apply_resume(&self, breakers: BreakerStates) -> String {
        let ((), hash) = self.mutate(|w| {
            w.risk_state = RiskState::Normal;
            w.breaker_states = breakers;
            w.halted = false;
        });
        hash
    }

    /// Apply a real fill to positions and realized equity. Shadow fills
    /// are ignored here by contract.
    pub fn apply_fill(&self, fill: &FillRecord) -> String {
        let ((), hash) = self.mutate(|w| {
            if fill.shadow {
                return;
            }
            apply_fill_to(w, fill);
        });
        hash
    }

    /// Replace the whole world (hydration from a replayed snapshot).
    pub fn restore(&self, world: WorldState) -> String {
        let ((), hash) = self.mutate(|w| *w = world);
        hash
    }
}

fn hash_of(world: &WorldState) -> String {
    // WorldState serialization cannot fail; fall back to a sentinel that
    // will never match a client-supplied hash.
    state_hash(world).unwrap_or_else(|_| "0000000000000000".to_string())
}

/// Apply one real fill to a world's positions and realized equity. Pure
/// over its inputs; the replay engine uses this to re-derive historical
/// state from the fill journal.
pub fn apply_fill_to(world: &mut WorldState, fill: &FillRecord) {
    let signed_qty = match fill.side {
        FillSide::Buy => fill.qty,
        FillSide::Sell => -fill.qty,
    };

    let idx = world
        .positions
        .iter()
        .position(|p| p.venue == fill.venue && p.symbol == fill.symbol);

    match idx {
        None => {
            world.positions.push(Position {
                venue: fill.venue.clone(),
                symbol: fill.symbol.clone(),
                qty: signed_qty,
                avg_price: fill.price,
            });
        }
        Some(i) => {
            let position = &mut world.positions[i];
            let old_qty = position.qty;
            let new_qty = old_qty + signed_qty;

            if old_qty.signum() == signed_qty.signum() {
                // Same direction: extend at weighted average price.
                let notional = position.avg_price * old_qty.abs() + fill.price * fill.qty;
                position.avg_price = notional / (old_qty.abs() + fill.qty);
            } else {
                // Reducing or crossing: realize pnl on the closed slice.
                let closed = old_qty.abs().min(fill.qty);
                let direction = old_qty.signum();
                world.equity += (fill.price - position.avg_price) * closed * direction;
                if new_qty.signum() != old_qty.signum() && new_qty != 0.0 {
                    // Crossed through zero; remainder opens at fill price.
                    position.avg_price = fill.price;
                }
            }

            if new_qty.abs() < 1e-12 {
                world.positions.remove(i);
            } else {
                world.positions[i].qty = new_qty;
            }
        }
    }
}
