//! # World State
//!
//! The canonical mutable state of the trading platform. The state manager
//! is the sole writer; every other subsystem sees read-only copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading mode for the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    /// Simulated fills, no venue connectivity.
    Paper,
    /// Live market data, shadow orders only.
    Shadow,
    /// Real orders against real venues.
    Live,
}

impl TradingMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Paper => "paper",
            TradingMode::Shadow => "shadow",
            TradingMode::Live => "live",
        }
    }
}

/// High-level safety summary derived from armed/risk/halt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Safe,
    Armed,
    Cautious,
    Defensive,
    Emergency,
}

impl Posture {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Posture::Safe => "safe",
            Posture::Armed => "armed",
            Posture::Cautious => "cautious",
            Posture::Defensive => "defensive",
            Posture::Emergency => "emergency",
        }
    }
}

/// Risk posture of the platform. Never downgrades automatically; only an
/// operator `RESUME` or breaker reset returns it to `NORMAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskState {
    Normal,
    Cautious,
    Defensive,
    Emergency,
}

impl RiskState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskState::Normal => "NORMAL",
            RiskState::Cautious => "CAUTIOUS",
            RiskState::Defensive => "DEFENSIVE",
            RiskState::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for RiskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three breaker layers, fastest reflex first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerLayer {
    /// Flash crash, heartbeat loss, tail-alpha breach. Forces emergency.
    Reflex,
    /// Order reject rate, slippage. Raises to cautious.
    Transactional,
    /// Daily drawdown, consecutive losses. Raises to defensive.
    Strategic,
}

impl BreakerLayer {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerLayer::Reflex => "reflex",
            BreakerLayer::Transactional => "transactional",
            BreakerLayer::Strategic => "strategic",
        }
    }
}

impl std::fmt::Display for BreakerLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-layer breaker introspection state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerLayerState {
    pub tripped: bool,
    pub trip_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trip_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// All three layers, in a fixed shape so canonical serialization is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerStates {
    pub reflex: BreakerLayerState,
    pub transactional: BreakerLayerState,
    pub strategic: BreakerLayerState,
}

impl BreakerStates {
    #[must_use]
    pub fn layer(&self, layer: BreakerLayer) -> &BreakerLayerState {
        match layer {
            BreakerLayer::Reflex => &self.reflex,
            BreakerLayer::Transactional => &self.transactional,
            BreakerLayer::Strategic => &self.strategic,
        }
    }

    pub fn layer_mut(&mut self, layer: BreakerLayer) -> &mut BreakerLayerState {
        match layer {
            BreakerLayer::Reflex => &mut self.reflex,
            BreakerLayer::Transactional => &mut self.transactional,
            BreakerLayer::Strategic => &mut self.strategic,
        }
    }
}

/// One open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub venue: String,
    pub symbol: String,
    /// Signed quantity; negative means short.
    pub qty: f64,
    pub avg_price: f64,
}

/// Capital allocation across the three signal phases. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub w1: f64,
    pub w2: f64,
    pub w3: f64,
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            w1: 0.4,
            w2: 0.35,
            w3: 0.25,
        }
    }
}

impl Allocation {
    /// True when the weights form a valid allocation (non-negative, sum ~1).
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        let sum = self.w1 + self.w2 + self.w3;
        self.w1 >= 0.0 && self.w2 >= 0.0 && self.w3 >= 0.0 && (sum - 1.0).abs() < 1e-9
    }
}

/// Per-phase throttle percentage (0 = fully throttled, 100 = full flow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseThrottles {
    pub phase1: u8,
    pub phase2: u8,
    pub phase3: u8,
}

impl Default for PhaseThrottles {
    fn default() -> Self {
        Self {
            phase1: 100,
            phase2: 100,
            phase3: 100,
        }
    }
}

impl PhaseThrottles {
    /// Set the throttle for a named phase. Unknown names are rejected by
    /// schema validation upstream; this returns false for them anyway.
    pub fn set(&mut self, phase: &str, pct: u8) -> bool {
        match phase {
            "phase1" => self.phase1 = pct,
            "phase2" => self.phase2 = pct,
            "phase3" => self.phase3 = pct,
            _ => return false,
        }
        true
    }
}

/// The canonical world state. Owned exclusively by the state manager; the
/// 16-hex-char `state_hash` is recomputed over the canonical serialization
/// of this struct on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub armed: bool,
    pub mode: TradingMode,
    pub halted: bool,
    pub posture: Posture,
    pub positions: Vec<Position>,
    pub allocation: Allocation,
    pub phases: PhaseThrottles,
    pub risk_state: RiskState,
    pub breaker_states: BreakerStates,
    pub equity: f64,
    /// Advisory analyst confidence in [0, 1]. Never gates intents.
    pub truth_confidence: f64,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            armed: false,
            mode: TradingMode::Paper,
            halted: false,
            posture: Posture::Safe,
            positions: Vec::new(),
            allocation: Allocation::default(),
            phases: PhaseThrottles::default(),
            risk_state: RiskState::Normal,
            breaker_states: BreakerStates::default(),
            equity: 0.0,
            truth_confidence: 1.0,
        }
    }
}

impl WorldState {
    /// Derive the posture implied by the rest of the state.
    #[must_use]
    pub fn derived_posture(&self) -> Posture {
        if self.halted || self.risk_state == RiskState::Emergency {
            Posture::Emergency
        } else if self.risk_state == RiskState::Defensive {
            Posture::Defensive
        } else if self.risk_state == RiskState::Cautious {
            Posture::Cautious
        } else if self.armed {
            Posture::Armed
        } else {
            Posture::Safe
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_world_is_safe() {
        let world = WorldState::default();
        assert!(!world.armed);
        assert!(!world.halted);
        assert_eq!(world.risk_state, RiskState::Normal);
        assert_eq!(world.derived_posture(), Posture::Safe);
    }

    #[test]
    fn test_posture_precedence() {
        let mut world = WorldState::default();
        world.armed = true;
        assert_eq!(world.derived_posture(), Posture::Armed);

        world.risk_state = RiskState::Cautious;
        assert_eq!(world.derived_posture(), Posture::Cautious);

        world.risk_state = RiskState::Defensive;
        assert_eq!(world.derived_posture(), Posture::Defensive);

        world.halted = true;
        assert_eq!(world.derived_posture(), Posture::Emergency);
    }

    #[test]
    fn test_risk_state_ordering() {
        assert!(RiskState::Normal < RiskState::Cautious);
        assert!(RiskState::Cautious < RiskState::Defensive);
        assert!(RiskState::Defensive < RiskState::Emergency);
    }

    #[test]
    fn test_allocation_normalization() {
        assert!(Allocation::default().is_normalized());
        let bad = Allocation {
            w1: 0.5,
            w2: 0.5,
            w3: 0.5,
        };
        assert!(!bad.is_normalized());
        let negative = Allocation {
            w1: -0.2,
            w2: 0.6,
            w3: 0.6,
        };
        assert!(!negative.is_normalized());
    }

    #[test]
    fn test_phase_throttle_set() {
        let mut phases = PhaseThrottles::default();
        assert!(phases.set("phase2", 40));
        assert_eq!(phases.phase2, 40);
        assert!(!phases.set("phase9", 10));
    }

    #[test]
    fn test_risk_state_wire_names() {
        let json = serde_json::to_string(&RiskState::Defensive).unwrap();
        assert_eq!(json, "\"DEFENSIVE\"");
    }
}
