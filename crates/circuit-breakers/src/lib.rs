//! # Circuit Breaker Tree
//!
//! Three breaker layers and the risk-state machine they drive:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    RISK-STATE ESCALATION                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Layer           Trip cause (examples)        Effect             │
//! │  Transactional   reject rate, slippage bps    NORMAL → CAUTIOUS  │
//! │  Strategic       drawdown, loss streak        ≤CAUTIOUS → DEFENSIVE │
//! │  Reflex          flash crash, heartbeat loss  → EMERGENCY + halt │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The risk state never downgrades automatically; only an operator resume
//! or breaker reset returns it to `NORMAL`. Layer trip counters use atomic
//! increments; escalation itself runs under the tree's writer lock.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod tree;

pub use tree::{BreakerTree, TripOutcome};
