//! # State Projection
//!
//! The unified read model: world state, breaker layers and risk state,
//! recent intents, and effective config top-of-provenance, joined into one
//! view behind a short TTL cache. Strictly read-only: writers notify the
//! projection through the state manager's watch channel; the projection
//! never calls back into a writer.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod projection;

pub use projection::{
    BreakerView, Incident, IntentSummary, OperatorStateView, StateProjection, DEFAULT_CACHE_TTL,
};
