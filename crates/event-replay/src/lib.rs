//! # Event Replay
//!
//! Deterministic historical reconstruction: pick the nearest snapshot at
//! or before the requested timestamp, then replay the audit and fill
//! streams, which share one ledger sequence, in seq order up to the
//! timestamp. The same input timestamp always yields a byte-identical
//! view.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod engine;

pub use engine::{ReplayEngine, ReplayError, Snapshot, WorldStateView};
