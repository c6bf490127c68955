//! # State Manager
//!
//! The canonical world state lives here and nowhere else. The intent
//! service and the breaker tree are the only callers of the transactional
//! setters; everyone else consumes read-only snapshots or the change
//! notification channel.
//!
//! Every mutation recomputes the 16-hex-char state fingerprint over the
//! canonical serialization of the world, re-derives the posture, and
//! bumps the watch channel consumed by the read-model projection.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod manager;

pub use manager::{apply_fill_to, StateManager, StateVersion};
