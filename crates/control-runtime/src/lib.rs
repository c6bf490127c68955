//! # Control Runtime
//!
//! Process assembly for the Synapse control plane: load configuration,
//! initialize telemetry, construct every subsystem in dependency order,
//! attach the bus consumers, and serve the operator gateway until
//! shutdown.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod consumers;
pub mod wiring;

pub use config::RuntimeConfig;
pub use wiring::Runtime;
