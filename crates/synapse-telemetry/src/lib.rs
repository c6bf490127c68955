//! # Synapse Telemetry
//!
//! One-shot structured logging initialization for every Synapse process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use synapse_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_telemetry(&config).expect("telemetry init");
//!     // tracing macros now emit structured logs
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SYNAPSE_LOG_LEVEL` | `info` | Log level filter (overridden by `RUST_LOG`) |
//! | `SYNAPSE_LOG_JSON` | `false` | Emit JSON lines instead of human-readable logs |
//! | `SYNAPSE_SERVICE_NAME` | `synapse-control` | Service name attached to logs |

mod config;
mod setup;

pub use config::TelemetryConfig;
pub use setup::{init_telemetry, TelemetryError};
