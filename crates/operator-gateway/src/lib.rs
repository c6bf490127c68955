//! # Operator Gateway
//!
//! The HTTP surface of the control plane:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/operator/intents` | submit (or `?preview=true`) an intent |
//! | GET | `/operator/intents` | list with `limit`/`type`/`status` |
//! | GET | `/operator/intents/stream` | SSE with `Last-Event-ID` catch-up |
//! | GET | `/operator/state` | unified read model |
//! | GET | `/operator/history/state` | deterministic state at `?timestamp=` |
//! | POST | `/operator/config/override` | create a signed override |
//! | POST | `/operator/config/rollback` | restore prior provenance layer |
//! | POST | `/operator/config/preset` | apply a named batch |
//! | GET | `/health` | liveness |
//!
//! Error codes map one-to-one onto HTTP statuses: 400 validation, 403
//! signature/permissions, 409 state conflict, 422 blocked, 503 saturated.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod errors;
pub mod routes;
pub mod service;

pub use config::GatewayConfig;
pub use service::{build_router, AppState, OperatorGateway};
