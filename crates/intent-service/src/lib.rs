//! # Intent Service
//!
//! The operator intent pipeline. Every submission walks the same gauntlet:
//!
//! ```text
//!  schema ─► signature ─► rbac ─► idempotency ─► state-hash ─► preview
//!     │                                                           │
//!     ▼                                                           ▼
//!  ACCEPT (persist, audit on resolve, SSE) ─► EXECUTE ─► VERIFY ─► RESOLVE
//! ```
//!
//! The in-memory record map is the authoritative state machine; the store
//! is write-through durability and the SSE hub is the observable stream.
//! Executors for distinct intents run in parallel; per intent id execution
//! is single-flight, and the status DAG arbitrates every race (TTL expiry,
//! cancel, executor completion): the first terminal writer wins.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod events;
pub mod exec;
pub mod registry;
pub mod service;
pub mod validate;

pub use config::IntentServiceConfig;
pub use events::{CatchupResult, EventHub, IntentEvent, IntentEventKind};
pub use exec::{ExecutorError, IntentExecutor, IntentVerifier, VerifyOutcome};
pub use registry::{IntentRegistry, IntentSpec, ParamSchema};
pub use service::{IntentService, ListResult, SubmitResponse};
