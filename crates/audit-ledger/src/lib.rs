//! # Audit Ledger
//!
//! Two append-only journals sharing one monotonic sequence:
//!
//! - **Audit log**: a signed receipt for every state-changing action
//!   (intent executions, config overrides, breaker trips, resumes).
//!   Rejected actions are never audited. Every append is mirrored to the
//!   bus on `evt.audit.operator.v1`.
//! - **Fill journal**: every fill report from the execution pipeline.
//!
//! Sharing the sequence gives historical replay a total order over both
//! streams: replaying `(audit ∪ fills)` sorted by `seq` reconstructs the
//! world deterministically.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod audit;
pub mod fills;
mod journal;
pub mod seq;

pub use audit::AuditLog;
pub use fills::FillJournal;
pub use seq::LedgerSeq;
