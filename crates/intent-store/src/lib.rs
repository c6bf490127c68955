//! # Intent Store
//!
//! Write-through durable repository for intent records. The intent service
//! owns the in-memory state machine; this crate owns durability. Store
//! failures are logged by the caller and never block intent processing;
//! on restart the service hydrates from `find_recent` and discards any
//! stored record already superseded in memory.
//!
//! ## Invariants
//!
//! - `id` and `idempotency_key` are unique for all time (insert rejects
//!   collisions).
//! - Status transitions follow the lifecycle DAG; `update_status` accepts
//!   only non-terminal targets and `resolve` is the single-shot path to a
//!   terminal status with its receipt.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod ports;

pub use adapters::jsonl::JsonlIntentStore;
pub use adapters::memory::InMemoryIntentStore;
pub use ports::{IntentFilter, IntentRepository};
