//! # Config Registry
//!
//! Catalog of every operator-tunable with schema, safety class, and
//! provenance-layered resolution:
//!
//! ```text
//!   default ──► file ──► env ──► override     (last wins)
//! ```
//!
//! The catalog is static at load; overrides and receipts are the mutable
//! surface. Every override/rollback appends an HMAC-signed receipt to an
//! append-only chain; on reload the whole chain must verify and is
//! replayed to reconstruct the active override set. Effective resolution
//! is wait-free: readers clone an `Arc` of the current override map.
//!
//! ## Safety Classes
//!
//! - `immutable`: never overridable.
//! - `tighten_only`: overrides may only move toward safety. Keys tagged
//!   `lower_is_riskier` must rise; all others must fall.
//! - `raise_only`: overrides may only rise.
//! - `tunable`: any schema-valid value.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod catalog;
pub mod errors;
mod receipts;
pub mod registry;

pub use catalog::{
    default_catalog, default_presets, ApplyMode, Catalog, ConfigItem, Preset, SafetyClass,
    ValueSchema, ValueType,
};
pub use errors::ConfigError;
pub use registry::{
    ConfigRegistry, EffectiveValue, PresetKeyOutcome, PresetOutcome, ProvenanceEntry,
    ProvenanceLayer,
};
