//! # Shared Types Crate
//!
//! All cross-subsystem domain entities for the Synapse operator control
//! plane live here: intent records, world state, risk/breaker state, ledger
//! records, and the submission error taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary is
//!   defined here, never duplicated per subsystem.
//! - **Wire Stability**: serde representations match the operator API
//!   contract exactly; renames are explicit, never incidental.
//! - **Exclusive Ownership**: types carry no behavior that mutates shared
//!   state. The owning subsystem (intent service, config registry, breaker
//!   tree, state manager) is the only writer.

pub mod entities;
pub mod errors;
pub mod ledger;
pub mod rbac;
pub mod world;

pub use entities::*;
pub use errors::*;
pub use ledger::*;
pub use rbac::*;
pub use world::*;
