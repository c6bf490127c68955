//! # Synapse Test Suite
//!
//! Cross-subsystem integration scenarios for the operator control plane.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Shared fixture: a fully wired ephemeral runtime
//! └── integration/      # Cross-subsystem scenarios
//!     ├── operator_flows.rs     # Intent pipeline end to end
//!     ├── safety_model.rs       # Breakers, config safety, audit silence
//!     └── replay_determinism.rs # Historical reconstruction laws
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p synapse-tests
//! cargo test -p synapse-tests integration::operator_flows
//! ```

pub mod harness;
pub mod integration;
