//! Cross-subsystem integration scenarios.

pub mod operator_flows;
pub mod replay_determinism;
pub mod safety_model;
