//! Config registry error types.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Schema violation for {key}: {detail}")]
    SchemaViolation { key: String, detail: String },

    #[error("Key {0} is immutable")]
    Immutable(String),

    /// Message text is part of the operator contract ("Tighten-only").
    #[error("Tighten-only violation for {key}: {detail}")]
    TightenOnly { key: String, detail: String },

    #[error("Raise-only violation for {key}: {detail}")]
    RaiseOnly { key: String, detail: String },

    #[error("No active override for {0}")]
    NoActiveOverride(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Receipt chain error: {0}")]
    ReceiptChain(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}
