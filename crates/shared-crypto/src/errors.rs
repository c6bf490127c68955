//! Crypto error types.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The value could not be serialized for canonicalization.
    #[error("Canonicalization failed: {0}")]
    Canonicalize(String),

    /// A signature string was not valid lowercase hex of the right length.
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),
}
