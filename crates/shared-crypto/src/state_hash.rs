//! # State Fingerprint
//!
//! The optimistic-concurrency token: a 64-bit truncation of the SHA-256
//! of the canonical world-state serialization, hex-encoded to 16 chars.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_json;
use crate::CryptoError;

/// Length of the hex-encoded state hash.
pub const STATE_HASH_LEN: usize = 16;

/// Fingerprint any serializable state value.
///
/// # Errors
///
/// Returns `CryptoError::Canonicalize` if the value cannot be canonicalized.
pub fn state_hash<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let canon = canonical_json(value)?;
    let digest = Sha256::digest(canon.as_bytes());
    Ok(hex::encode(&digest[..STATE_HASH_LEN / 2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_16_hex_chars() {
        let hash = state_hash(&json!({"armed": true})).unwrap();
        assert_eq!(hash.len(), STATE_HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_deterministic() {
        let value = json!({"a": 1, "b": [1, 2]});
        assert_eq!(state_hash(&value).unwrap(), state_hash(&value).unwrap());
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        assert_eq!(
            state_hash(&json!({"a": 1, "b": 2})).unwrap(),
            state_hash(&json!({"b": 2, "a": 1})).unwrap()
        );
    }

    #[test]
    fn test_distinct_states_diverge() {
        assert_ne!(
            state_hash(&json!({"armed": true})).unwrap(),
            state_hash(&json!({"armed": false})).unwrap()
        );
    }
}
