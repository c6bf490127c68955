//! # Shared Crypto Crate
//!
//! The three primitives every authenticated artifact in the control plane
//! is built from:
//!
//! - **Canonical JSON**: lexicographically sorted keys, compact separators,
//!   no whitespace. Signature inputs and state fingerprints are always
//!   computed over canonical bytes, never over incidental serializations.
//! - **HMAC-SHA256 signatures**: operator intents, audit receipts, and
//!   config receipts all carry a 64-hex-char MAC under a shared secret.
//!   Verification is constant-time.
//! - **State hash**: the 64-bit truncated SHA-256 of the canonical world
//!   state, used as the optimistic-concurrency token.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod canonical;
pub mod errors;
pub mod signing;
pub mod state_hash;

pub use canonical::canonical_json;
pub use errors::CryptoError;
pub use signing::{intent_signature, sign_value, verify_intent_signature, verify_value, OpsSecret};
pub use state_hash::{state_hash, STATE_HASH_LEN};
