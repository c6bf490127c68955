//! # HMAC-SHA256 Signatures
//!
//! Operator intents and ledger receipts are authenticated with a shared
//! operator secret. Verification goes through the `hmac` verify API so the
//! comparison is constant-time.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::canonical::canonical_json;
use crate::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// The operator shared secret. Wraps the raw bytes so call sites never
/// pass the secret as a bare slice.
#[derive(Clone)]
pub struct OpsSecret(Vec<u8>);

impl OpsSecret {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.0).expect("HMAC key of any length")
    }
}

impl std::fmt::Debug for OpsSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OpsSecret(..)")
    }
}

/// Signature input for an intent: `id | "." | type | "." | canonical(params)
/// | "." | operator_id`, UTF-8.
fn intent_signing_input(
    id: &str,
    kind: &str,
    params: &serde_json::Value,
    operator_id: &str,
) -> Result<String, CryptoError> {
    let canon = canonical_json(params)?;
    Ok(format!("{id}.{kind}.{canon}.{operator_id}"))
}

/// Compute the 64-hex-char intent signature.
///
/// # Errors
///
/// Returns `CryptoError::Canonicalize` if `params` cannot be canonicalized.
pub fn intent_signature(
    secret: &OpsSecret,
    id: &str,
    kind: &str,
    params: &serde_json::Value,
    operator_id: &str,
) -> Result<String, CryptoError> {
    let input = intent_signing_input(id, kind, params, operator_id)?;
    let mut mac = secret.mac();
    mac.update(input.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify an intent signature in constant time.
///
/// Malformed hex or wrong-length signatures verify as `false`; the caller
/// does not need to distinguish those from a MAC mismatch.
#[must_use]
pub fn verify_intent_signature(
    secret: &OpsSecret,
    id: &str,
    kind: &str,
    params: &serde_json::Value,
    operator_id: &str,
    signature_hex: &str,
) -> bool {
    let Ok(input) = intent_signing_input(id, kind, params, operator_id) else {
        return false;
    };
    let Ok(sig) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = secret.mac();
    mac.update(input.as_bytes());
    mac.verify_slice(&sig).is_ok()
}

/// Sign an arbitrary serializable value over its canonical JSON bytes.
///
/// Used for audit records and config receipts, where the signature covers
/// every field except the signature itself.
///
/// # Errors
///
/// Returns `CryptoError::Canonicalize` if the value cannot be canonicalized.
pub fn sign_value<T: Serialize>(secret: &OpsSecret, value: &T) -> Result<String, CryptoError> {
    let canon = canonical_json(value)?;
    let mut mac = secret.mac();
    mac.update(canon.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a canonical-value signature in constant time.
#[must_use]
pub fn verify_value<T: Serialize>(secret: &OpsSecret, value: &T, signature_hex: &str) -> bool {
    let Ok(canon) = canonical_json(value) else {
        return false;
    };
    let Ok(sig) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = secret.mac();
    mac.update(canon.as_bytes());
    mac.verify_slice(&sig).is_ok()
}
