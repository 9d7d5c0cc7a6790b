//! Ed25519 signing and verification.
//!
//! Signatures travel as standard base64 of the 64 raw bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::error::{Result, TrustError};

/// Sign a message with an Ed25519 signing key.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(message)
}

/// Sign, surfacing any backend failure instead of panicking.
pub fn try_sign(signing_key: &SigningKey, message: &[u8]) -> Result<Signature> {
    signing_key
        .try_sign(message)
        .map_err(|e| TrustError::IssuanceFailed(format!("signing failed: {e}")))
}

/// Verify an Ed25519 signature against a public key and message.
///
/// Uses strict verification so malleable encodings are rejected.
pub fn verify(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> bool {
    verifying_key.verify_strict(message, signature).is_ok()
}

/// Sign a message and return the signature as a base64-encoded string.
pub fn sign_to_base64(signing_key: &SigningKey, message: &[u8]) -> String {
    STANDARD.encode(sign(signing_key, message).to_bytes())
}

/// Decode a base64 signature into its 64-byte form.
pub fn signature_from_base64(signature_b64: &str) -> Result<Signature> {
    let sig_bytes = STANDARD
        .decode(signature_b64)
        .map_err(|e| TrustError::InvalidKey(format!("invalid base64 signature: {e}")))?;

    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| TrustError::InvalidKey("signature must be 64 bytes".into()))?;

    Ok(Signature::from_bytes(&sig_array))
}

/// Verify a base64-encoded signature.
pub fn verify_from_base64(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature_b64: &str,
) -> bool {
    match signature_from_base64(signature_b64) {
        Ok(signature) => verify(verifying_key, message, &signature),
        Err(_) => false,
    }
}
