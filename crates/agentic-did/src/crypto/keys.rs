//! Ed25519 key pair generation and encoding.
//!
//! Ed25519 keys sign possession proofs, oracle attestations and capability
//! tokens. Public keys travel as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::error::{Result, TrustError};

/// An Ed25519 key pair for signing operations.
///
/// The signing key is zeroized on drop to prevent private key leakage.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a key pair from raw signing key bytes.
    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Return a reference to the signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Return the verifying (public) key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Return the signing key bytes. Caller must zeroize after use.
    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Return the verifying key bytes.
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Return the public key as base64.
    pub fn public_key_base64(&self) -> String {
        encode_verifying_key(&self.verifying_key)
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        // SigningKey stores bytes internally; zeroize via conversion
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

/// Reconstruct a verifying key from raw bytes.
pub fn verifying_key_from_bytes(bytes: &[u8; 32]) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(bytes)
        .map_err(|e| TrustError::InvalidKey(format!("invalid verifying key: {e}")))
}

/// Decode a base64 public key.
pub fn verifying_key_from_base64(encoded: &str) -> Result<VerifyingKey> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| TrustError::InvalidKey(format!("invalid base64 public key: {e}")))?;
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| TrustError::InvalidKey("public key must be 32 bytes".into()))?;
    verifying_key_from_bytes(&bytes)
}

/// Encode a public key as base64.
pub fn encode_verifying_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.to_bytes())
}
