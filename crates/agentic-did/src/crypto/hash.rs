//! Content hashing, key thumbprints and presentation identifiers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

/// Prefix of every presentation identifier.
pub const PID_PREFIX: &str = "pid_";

/// SHA-256 of arbitrary content, lowercase hex.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// SHA-256 over length-prefixed parts, lowercase hex.
///
/// Length prefixes keep `("ab", "c")` and `("a", "bc")` distinct.
pub fn hash_parts(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Whether `value` looks like a hex SHA-256 digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Thumbprint of a public key: base64url(SHA-256(raw key bytes)).
pub fn key_thumbprint(key: &VerifyingKey) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(key.as_bytes()))
}

/// Presentation identifier for a key.
///
/// Format: `pid_` + base58 of first 16 bytes of SHA-256(public_key).
pub fn pid_for_key(key: &VerifyingKey) -> String {
    let hash = Sha256::digest(key.as_bytes());
    let encoded = bs58::encode(&hash[..16]).into_string();
    format!("{PID_PREFIX}{encoded}")
}
