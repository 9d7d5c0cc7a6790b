//! Secure random number generation.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::RngCore;

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    fill_random(&mut buf);
    buf
}

/// Generate a 256-bit challenge nonce, hex-encoded.
pub fn random_nonce_hex() -> String {
    hex::encode(random_bytes::<32>())
}

/// Generate a 128-bit disclosure salt, hex-encoded.
pub fn random_salt_hex() -> String {
    hex::encode(random_bytes::<16>())
}

/// Generate a 128-bit token identifier, hex-encoded.
pub fn random_token_id() -> String {
    hex::encode(random_bytes::<16>())
}
