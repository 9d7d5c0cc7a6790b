//! Cryptographic primitives for AgenticDID.
//!
//! This module provides:
//! - Ed25519 key generation, signing, and verification
//! - SHA-256 content hashing, key thumbprints and presentation identifiers
//! - Cryptographically secure nonces and salts

pub mod hash;
pub mod keys;
pub mod random;
pub mod signing;
