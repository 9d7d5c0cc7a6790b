//! Capability tokens: short-lived, scope-limited, key-bound grants minted
//! after a presentation verifies.
//!
//! The capability module provides:
//! - The [`CapabilityIssuer`] that signs tokens
//! - Compact token encoding and verification for resource servers
//! - Scope, role and key-binding checks on redeemed tokens

pub mod issuer;
pub mod token;

pub use issuer::CapabilityIssuer;
pub use token::{
    verify_token, ActionRequirement, CapabilityClaims, CapabilityToken, Confirmation,
    TOKEN_ALGORITHM, TOKEN_TYPE,
};
