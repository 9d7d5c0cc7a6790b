//! Credential model: the credential an agent holds privately, the claims it
//! may disclose, and the selective-disclosure proof capability.

pub mod disclosure;
pub mod model;
pub mod role;

pub use disclosure::{
    prove_disclosure, ClaimDisclosure, DisclosureContext, DisclosureProof, DisclosureVerifier,
    SaltedDigestVerifier, SaltedDisclosure, SALTED_SHA256_FORMAT,
};
pub use model::{AgentCredential, DisclosedClaims};
pub use role::Role;
