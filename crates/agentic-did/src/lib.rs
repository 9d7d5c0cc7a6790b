//! AgenticDID — trust core for AI agents.
//!
//! An agent proves, without revealing more than it must, that it holds a
//! valid credential for a role and a set of scopes. In return it receives a
//! short-lived capability token bound to its key:
//!
//! 1. the verifier issues a single-use [`Challenge`] bound to an audience;
//! 2. the agent answers with a [`VerifiablePresentation`];
//! 3. the verifier checks possession, asks the credential-state oracle for
//!    revocation, expiry and policy, cross-checks the disclosed claims and
//!    verifies the selective-disclosure proof;
//! 4. on success a [`CapabilityToken`] is minted for exactly the granted
//!    scopes.

pub mod capability;
pub mod challenge;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod oracle;
pub mod policy;
pub mod presentation;
pub mod service;
pub mod time;
pub mod verifier;

// Re-export primary types
pub use error::{Denial, ErrorKind, Result, TrustError};
pub use service::{Grant, ServiceBuilder, VerifierService};
pub use config::VerifierConfig;
pub use time::{Clock, ManualClock, SystemClock};

pub use challenge::{Challenge, ChallengeIssuer};
pub use credential::{
    AgentCredential, DisclosedClaims, DisclosureProof, DisclosureVerifier, Role,
    SaltedDigestVerifier,
};
pub use presentation::{CredentialStateReceipt, PresentationBuilder, VerifiablePresentation};
pub use verifier::{VerifiedPresentation, VpVerifier};

pub use oracle::{
    CredentialStateOracle, CredentialStatus, InMemoryOracle, OracleError, OracleResponse,
    RevocationReason,
};
pub use policy::{Policy, ScopeRule};

pub use capability::{
    verify_token, ActionRequirement, CapabilityClaims, CapabilityIssuer, CapabilityToken,
};
