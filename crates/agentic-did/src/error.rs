//! Error types for AgenticDID.
//!
//! Every failure on the presentation path is terminal for that request and
//! maps to exactly one [`ErrorKind`]. Key material and full nonces are never
//! included in error messages.

use serde::{Deserialize, Serialize};

/// Trust protocol error types.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("Malformed verifiable presentation: {0}")]
    MalformedVP(String),

    #[error("Challenge invalid or already used: {0}")]
    ChallengeInvalidOrReused(String),

    #[error("Possession proof invalid: {0}")]
    PossessionProofInvalid(String),

    #[error("Credential revoked: {0}")]
    CredentialRevoked(String),

    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    #[error("Credential state unknown: {0}")]
    CredentialStateUnknown(String),

    #[error("Credential-state oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Policy mismatch: {0}")]
    PolicyMismatch(String),

    #[error("Disclosure proof invalid: {0}")]
    DisclosureProofInvalid(String),

    #[error("Capability issuance failed: {0}")]
    IssuanceFailed(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capability token invalid: {0}")]
    TokenInvalid(String),

    #[error("Capability token expired")]
    TokenExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Stable, serialisable category of a [`TrustError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedVp,
    ChallengeInvalidOrReused,
    PossessionProofInvalid,
    CredentialRevoked,
    CredentialExpired,
    CredentialStateUnknown,
    OracleUnavailable,
    PolicyMismatch,
    DisclosureProofInvalid,
    IssuanceFailed,
    ResourceExhausted,
    InvalidKey,
    InvalidRequest,
    InvalidConfig,
    TokenInvalid,
    TokenExpired,
    Forbidden,
    Serialization,
}

impl ErrorKind {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedVp => "malformed_vp",
            Self::ChallengeInvalidOrReused => "challenge_invalid_or_reused",
            Self::PossessionProofInvalid => "possession_proof_invalid",
            Self::CredentialRevoked => "credential_revoked",
            Self::CredentialExpired => "credential_expired",
            Self::CredentialStateUnknown => "credential_state_unknown",
            Self::OracleUnavailable => "oracle_unavailable",
            Self::PolicyMismatch => "policy_mismatch",
            Self::DisclosureProofInvalid => "disclosure_proof_invalid",
            Self::IssuanceFailed => "issuance_failed",
            Self::ResourceExhausted => "resource_exhausted",
            Self::InvalidKey => "invalid_key",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidConfig => "invalid_config",
            Self::TokenInvalid => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::Forbidden => "forbidden",
            Self::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl TrustError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedVP(_) => ErrorKind::MalformedVp,
            Self::ChallengeInvalidOrReused(_) => ErrorKind::ChallengeInvalidOrReused,
            Self::PossessionProofInvalid(_) => ErrorKind::PossessionProofInvalid,
            Self::CredentialRevoked(_) => ErrorKind::CredentialRevoked,
            Self::CredentialExpired(_) => ErrorKind::CredentialExpired,
            Self::CredentialStateUnknown(_) => ErrorKind::CredentialStateUnknown,
            Self::OracleUnavailable(_) => ErrorKind::OracleUnavailable,
            Self::PolicyMismatch(_) => ErrorKind::PolicyMismatch,
            Self::DisclosureProofInvalid(_) => ErrorKind::DisclosureProofInvalid,
            Self::IssuanceFailed(_) => ErrorKind::IssuanceFailed,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::TokenInvalid(_) => ErrorKind::TokenInvalid,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// True for failures of infrastructure rather than of the presentation.
    ///
    /// Callers may retry the whole flow with a fresh challenge on these, never
    /// with the same nonce.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable(_) | Self::IssuanceFailed(_)
        )
    }
}

/// Structured outcome handed to transports when a request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub kind: ErrorKind,
    pub detail: String,
    /// Whether the caller may start over with a new challenge.
    pub retryable: bool,
}

impl From<&TrustError> for Denial {
    fn from(err: &TrustError) -> Self {
        Self {
            kind: err.kind(),
            detail: err.to_string(),
            retryable: err.is_infrastructure(),
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, TrustError>;
