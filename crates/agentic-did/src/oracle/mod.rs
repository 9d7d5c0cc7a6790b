//! Credential-state oracle: the external system of record for validity,
//! expiry, revocation and policy.
//!
//! The verifier only depends on [`CredentialStateOracle`]. Transport failures
//! and timeouts are [`OracleError`]s and must never be read as a credential
//! state: the verifier maps them to `OracleUnavailable`.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::policy::Policy;

pub use memory::{InMemoryOracle, RevocationReason};

/// State of a credential as reported by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Valid,
    Expired,
    Revoked,
    /// The oracle has no record of this credential.
    Unknown,
}

impl CredentialStatus {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Unknown => "unknown",
        }
    }
}

/// Answer to a credential-state lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponse {
    pub status: CredentialStatus,
    /// Authoritative role and scopes; expected whenever `status` is valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
    /// When the oracle evaluated the state (microseconds since epoch).
    pub checked_at: u64,
}

impl OracleResponse {
    /// A response carrying only a status.
    pub fn status_only(status: CredentialStatus, checked_at: u64) -> Self {
        Self {
            status,
            policy: None,
            checked_at,
        }
    }

    /// A valid response with its policy.
    pub fn valid(policy: Policy, checked_at: u64) -> Self {
        Self {
            status: CredentialStatus::Valid,
            policy: Some(policy),
            checked_at,
        }
    }
}

/// Infrastructure failure talking to the oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle transport failure: {0}")]
    Transport(String),

    #[error("oracle did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Lookup interface of the credential-state oracle.
///
/// Implementations must tolerate arbitrary (malformed) input without
/// panicking; the caller bounds each call with a timeout.
#[async_trait]
pub trait CredentialStateOracle: Send + Sync {
    /// Report the state of the credential identified by `cred_hash`.
    async fn lookup(
        &self,
        cred_hash: &str,
        attestation: &str,
    ) -> std::result::Result<OracleResponse, OracleError>;
}
