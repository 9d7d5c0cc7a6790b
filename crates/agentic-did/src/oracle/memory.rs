//! In-memory credential-state oracle.
//!
//! Stands in for a ledger-backed oracle: it keeps a record per credential
//! hash, signs an attestation for each registered credential, and answers
//! lookups from its own clock. Revocation records follow the same shape as
//! on a real revocation channel.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::credential::AgentCredential;
use crate::crypto::hash;
use crate::crypto::keys::Ed25519KeyPair;
use crate::crypto::signing;
use crate::error::{Result, TrustError};
use crate::policy::Policy;
use crate::presentation::CredentialStateReceipt;
use crate::time::Clock;

use super::{CredentialStateOracle, CredentialStatus, OracleError, OracleResponse};

/// Reason for revocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RevocationReason {
    /// Holder's key or system has been compromised.
    Compromised,
    /// Holder violated the terms of the credential.
    PolicyViolation,
    /// Manual revocation by the issuer.
    ManualRevocation,
    /// Holder requested revocation.
    HolderRequest,
    Custom(String),
}

impl RevocationReason {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Compromised => "compromised",
            Self::PolicyViolation => "policy_violation",
            Self::ManualRevocation => "manual_revocation",
            Self::HolderRequest => "holder_request",
            Self::Custom(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
struct Revocation {
    reason: RevocationReason,
    revoked_at: u64,
}

#[derive(Debug, Clone)]
struct CredentialRecord {
    policy: Policy,
    expires_at: u64,
    revocation: Option<Revocation>,
}

/// Oracle backed by a process-local table.
pub struct InMemoryOracle {
    key_pair: Ed25519KeyPair,
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<String, CredentialRecord>>,
}

fn attestation_message(cred_hash: &str) -> Vec<u8> {
    format!("agentic-did/attestation:{cred_hash}").into_bytes()
}

impl InMemoryOracle {
    /// Create an oracle with a fresh attestation key.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            key_pair: Ed25519KeyPair::generate(),
            clock,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Public key that signs attestations.
    pub fn attestation_key(&self) -> &VerifyingKey {
        self.key_pair.verifying_key()
    }

    /// Register a credential under `policy` and return its state receipt.
    ///
    /// The record expires together with the credential.
    pub fn register(&self, credential: &AgentCredential, policy: Policy) -> Result<CredentialStateReceipt> {
        self.register_hash(&credential.cred_hash, policy, credential.expires_at)
    }

    /// Register a bare credential hash.
    pub fn register_hash(
        &self,
        cred_hash: &str,
        policy: Policy,
        expires_at: u64,
    ) -> Result<CredentialStateReceipt> {
        if !hash::is_sha256_hex(cred_hash) {
            return Err(TrustError::InvalidRequest(
                "cred_hash must be 64 hex characters".into(),
            ));
        }
        let record = CredentialRecord {
            policy,
            expires_at,
            revocation: None,
        };
        self.records
            .write()
            .map_err(|_| TrustError::InvalidRequest("oracle table poisoned".into()))?
            .insert(cred_hash.to_string(), record);

        let attestation =
            signing::sign_to_base64(self.key_pair.signing_key(), &attestation_message(cred_hash));
        log::debug!("registered credential {}..", &cred_hash[..8]);

        Ok(CredentialStateReceipt {
            attestation,
            cred_hash: cred_hash.to_string(),
        })
    }

    /// Mark a registered credential revoked.
    pub fn revoke(&self, cred_hash: &str, reason: RevocationReason) -> Result<()> {
        let now = self.clock.now_micros();
        let mut records = self
            .records
            .write()
            .map_err(|_| TrustError::InvalidRequest("oracle table poisoned".into()))?;
        let record = records.get_mut(cred_hash).ok_or_else(|| {
            TrustError::InvalidRequest("credential is not registered".into())
        })?;
        log::info!(
            "revoking credential {}.. ({})",
            cred_hash.get(..8).unwrap_or(cred_hash),
            reason.as_str()
        );
        record.revocation = Some(Revocation {
            reason,
            revoked_at: now,
        });
        Ok(())
    }

    /// Revocation reason and timestamp, if the credential is revoked.
    pub fn revocation(&self, cred_hash: &str) -> Option<(RevocationReason, u64)> {
        let records = self.records.read().ok()?;
        records
            .get(cred_hash)?
            .revocation
            .as_ref()
            .map(|r| (r.reason.clone(), r.revoked_at))
    }

    fn evaluate(&self, cred_hash: &str, attestation: &str) -> OracleResponse {
        let now = self.clock.now_micros();

        // Unsigned or foreign attestations name no credential we vouch for.
        if !signing::verify_from_base64(
            self.key_pair.verifying_key(),
            &attestation_message(cred_hash),
            attestation,
        ) {
            return OracleResponse::status_only(CredentialStatus::Unknown, now);
        }

        let records = match self.records.read() {
            Ok(records) => records,
            Err(_) => return OracleResponse::status_only(CredentialStatus::Unknown, now),
        };
        match records.get(cred_hash) {
            None => OracleResponse::status_only(CredentialStatus::Unknown, now),
            Some(record) if record.revocation.is_some() => {
                OracleResponse::status_only(CredentialStatus::Revoked, now)
            }
            Some(record) if now > record.expires_at => {
                OracleResponse::status_only(CredentialStatus::Expired, now)
            }
            Some(record) => OracleResponse::valid(record.policy.clone(), now),
        }
    }
}

#[async_trait]
impl CredentialStateOracle for InMemoryOracle {
    async fn lookup(
        &self,
        cred_hash: &str,
        attestation: &str,
    ) -> std::result::Result<OracleResponse, OracleError> {
        Ok(self.evaluate(cred_hash, attestation))
    }
}
