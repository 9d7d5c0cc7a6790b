//! Verifiable presentations: what an agent submits in answer to a challenge.
//!
//! A presentation carries:
//! - a proof of possession: the holder's signature over
//!   `(nonce ‖ audience ‖ expiry)` of the challenge being answered;
//! - a selective-disclosure proof that the disclosed role and scopes are part
//!   of the committed credential;
//! - the oracle receipt naming the credential (`cred_hash`).

use std::collections::BTreeSet;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;
use crate::credential::disclosure::prove_disclosure;
use crate::credential::model::is_well_formed_scope;
use crate::credential::{AgentCredential, DisclosedClaims, DisclosureProof};
use crate::crypto::hash::{self, PID_PREFIX};
use crate::crypto::{keys, signing};
use crate::error::{Result, TrustError};

/// Receipt from the credential-state oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStateReceipt {
    /// Opaque, oracle-signed blob.
    pub attestation: String,
    /// Commitment identifying the credential (hex SHA-256).
    pub cred_hash: String,
}

/// A verifiable presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiablePresentation {
    /// Privacy-preserving subject identifier, derived from `holder_key`.
    pub pid: String,
    /// Holder public key (base64).
    pub holder_key: String,
    /// Holder signature over the challenge (base64).
    pub possession_proof: String,
    /// Selective-disclosure proof; absence fails at the disclosure step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure_proof: Option<DisclosureProof>,
    pub disclosed: DisclosedClaims,
    pub receipt: CredentialStateReceipt,
}

/// Canonical message signed by the possession proof.
pub fn possession_message(nonce: &str, audience: &str, expires_at: u64) -> Vec<u8> {
    format!("agentic-did/possession:{nonce}|{audience}|{expires_at}").into_bytes()
}

fn malformed(detail: impl Into<String>) -> TrustError {
    TrustError::MalformedVP(detail.into())
}

impl VerifiablePresentation {
    /// Parse a presentation from JSON; any parse failure is `MalformedVP`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| malformed(e.to_string()))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TrustError::Serialization(e.to_string()))
    }

    /// Check that every required field is present and well formed.
    ///
    /// Returns the decoded holder key. No cryptographic check happens here.
    pub fn check_structure(&self) -> Result<VerifyingKey> {
        let pid_body = self
            .pid
            .strip_prefix(PID_PREFIX)
            .ok_or_else(|| malformed("pid must start with pid_"))?;
        if pid_body.is_empty() || bs58::decode(pid_body).into_vec().is_err() {
            return Err(malformed("pid is not valid base58"));
        }

        let holder_key = keys::verifying_key_from_base64(&self.holder_key)
            .map_err(|e| malformed(format!("holder_key: {e}")))?;

        signing::signature_from_base64(&self.possession_proof)
            .map_err(|e| malformed(format!("possession_proof: {e}")))?;

        if !hash::is_sha256_hex(&self.receipt.cred_hash) {
            return Err(malformed("cred_hash must be 64 hex characters"));
        }
        if self.receipt.attestation.trim().is_empty() {
            return Err(malformed("attestation is empty"));
        }

        if self.disclosed.role.as_str().trim().is_empty() {
            return Err(malformed("disclosed role is empty"));
        }
        if self.disclosed.scopes.is_empty() {
            return Err(malformed("no scopes disclosed"));
        }
        if let Some(bad) = self
            .disclosed
            .scopes
            .iter()
            .find(|s| !is_well_formed_scope(s))
        {
            return Err(malformed(format!("malformed scope {bad:?}")));
        }

        Ok(holder_key)
    }
}

/// Holder-side builder for a presentation answering one challenge.
pub struct PresentationBuilder<'a> {
    credential: &'a AgentCredential,
    challenge: &'a Challenge,
    receipt: CredentialStateReceipt,
    scopes: Option<BTreeSet<String>>,
    with_disclosure_proof: bool,
}

impl<'a> PresentationBuilder<'a> {
    /// Start a presentation of `credential` for `challenge`.
    pub fn new(
        credential: &'a AgentCredential,
        challenge: &'a Challenge,
        receipt: CredentialStateReceipt,
    ) -> Self {
        Self {
            credential,
            challenge,
            receipt,
            scopes: None,
            with_disclosure_proof: true,
        }
    }

    /// Disclose only these scopes (default: all held scopes).
    pub fn disclose_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Leave out the disclosure proof.
    pub fn without_disclosure_proof(mut self) -> Self {
        self.with_disclosure_proof = false;
        self
    }

    /// Sign the challenge and assemble the presentation.
    pub fn build(self) -> Result<VerifiablePresentation> {
        let scopes = self
            .scopes
            .unwrap_or_else(|| self.credential.scopes.clone());
        if scopes.is_empty() {
            return Err(TrustError::InvalidRequest(
                "at least one scope must be disclosed".into(),
            ));
        }

        let disclosure_proof = if self.with_disclosure_proof {
            Some(prove_disclosure(self.credential, &scopes, self.challenge)?)
        } else {
            None
        };

        let message = possession_message(
            &self.challenge.nonce,
            &self.challenge.audience,
            self.challenge.expires_at,
        );
        let possession_proof = signing::sign_to_base64(self.credential.signing_key(), &message);

        Ok(VerifiablePresentation {
            pid: self.credential.pid.clone(),
            holder_key: self.credential.holder_key_base64(),
            possession_proof,
            disclosure_proof,
            disclosed: DisclosedClaims {
                role: self.credential.role.clone(),
                scopes,
            },
            receipt: self.receipt,
        })
    }
}
