//! VP verification pipeline.
//!
//! Steps run in a fixed order and stop at the first failure:
//!
//! 1. structure
//! 2. nonce redemption (single use)
//! 3. proof of possession
//! 4. credential state from the oracle (bounded by a timeout)
//! 5. policy cross-check
//! 6. selective-disclosure proof
//!
//! Revocation is therefore reported even when the disclosure proof is also
//! bad, and no oracle round trip happens for a replayed nonce.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::challenge::{short_nonce, Challenge, ChallengeIssuer};
use crate::credential::{DisclosureContext, DisclosureVerifier, Role};
use crate::crypto::{hash, signing};
use crate::error::{Result, TrustError};
use crate::oracle::{CredentialStateOracle, CredentialStatus};
use crate::policy::{self, Policy};
use crate::presentation::{possession_message, VerifiablePresentation};

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPresentation {
    pub pid: String,
    pub role: Role,
    /// Disclosed scopes that the policy covers.
    pub scopes: BTreeSet<String>,
    /// Thumbprint of the holder key, for the token's `cnf.jkt`.
    pub key_thumbprint: String,
    /// Audience of the redeemed challenge.
    pub audience: String,
}

/// Verifies presentations against outstanding challenges.
pub struct VpVerifier {
    challenges: Arc<ChallengeIssuer>,
    oracle: Arc<dyn CredentialStateOracle>,
    disclosure: Arc<dyn DisclosureVerifier>,
    oracle_timeout: Duration,
}

impl VpVerifier {
    pub fn new(
        challenges: Arc<ChallengeIssuer>,
        oracle: Arc<dyn CredentialStateOracle>,
        disclosure: Arc<dyn DisclosureVerifier>,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            challenges,
            oracle,
            disclosure,
            oracle_timeout,
        }
    }

    /// Verify `vp` as the answer to the challenge identified by `nonce`.
    pub async fn verify(
        &self,
        vp: &VerifiablePresentation,
        nonce: &str,
    ) -> Result<VerifiedPresentation> {
        let holder_key = vp.check_structure()?;
        log::debug!("[{}] structure ok", vp.pid);

        let challenge = self.challenges.redeem(nonce).map_err(|e| {
            log::warn!("[{}] challenge {}.. rejected", vp.pid, short_nonce(nonce));
            e
        })?;
        log::debug!("[{}] challenge redeemed for {}", vp.pid, challenge.audience);

        self.check_possession(vp, &holder_key, &challenge)?;
        log::debug!("[{}] possession proven", vp.pid);

        let policy = self.credential_policy(vp).await?;
        log::debug!("[{}] credential valid, policy role {}", vp.pid, policy.role);

        let scopes = policy::cross_check(&vp.disclosed, &policy).map_err(|e| {
            log::warn!("[{}] {e}", vp.pid);
            e
        })?;

        let proof = vp.disclosure_proof.as_ref().ok_or_else(|| {
            TrustError::DisclosureProofInvalid("presentation carries no disclosure proof".into())
        })?;
        let ctx = DisclosureContext {
            cred_hash: &vp.receipt.cred_hash,
            holder_key: &holder_key,
            disclosed: &vp.disclosed,
            challenge: &challenge,
        };
        self.disclosure.verify(proof, &ctx).map_err(|e| {
            log::warn!("[{}] {e}", vp.pid);
            e
        })?;
        log::debug!("[{}] disclosure proof ok", vp.pid);

        Ok(VerifiedPresentation {
            pid: vp.pid.clone(),
            role: policy.role,
            scopes,
            key_thumbprint: hash::key_thumbprint(&holder_key),
            audience: challenge.audience,
        })
    }

    fn check_possession(
        &self,
        vp: &VerifiablePresentation,
        holder_key: &ed25519_dalek::VerifyingKey,
        challenge: &Challenge,
    ) -> Result<()> {
        if hash::pid_for_key(holder_key) != vp.pid {
            return Err(TrustError::PossessionProofInvalid(
                "pid is not derived from the presented holder key".into(),
            ));
        }
        let message = possession_message(&challenge.nonce, &challenge.audience, challenge.expires_at);
        let signature = signing::signature_from_base64(&vp.possession_proof)
            .map_err(|e| TrustError::PossessionProofInvalid(e.to_string()))?;
        if !signing::verify(holder_key, &message, &signature) {
            log::warn!("[{}] possession signature does not verify", vp.pid);
            return Err(TrustError::PossessionProofInvalid(
                "signature does not match the challenge".into(),
            ));
        }
        Ok(())
    }

    async fn credential_policy(&self, vp: &VerifiablePresentation) -> Result<Policy> {
        let cred_hash = &vp.receipt.cred_hash;
        let lookup = self.oracle.lookup(cred_hash, &vp.receipt.attestation);

        let response = match tokio::time::timeout(self.oracle_timeout, lookup).await {
            Err(_) => {
                log::warn!("[{}] oracle timed out after {:?}", vp.pid, self.oracle_timeout);
                return Err(TrustError::OracleUnavailable(format!(
                    "no answer within {:?}",
                    self.oracle_timeout
                )));
            }
            Ok(Err(e)) => {
                log::warn!("[{}] {e}", vp.pid);
                return Err(TrustError::OracleUnavailable(e.to_string()));
            }
            Ok(Ok(response)) => response,
        };

        let short_hash = cred_hash.get(..8).unwrap_or(cred_hash);
        match (response.status, response.policy) {
            (CredentialStatus::Revoked, _) => {
                log::warn!("[{}] credential {short_hash}.. is revoked", vp.pid);
                Err(TrustError::CredentialRevoked(format!("credential {short_hash}..")))
            }
            (CredentialStatus::Expired, _) => Err(TrustError::CredentialExpired(format!(
                "credential {short_hash}.."
            ))),
            (CredentialStatus::Unknown, _) => Err(TrustError::CredentialStateUnknown(format!(
                "oracle has no record of {short_hash}.."
            ))),
            (CredentialStatus::Valid, None) => Err(TrustError::CredentialStateUnknown(format!(
                "oracle reported {short_hash}.. valid without a policy"
            ))),
            (CredentialStatus::Valid, Some(policy)) => Ok(policy),
        }
    }
}
