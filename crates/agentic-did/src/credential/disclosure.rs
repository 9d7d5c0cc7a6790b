//! Selective disclosure proofs.
//!
//! The verifier depends only on the [`DisclosureVerifier`] capability; the
//! proof itself travels as an opaque [`DisclosureProof`] envelope tagged with
//! its format. The bundled [`SaltedDigestVerifier`] implements the
//! `salted-sha256` format:
//!
//! - every claim (the role and each scope) is committed as
//!   `SHA-256(salt, name, value)`;
//! - `cred_hash` commits to the holder key and the sorted claim digests;
//! - a presentation reveals `(salt, name, value)` for disclosed claims and only
//!   the digests of withheld ones;
//! - a key-binding signature by the holder ties the proof to one challenge.

use std::collections::{BTreeSet, HashSet};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;
use crate::crypto::hash::{self, hash_parts};
use crate::crypto::signing;
use crate::error::{Result, TrustError};

use super::model::{AgentCredential, DisclosedClaims};

/// Format tag of the bundled salted-digest proof.
pub const SALTED_SHA256_FORMAT: &str = "salted-sha256";

pub(crate) const ROLE_CLAIM: &str = "role";
pub(crate) const SCOPE_CLAIM: &str = "scope";

const CREDENTIAL_DOMAIN: &[u8] = b"agentic-did/credential/v1";
const CLAIM_DOMAIN: &[u8] = b"agentic-did/claim/v1";
const BINDING_DOMAIN: &[u8] = b"agentic-did/disclosure-binding/v1";

/// Opaque selective-disclosure proof envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureProof {
    /// Proof system identifier, e.g. `salted-sha256`.
    pub format: String,
    /// Format-specific payload.
    pub value: serde_json::Value,
}

/// Everything a disclosure verifier may check a proof against.
#[derive(Debug, Clone, Copy)]
pub struct DisclosureContext<'a> {
    pub cred_hash: &'a str,
    pub holder_key: &'a VerifyingKey,
    pub disclosed: &'a DisclosedClaims,
    pub challenge: &'a Challenge,
}

/// Pluggable selective-disclosure verification capability.
///
/// Implementations return `TrustError::DisclosureProofInvalid` on any failure.
pub trait DisclosureVerifier: Send + Sync {
    /// Verify `proof` against the committed credential and disclosed claims.
    fn verify(&self, proof: &DisclosureProof, ctx: &DisclosureContext<'_>) -> Result<()>;
}

/// A revealed claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDisclosure {
    pub salt: String,
    pub name: String,
    pub value: String,
}

/// Payload of a `salted-sha256` proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaltedDisclosure {
    pub disclosures: Vec<ClaimDisclosure>,
    /// Digests of withheld claims.
    pub undisclosed: Vec<String>,
    /// Holder signature over the binding digest (base64).
    pub key_binding: String,
}

/// Digest committing to one claim.
pub(crate) fn claim_digest(salt: &str, name: &str, value: &str) -> String {
    hash_parts(&[
        CLAIM_DOMAIN,
        salt.as_bytes(),
        name.as_bytes(),
        value.as_bytes(),
    ])
}

/// Credential commitment over the holder key and the claim digests.
pub(crate) fn commit(holder_key: &VerifyingKey, digests: Vec<String>) -> String {
    let mut digests = digests;
    digests.sort();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(digests.len() + 2);
    parts.push(CREDENTIAL_DOMAIN);
    parts.push(holder_key.as_bytes());
    parts.extend(digests.iter().map(|d| d.as_bytes()));
    hash_parts(&parts)
}

/// Digest the holder signs to bind a proof to one challenge.
fn binding_digest(cred_hash: &str, challenge: &Challenge) -> String {
    hash_parts(&[
        BINDING_DOMAIN,
        cred_hash.as_bytes(),
        challenge.nonce.as_bytes(),
        challenge.audience.as_bytes(),
        challenge.expires_at.to_string().as_bytes(),
    ])
}

/// Produce a `salted-sha256` proof revealing the role and `scopes`.
///
/// Every scope in `scopes` must be held by the credential.
pub fn prove_disclosure(
    credential: &AgentCredential,
    scopes: &BTreeSet<String>,
    challenge: &Challenge,
) -> Result<DisclosureProof> {
    let mut disclosures = vec![ClaimDisclosure {
        salt: credential.role_salt().to_string(),
        name: ROLE_CLAIM.to_string(),
        value: credential.role.as_str().to_string(),
    }];
    let mut undisclosed = Vec::new();

    for scope in scopes {
        if !credential.scopes.contains(scope) {
            return Err(TrustError::InvalidRequest(format!(
                "credential does not hold scope {scope:?}"
            )));
        }
    }

    for (scope, salt) in credential.scope_salts() {
        if scopes.contains(scope) {
            disclosures.push(ClaimDisclosure {
                salt: salt.clone(),
                name: SCOPE_CLAIM.to_string(),
                value: scope.clone(),
            });
        } else {
            undisclosed.push(claim_digest(salt, SCOPE_CLAIM, scope));
        }
    }

    let binding = binding_digest(&credential.cred_hash, challenge);
    let key_binding = signing::sign_to_base64(credential.signing_key(), binding.as_bytes());

    let payload = SaltedDisclosure {
        disclosures,
        undisclosed,
        key_binding,
    };
    let value =
        serde_json::to_value(&payload).map_err(|e| TrustError::Serialization(e.to_string()))?;

    Ok(DisclosureProof {
        format: SALTED_SHA256_FORMAT.to_string(),
        value,
    })
}

/// Verifier for `salted-sha256` proofs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaltedDigestVerifier;

impl SaltedDigestVerifier {
    pub fn new() -> Self {
        Self
    }
}

fn invalid(detail: impl Into<String>) -> TrustError {
    TrustError::DisclosureProofInvalid(detail.into())
}

impl DisclosureVerifier for SaltedDigestVerifier {
    fn verify(&self, proof: &DisclosureProof, ctx: &DisclosureContext<'_>) -> Result<()> {
        if proof.format != SALTED_SHA256_FORMAT {
            return Err(invalid(format!("unsupported proof format {:?}", proof.format)));
        }
        let payload: SaltedDisclosure = serde_json::from_value(proof.value.clone())
            .map_err(|e| invalid(format!("unreadable proof payload: {e}")))?;

        // Revealed claims must match the disclosed claim set exactly.
        let mut expected: HashSet<(&str, &str)> = ctx
            .disclosed
            .scopes
            .iter()
            .map(|s| (SCOPE_CLAIM, s.as_str()))
            .collect();
        expected.insert((ROLE_CLAIM, ctx.disclosed.role.as_str()));

        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for d in &payload.disclosures {
            let key = (d.name.as_str(), d.value.as_str());
            if !expected.contains(&key) {
                return Err(invalid(format!(
                    "proof reveals {}={:?} which was not disclosed",
                    d.name, d.value
                )));
            }
            if !seen.insert(key) {
                return Err(invalid(format!("duplicate disclosure of {}", d.name)));
            }
        }
        if seen.len() != expected.len() {
            return Err(invalid("proof does not cover every disclosed claim"));
        }

        if let Some(bad) = payload.undisclosed.iter().find(|d| !hash::is_sha256_hex(d)) {
            return Err(invalid(format!("malformed withheld digest {bad:?}")));
        }

        let mut digests: Vec<String> = payload
            .disclosures
            .iter()
            .map(|d| claim_digest(&d.salt, &d.name, &d.value))
            .collect();
        digests.extend(payload.undisclosed.iter().map(|d| d.to_ascii_lowercase()));

        if commit(ctx.holder_key, digests) != ctx.cred_hash {
            return Err(invalid("claims are not consistent with the committed credential"));
        }

        let binding = binding_digest(ctx.cred_hash, ctx.challenge);
        if !signing::verify_from_base64(ctx.holder_key, binding.as_bytes(), &payload.key_binding) {
            return Err(invalid("key binding does not match this challenge"));
        }

        Ok(())
    }
}
