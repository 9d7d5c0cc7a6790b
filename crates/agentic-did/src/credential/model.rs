//! The credential an agent holds and the claims it discloses.
//!
//! A credential commits to its role and each of its scopes through salted
//! SHA-256 digests. The commitment (`cred_hash`) also covers the holder's
//! public key, so a copied credential is useless without the private key.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::crypto::hash;
use crate::crypto::keys::Ed25519KeyPair;
use crate::crypto::random;
use crate::error::{Result, TrustError};

use super::disclosure::{claim_digest, commit, ROLE_CLAIM, SCOPE_CLAIM};
use super::role::Role;

/// Default validity window of a freshly created credential (one year).
pub const DEFAULT_CREDENTIAL_VALIDITY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Minimal, voluntarily revealed subset of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedClaims {
    pub role: Role,
    pub scopes: BTreeSet<String>,
}

impl DisclosedClaims {
    /// Build disclosed claims from a role and any iterable of scopes.
    pub fn new<I, S>(role: Role, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role,
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

/// A credential held privately by an agent.
///
/// The signing key is zeroized on drop (see [`Ed25519KeyPair`]).
pub struct AgentCredential {
    key_pair: Ed25519KeyPair,
    /// Privacy-preserving identifier derived from the holder key.
    pub pid: String,
    pub role: Role,
    pub scopes: BTreeSet<String>,
    role_salt: String,
    scope_salts: BTreeMap<String, String>,
    /// Commitment identifying this credential at the state oracle.
    pub cred_hash: String,
    /// Issue timestamp (microseconds since epoch).
    pub issued_at: u64,
    /// Expiry timestamp (microseconds since epoch).
    pub expires_at: u64,
}

impl AgentCredential {
    /// Create a credential valid for [`DEFAULT_CREDENTIAL_VALIDITY`] from now.
    pub fn create<I, S>(role: Role, scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::create_at(
            role,
            scopes,
            crate::time::now_micros(),
            DEFAULT_CREDENTIAL_VALIDITY,
        )
    }

    /// Create a credential with an explicit issue time and validity window.
    pub fn create_at<I, S>(role: Role, scopes: I, issued_at: u64, validity: Duration) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scopes: BTreeSet<String> = scopes.into_iter().map(Into::into).collect();
        if scopes.is_empty() {
            return Err(TrustError::InvalidRequest(
                "a credential needs at least one scope".into(),
            ));
        }
        if let Some(bad) = scopes.iter().find(|s| !is_well_formed_scope(s)) {
            return Err(TrustError::InvalidRequest(format!(
                "malformed scope {bad:?}"
            )));
        }

        let key_pair = Ed25519KeyPair::generate();
        let pid = hash::pid_for_key(key_pair.verifying_key());
        let role_salt = random::random_salt_hex();
        let scope_salts: BTreeMap<String, String> = scopes
            .iter()
            .map(|s| (s.clone(), random::random_salt_hex()))
            .collect();

        let mut digests = vec![claim_digest(&role_salt, ROLE_CLAIM, role.as_str())];
        digests.extend(
            scope_salts
                .iter()
                .map(|(scope, salt)| claim_digest(salt, SCOPE_CLAIM, scope)),
        );
        let cred_hash = commit(key_pair.verifying_key(), digests);

        let expires_at = issued_at.saturating_add(crate::time::duration_micros(validity));

        Ok(Self {
            key_pair,
            pid,
            role,
            scopes,
            role_salt,
            scope_salts,
            cred_hash,
            issued_at,
            expires_at,
        })
    }

    /// Return a reference to the holder's signing key.
    pub fn signing_key(&self) -> &SigningKey {
        self.key_pair.signing_key()
    }

    /// Return the holder's public key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.key_pair.verifying_key()
    }

    /// Return the holder's public key as base64.
    pub fn holder_key_base64(&self) -> String {
        self.key_pair.public_key_base64()
    }

    /// Thumbprint of the holder key, as embedded in capability tokens.
    pub fn key_thumbprint(&self) -> String {
        hash::key_thumbprint(self.key_pair.verifying_key())
    }

    /// Whether the credential's own validity window has closed.
    pub fn is_expired(&self, now_micros: u64) -> bool {
        now_micros > self.expires_at
    }

    /// The full claim set, as it would be disclosed with nothing withheld.
    pub fn claims(&self) -> DisclosedClaims {
        DisclosedClaims {
            role: self.role.clone(),
            scopes: self.scopes.clone(),
        }
    }

    pub(crate) fn role_salt(&self) -> &str {
        &self.role_salt
    }

    pub(crate) fn scope_salts(&self) -> &BTreeMap<String, String> {
        &self.scope_salts
    }
}

impl std::fmt::Debug for AgentCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // salts stay out of logs; they would unblind undisclosed claims
        f.debug_struct("AgentCredential")
            .field("pid", &self.pid)
            .field("role", &self.role)
            .field("scopes", &self.scopes)
            .field("cred_hash", &self.cred_hash)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// A scope is a non-empty token without whitespace or control characters.
pub fn is_well_formed_scope(scope: &str) -> bool {
    !scope.is_empty()
        && scope.len() <= 256
        && !scope.chars().any(|c| c.is_whitespace() || c.is_control())
}
