//! Capability issuer: mints signed, short-TTL, key-bound tokens.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::VerifyingKey;

use crate::config::VerifierConfig;
use crate::credential::Role;
use crate::crypto::keys::Ed25519KeyPair;
use crate::crypto::{random, signing};
use crate::error::{Result, TrustError};
use crate::time::Clock;

use super::token::{CapabilityClaims, CapabilityToken, Confirmation, TokenHeader};

/// Owns the token signing key and mints capability tokens.
pub struct CapabilityIssuer {
    issuer: String,
    ttl_secs: u64,
    key_pair: Ed25519KeyPair,
    clock: Arc<dyn Clock>,
}

fn failed(detail: impl Into<String>) -> TrustError {
    TrustError::IssuanceFailed(detail.into())
}

impl CapabilityIssuer {
    /// Create an issuer signing with `key_pair`, using issuer identity and
    /// token TTL from `config`.
    pub fn new(config: &VerifierConfig, key_pair: Ed25519KeyPair, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer: config.issuer.clone(),
            ttl_secs: config.token_ttl.as_secs().max(1),
            key_pair,
            clock,
        }
    }

    /// Public key resource servers verify tokens with.
    pub fn public_key(&self) -> &VerifyingKey {
        self.key_pair.verifying_key()
    }

    /// Issuer identity written into `iss`.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Mint a token for exactly `scopes`.
    ///
    /// Any failure yields `IssuanceFailed` and no token.
    pub fn issue(
        &self,
        subject: &str,
        role: &Role,
        scopes: &BTreeSet<String>,
        audience: &str,
        key_thumbprint: &str,
    ) -> Result<CapabilityToken> {
        if subject.is_empty() {
            return Err(failed("subject is empty"));
        }
        if scopes.is_empty() {
            return Err(failed("refusing to mint a token without scopes"));
        }
        if audience.is_empty() {
            return Err(failed("audience is empty"));
        }
        if key_thumbprint.is_empty() {
            return Err(failed("key thumbprint is empty"));
        }

        let iat = self.clock.now_micros() / 1_000_000;
        let claims = CapabilityClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: audience.to_string(),
            role: role.clone(),
            scope: scopes.iter().cloned().collect(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
            jti: random::random_token_id(),
            cnf: Confirmation {
                jkt: key_thumbprint.to_string(),
            },
        };

        let header_json = serde_json::to_vec(&TokenHeader::standard())
            .map_err(|e| failed(format!("header serialization: {e}")))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| failed(format!("claims serialization: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = signing::try_sign(self.key_pair.signing_key(), signing_input.as_bytes())?;
        let compact = format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        );

        log::info!(
            "minted capability {} for {subject} on {audience}: {} scope(s), ttl {}s",
            claims.jti,
            claims.scope.len(),
            self.ttl_secs
        );
        Ok(CapabilityToken { claims, compact })
    }
}
