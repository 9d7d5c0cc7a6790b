//! Capability token format.
//!
//! Compact serialization: `base64url(header).base64url(claims).base64url(sig)`,
//! where the signature is Ed25519 over the first two segments. Tokens are
//! self-contained: a resource server needs only the issuer's public key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::credential::Role;
use crate::crypto::{hash, signing};
use crate::error::{Result, TrustError};
use crate::policy::scopes_cover;

/// Signature algorithm named in the token header.
pub const TOKEN_ALGORITHM: &str = "EdDSA";

/// Token type named in the token header.
pub const TOKEN_TYPE: &str = "agentic-cap+jwt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    pub(crate) fn standard() -> Self {
        Self {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        }
    }
}

/// Proof-of-possession confirmation claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Thumbprint of the key the holder proved possession of.
    pub jkt: String,
}

/// Claims carried by a capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaims {
    /// Verifier that minted the token.
    pub iss: String,
    /// Presentation identifier of the agent.
    pub sub: String,
    /// Protected resource the token is good for.
    pub aud: String,
    pub role: Role,
    /// Granted scopes, sorted.
    pub scope: Vec<String>,
    /// Issued at (Unix seconds).
    pub iat: u64,
    /// Expiry (Unix seconds).
    pub exp: u64,
    /// Unique token identifier.
    pub jti: String,
    pub cnf: Confirmation,
}

impl CapabilityClaims {
    /// Whether a granted scope covers `required` (wildcards honoured).
    pub fn has_scope(&self, required: &str) -> bool {
        scopes_cover(&self.scope, required)
    }

    /// Check that the token is bound to `holder_key`.
    pub fn confirm_key(&self, holder_key: &VerifyingKey) -> Result<()> {
        if hash::key_thumbprint(holder_key) != self.cnf.jkt {
            return Err(TrustError::TokenInvalid(
                "token is bound to a different key".into(),
            ));
        }
        Ok(())
    }

    /// Check the token against an action's role and scope requirement.
    pub fn authorize(&self, action: &ActionRequirement) -> Result<()> {
        if self.role != action.required_role {
            return Err(TrustError::Forbidden(format!(
                "{} requires role {}, token grants {}",
                action.id, action.required_role, self.role
            )));
        }
        if !self.has_scope(&action.required_scope) {
            return Err(TrustError::Forbidden(format!(
                "{} requires scope {}",
                action.id, action.required_scope
            )));
        }
        Ok(())
    }

    /// Remaining lifetime in seconds at `now_micros` (0 once expired).
    pub fn ttl_secs(&self, now_micros: u64) -> u64 {
        self.exp.saturating_sub(now_micros / 1_000_000)
    }
}

/// What a protected action demands of a capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequirement {
    pub id: String,
    pub required_role: Role,
    pub required_scope: String,
}

impl ActionRequirement {
    pub fn new(id: impl Into<String>, required_role: Role, required_scope: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required_role,
            required_scope: required_scope.into(),
        }
    }
}

/// A minted capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityToken {
    pub claims: CapabilityClaims,
    /// Compact signed form handed to the agent.
    pub compact: String,
}

fn invalid(detail: impl Into<String>) -> TrustError {
    TrustError::TokenInvalid(detail.into())
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| invalid(format!("{what} is not base64url: {e}")))
}

/// Verify a compact token and return its claims.
///
/// Checks structure, header, signature, audience and expiry in that order.
pub fn verify_token(
    compact: &str,
    issuer_key: &VerifyingKey,
    expected_audience: &str,
    now_micros: u64,
) -> Result<CapabilityClaims> {
    let mut segments = compact.split('.');
    let (header_b64, claims_b64, sig_b64) =
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => return Err(invalid("token must have three segments")),
        };

    let header: TokenHeader = serde_json::from_slice(&decode_segment(header_b64, "header")?)
        .map_err(|e| invalid(format!("unreadable header: {e}")))?;
    if header.alg != TOKEN_ALGORITHM || header.typ != TOKEN_TYPE {
        return Err(invalid(format!(
            "unsupported token header {}/{}",
            header.alg, header.typ
        )));
    }

    let sig_bytes: [u8; 64] = decode_segment(sig_b64, "signature")?
        .try_into()
        .map_err(|_| invalid("signature must be 64 bytes"))?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    if !signing::verify(
        issuer_key,
        signing_input.as_bytes(),
        &Signature::from_bytes(&sig_bytes),
    ) {
        return Err(invalid("signature does not verify"));
    }

    let claims: CapabilityClaims = serde_json::from_slice(&decode_segment(claims_b64, "claims")?)
        .map_err(|e| invalid(format!("unreadable claims: {e}")))?;

    if claims.aud != expected_audience {
        return Err(invalid(format!(
            "token audience {} does not match {expected_audience}",
            claims.aud
        )));
    }
    if now_micros / 1_000_000 >= claims.exp {
        return Err(TrustError::TokenExpired);
    }

    Ok(claims)
}
