//! Verifier configuration.
//!
//! Passed by value into each component's constructor; nothing in the
//! protocol path reads process environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};

/// Longest challenge lifetime accepted by [`VerifierConfig::validate`].
pub const MAX_CHALLENGE_TTL: Duration = Duration::from_secs(300);

/// Longest capability token lifetime accepted by [`VerifierConfig::validate`].
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(600);

/// Configuration for the verifier service and its components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Issuer identity written into every capability token (`iss`).
    pub issuer: String,
    /// How long an issued challenge stays redeemable.
    #[serde(rename = "challenge_ttl_secs", with = "secs")]
    pub challenge_ttl: Duration,
    /// Lifetime of minted capability tokens.
    #[serde(rename = "token_ttl_secs", with = "secs")]
    pub token_ttl: Duration,
    /// Upper bound on a single credential-state oracle call.
    #[serde(rename = "oracle_timeout_ms", with = "millis")]
    pub oracle_timeout: Duration,
    /// Registry capacity; issuing beyond it fails with `ResourceExhausted`.
    pub max_outstanding_challenges: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            issuer: "https://agenticdid.io".to_string(),
            challenge_ttl: Duration::from_secs(120),
            token_ttl: Duration::from_secs(120),
            oracle_timeout: Duration::from_secs(5),
            max_outstanding_challenges: 10_000,
        }
    }
}

impl VerifierConfig {
    /// Override the issuer identity.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Override the challenge lifetime.
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    /// Override the token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Override the oracle timeout.
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    /// Override the registry capacity.
    pub fn with_max_outstanding_challenges(mut self, max: usize) -> Self {
        self.max_outstanding_challenges = max;
        self
    }

    /// Check that every value is inside its accepted range.
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(TrustError::InvalidConfig("issuer must not be empty".into()));
        }
        if self.challenge_ttl < Duration::from_secs(1) || self.challenge_ttl > MAX_CHALLENGE_TTL {
            return Err(TrustError::InvalidConfig(format!(
                "challenge_ttl must be between 1s and {}s",
                MAX_CHALLENGE_TTL.as_secs()
            )));
        }
        if self.token_ttl < Duration::from_secs(1) || self.token_ttl > MAX_TOKEN_TTL {
            return Err(TrustError::InvalidConfig(format!(
                "token_ttl must be between 1s and {}s",
                MAX_TOKEN_TTL.as_secs()
            )));
        }
        if self.oracle_timeout.is_zero() {
            return Err(TrustError::InvalidConfig(
                "oracle_timeout must be non-zero".into(),
            ));
        }
        if self.max_outstanding_challenges == 0 {
            return Err(TrustError::InvalidConfig(
                "max_outstanding_challenges must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TrustError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TrustError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
