//! Challenge issuance and the single-use nonce registry.
//!
//! A challenge binds a random 256-bit nonce to an audience and a short
//! expiry. Redemption removes the entry under the registry lock, so of any
//! number of concurrent redeemers exactly one receives the challenge.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::VerifierConfig;
use crate::crypto::random;
use crate::error::{Result, TrustError};
use crate::time::{duration_micros, Clock};

/// A single-use, time-bounded nonce bound to an audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// 32 random bytes, hex-encoded.
    pub nonce: String,
    /// Intended verifier or resource.
    pub audience: String,
    /// Issue timestamp (microseconds since epoch).
    pub issued_at: u64,
    /// Expiry timestamp (microseconds since epoch).
    pub expires_at: u64,
}

impl Challenge {
    /// Whether the challenge can no longer be redeemed at `now`.
    pub fn is_expired(&self, now_micros: u64) -> bool {
        now_micros > self.expires_at
    }
}

/// Abbreviate a nonce for log lines.
pub(crate) fn short_nonce(nonce: &str) -> &str {
    nonce.get(..8).unwrap_or(nonce)
}

/// Issues challenges and redeems them exactly once.
pub struct ChallengeIssuer {
    ttl_micros: u64,
    capacity: usize,
    clock: Arc<dyn Clock>,
    outstanding: Mutex<HashMap<String, Challenge>>,
}

impl ChallengeIssuer {
    /// Create an issuer using the challenge TTL and capacity from `config`.
    pub fn new(config: &VerifierConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl_micros: duration_micros(config.challenge_ttl),
            capacity: config.max_outstanding_challenges,
            clock,
            outstanding: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh challenge for `audience` and record it as outstanding.
    ///
    /// Fails with `ResourceExhausted` when the registry is full of live
    /// challenges.
    pub fn issue_challenge(&self, audience: &str) -> Result<Challenge> {
        let audience = audience.trim();
        if audience.is_empty() {
            return Err(TrustError::InvalidRequest(
                "audience must not be empty".into(),
            ));
        }

        let now = self.clock.now_micros();
        let mut outstanding = self.outstanding.lock().map_err(|_| {
            TrustError::ResourceExhausted("challenge registry unavailable".into())
        })?;

        if outstanding.len() >= self.capacity {
            outstanding.retain(|_, c| !c.is_expired(now));
            if outstanding.len() >= self.capacity {
                log::warn!(
                    "challenge registry full ({} outstanding); refusing audience {audience}",
                    outstanding.len()
                );
                return Err(TrustError::ResourceExhausted(format!(
                    "{} challenges outstanding",
                    outstanding.len()
                )));
            }
        }

        let challenge = Challenge {
            nonce: random::random_nonce_hex(),
            audience: audience.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(self.ttl_micros.max(1)),
        };
        outstanding.insert(challenge.nonce.clone(), challenge.clone());

        log::debug!(
            "issued challenge {}.. for {audience}",
            short_nonce(&challenge.nonce)
        );
        Ok(challenge)
    }

    /// Atomically consume an outstanding challenge.
    ///
    /// Unknown, already redeemed and expired nonces all fail with
    /// `ChallengeInvalidOrReused`. An expired entry is evicted by the attempt.
    pub fn redeem(&self, nonce: &str) -> Result<Challenge> {
        let now = self.clock.now_micros();
        let removed = {
            let mut outstanding = self.outstanding.lock().map_err(|_| {
                TrustError::ChallengeInvalidOrReused("challenge registry unavailable".into())
            })?;
            outstanding.remove(nonce)
        };

        match removed {
            None => Err(TrustError::ChallengeInvalidOrReused(
                "nonce unknown or already redeemed".into(),
            )),
            Some(challenge) if challenge.is_expired(now) => {
                Err(TrustError::ChallengeInvalidOrReused(format!(
                    "challenge expired at {}",
                    crate::time::micros_to_rfc3339(challenge.expires_at)
                )))
            }
            Some(challenge) => Ok(challenge),
        }
    }

    /// Drop every expired challenge. Returns how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_micros();
        match self.outstanding.lock() {
            Ok(mut outstanding) => {
                let before = outstanding.len();
                outstanding.retain(|_, c| !c.is_expired(now));
                before - outstanding.len()
            }
            Err(_) => 0,
        }
    }

    /// Number of challenges currently held (live or not yet swept).
    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().map(|o| o.len()).unwrap_or(0)
    }
}
