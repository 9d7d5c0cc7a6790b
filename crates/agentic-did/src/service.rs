//! Verifier service: composition root of the trust core.
//!
//! Wires the challenge issuer, VP verifier and capability issuer together
//! behind the two protocol operations transports expose:
//! [`VerifierService::get_challenge`] and [`VerifierService::present_vp`].

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::capability::{CapabilityIssuer, CapabilityToken};
use crate::challenge::{Challenge, ChallengeIssuer};
use crate::config::VerifierConfig;
use crate::credential::{DisclosureVerifier, Role, SaltedDigestVerifier};
use crate::crypto::keys::Ed25519KeyPair;
use crate::error::Result;
use crate::oracle::CredentialStateOracle;
use crate::presentation::VerifiablePresentation;
use crate::time::{Clock, SystemClock};
use crate::verifier::VpVerifier;

/// What a successful presentation earns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub role: Role,
    pub scopes: BTreeSet<String>,
    pub token: CapabilityToken,
}

/// The verifier: challenges in, capability tokens out.
pub struct VerifierService {
    config: VerifierConfig,
    challenges: Arc<ChallengeIssuer>,
    verifier: VpVerifier,
    issuer: CapabilityIssuer,
}

impl VerifierService {
    /// Start building a service around `oracle`.
    pub fn builder(oracle: Arc<dyn CredentialStateOracle>) -> ServiceBuilder {
        ServiceBuilder::new(oracle)
    }

    /// Issue a challenge bound to `audience`.
    pub fn get_challenge(&self, audience: &str) -> Result<Challenge> {
        self.challenges.issue_challenge(audience)
    }

    /// Verify a presentation and, on success, mint a capability token.
    pub async fn present_vp(&self, vp: &VerifiablePresentation, nonce: &str) -> Result<Grant> {
        let verified = self.verifier.verify(vp, nonce).await?;

        let token = self.issuer.issue(
            &verified.pid,
            &verified.role,
            &verified.scopes,
            &verified.audience,
            &verified.key_thumbprint,
        )?;

        log::info!(
            "granted {} {:?} to {} for {}",
            verified.role,
            verified.scopes,
            verified.pid,
            verified.audience
        );
        Ok(Grant {
            role: verified.role,
            scopes: verified.scopes,
            token,
        })
    }

    /// Same as [`present_vp`](Self::present_vp), parsing the presentation
    /// from JSON first. Unparseable input is `MalformedVP`.
    pub async fn present_vp_json(&self, vp_json: &str, nonce: &str) -> Result<Grant> {
        let vp = VerifiablePresentation::from_json(vp_json)?;
        self.present_vp(&vp, nonce).await
    }

    /// Key resource servers check capability tokens with.
    pub fn issuer_public_key(&self) -> &VerifyingKey {
        self.issuer.public_key()
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// The challenge registry.
    pub fn challenges(&self) -> &Arc<ChallengeIssuer> {
        &self.challenges
    }

    /// Spawn a task that evicts expired challenges every `interval`.
    ///
    /// The task ends on its own once the service is dropped. Must be called
    /// from within a tokio runtime.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let registry: Weak<ChallengeIssuer> = Arc::downgrade(&self.challenges);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    log::debug!("challenge sweeper stopping");
                    break;
                };
                let evicted = registry.sweep_expired();
                if evicted > 0 {
                    log::debug!("swept {evicted} expired challenge(s)");
                }
            }
        })
    }
}

/// Builder for [`VerifierService`].
pub struct ServiceBuilder {
    config: VerifierConfig,
    oracle: Arc<dyn CredentialStateOracle>,
    disclosure: Arc<dyn DisclosureVerifier>,
    issuer_key: Option<Ed25519KeyPair>,
    clock: Arc<dyn Clock>,
}

impl ServiceBuilder {
    /// Defaults: default config, salted-digest disclosure proofs, a fresh
    /// issuer key and the system clock.
    pub fn new(oracle: Arc<dyn CredentialStateOracle>) -> Self {
        Self {
            config: VerifierConfig::default(),
            oracle,
            disclosure: Arc::new(SaltedDigestVerifier::new()),
            issuer_key: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the selective-disclosure proof system.
    pub fn disclosure_verifier(mut self, verifier: Arc<dyn DisclosureVerifier>) -> Self {
        self.disclosure = verifier;
        self
    }

    /// Sign capability tokens with `key_pair`.
    pub fn issuer_key(mut self, key_pair: Ed25519KeyPair) -> Self {
        self.issuer_key = Some(key_pair);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and assemble the service.
    pub fn build(self) -> Result<VerifierService> {
        self.config.validate()?;

        let issuer_key = self.issuer_key.unwrap_or_else(Ed25519KeyPair::generate);
        let challenges = Arc::new(ChallengeIssuer::new(&self.config, self.clock.clone()));
        let verifier = VpVerifier::new(
            challenges.clone(),
            self.oracle,
            self.disclosure,
            self.config.oracle_timeout,
        );
        let issuer = CapabilityIssuer::new(&self.config, issuer_key, self.clock);

        log::debug!(
            "verifier service ready: issuer {}, challenge ttl {:?}, token ttl {:?}",
            self.config.issuer,
            self.config.challenge_ttl,
            self.config.token_ttl
        );
        Ok(VerifierService {
            config: self.config,
            challenges,
            verifier,
            issuer,
        })
    }
}
