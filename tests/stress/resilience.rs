//! Resilience: a slow, failing or misbehaving credential-state oracle.
//!
//! Infrastructure failures surface as `OracleUnavailable`, are never read as
//! a credential state, and never stall unrelated requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use agentic_did::{
    AgentCredential, CredentialStateOracle, CredentialStateReceipt, CredentialStatus, Denial,
    ErrorKind, InMemoryOracle, ManualClock, OracleError, OracleResponse, Policy,
    PresentationBuilder, Role, VerifierConfig, VerifierService,
};

/// Delegates to an inner oracle after a delay.
struct DelayedOracle {
    inner: InMemoryOracle,
    delay: Duration,
}

#[async_trait]
impl CredentialStateOracle for DelayedOracle {
    async fn lookup(
        &self,
        cred_hash: &str,
        attestation: &str,
    ) -> Result<OracleResponse, OracleError> {
        tokio::time::sleep(self.delay).await;
        self.inner.lookup(cred_hash, attestation).await
    }
}

/// Fails the first `failures` lookups, then delegates.
struct FlakyOracle {
    inner: InMemoryOracle,
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialStateOracle for FlakyOracle {
    async fn lookup(
        &self,
        cred_hash: &str,
        attestation: &str,
    ) -> Result<OracleResponse, OracleError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(OracleError::Transport(format!("connection reset (call {call})")));
        }
        self.inner.lookup(cred_hash, attestation).await
    }
}

/// Answers every lookup with a fixed response.
struct FixedOracle(OracleResponse);

#[async_trait]
impl CredentialStateOracle for FixedOracle {
    async fn lookup(&self, _: &str, _: &str) -> Result<OracleResponse, OracleError> {
        Ok(self.0.clone())
    }
}

fn enrol(oracle: &InMemoryOracle) -> (AgentCredential, CredentialStateReceipt) {
    let cred = AgentCredential::create(Role::Banker, ["bank:transfer"]).unwrap();
    let receipt = oracle
        .register(&cred, Policy::new(Role::Banker, ["bank:transfer"]))
        .unwrap();
    (cred, receipt)
}

fn config(oracle_timeout: Duration) -> VerifierConfig {
    VerifierConfig::default().with_oracle_timeout(oracle_timeout)
}

#[tokio::test]
async fn resilience_slow_oracle_times_out() {
    let clock = Arc::new(ManualClock::starting_now());
    let inner = InMemoryOracle::new(clock.clone());
    let (cred, receipt) = enrol(&inner);
    let oracle = Arc::new(DelayedOracle {
        inner,
        delay: Duration::from_secs(10),
    });
    let service = VerifierService::builder(oracle)
        .config(config(Duration::from_millis(100)))
        .clock(clock)
        .build()
        .unwrap();

    let ch = service.get_challenge("bank-api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();

    let started = Instant::now();
    let err = service.present_vp(&vp, &ch.nonce).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OracleUnavailable);
    assert!(started.elapsed() < Duration::from_secs(5));

    let denial = Denial::from(&err);
    assert!(denial.retryable, "infrastructure failures are retryable");
}

#[tokio::test]
async fn resilience_oracle_within_timeout_succeeds() {
    let clock = Arc::new(ManualClock::starting_now());
    let inner = InMemoryOracle::new(clock.clone());
    let (cred, receipt) = enrol(&inner);
    let oracle = Arc::new(DelayedOracle {
        inner,
        delay: Duration::from_millis(20),
    });
    let service = VerifierService::builder(oracle)
        .config(config(Duration::from_secs(2)))
        .clock(clock)
        .build()
        .unwrap();

    let ch = service.get_challenge("bank-api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    assert!(service.present_vp(&vp, &ch.nonce).await.is_ok());
}

#[tokio::test]
async fn resilience_failure_consumes_nonce_and_retry_needs_new_challenge() {
    let clock = Arc::new(ManualClock::starting_now());
    let inner = InMemoryOracle::new(clock.clone());
    let (cred, receipt) = enrol(&inner);
    let oracle = Arc::new(FlakyOracle {
        inner,
        failures: 1,
        calls: AtomicUsize::new(0),
    });
    let service = VerifierService::builder(oracle)
        .clock(clock)
        .build()
        .unwrap();

    let ch = service.get_challenge("bank-api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt.clone()).build().unwrap();
    let err = service.present_vp(&vp, &ch.nonce).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OracleUnavailable);

    // Same nonce again: it was consumed by the failed attempt.
    let err = service.present_vp(&vp, &ch.nonce).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChallengeInvalidOrReused);

    // A fresh challenge goes through once the oracle recovers.
    let ch = service.get_challenge("bank-api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    assert!(service.present_vp(&vp, &ch.nonce).await.is_ok());
}

#[tokio::test]
async fn resilience_valid_without_policy_is_not_trusted() {
    let clock = Arc::new(ManualClock::starting_now());
    let oracle = Arc::new(FixedOracle(OracleResponse::status_only(
        CredentialStatus::Valid,
        0,
    )));
    let service = VerifierService::builder(oracle)
        .clock(clock)
        .build()
        .unwrap();
    let cred = AgentCredential::create(Role::Banker, ["bank:transfer"]).unwrap();
    let receipt = CredentialStateReceipt {
        attestation: "opaque".into(),
        cred_hash: cred.cred_hash.clone(),
    };

    let ch = service.get_challenge("bank-api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    let err = service.present_vp(&vp, &ch.nonce).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialStateUnknown);
    assert!(!Denial::from(&err).retryable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resilience_slow_lookup_does_not_block_challenges() {
    let clock = Arc::new(ManualClock::starting_now());
    let inner = InMemoryOracle::new(clock.clone());
    let (cred, receipt) = enrol(&inner);
    let oracle = Arc::new(DelayedOracle {
        inner,
        delay: Duration::from_millis(500),
    });
    let service = Arc::new(
        VerifierService::builder(oracle)
            .config(config(Duration::from_secs(5)))
            .clock(clock)
            .build()
            .unwrap(),
    );

    let ch = service.get_challenge("bank-api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    let pending = {
        let service = Arc::clone(&service);
        let nonce = ch.nonce.clone();
        tokio::spawn(async move { service.present_vp(&vp, &nonce).await })
    };

    // While the lookup is in flight the registry stays usable.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = Instant::now();
    for i in 0..100 {
        service.get_challenge(&format!("other-{i}")).unwrap();
    }
    assert!(started.elapsed() < Duration::from_millis(400));

    assert!(pending.await.unwrap().is_ok());
}
