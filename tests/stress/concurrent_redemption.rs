//! Stress test: many presenters race to redeem the same challenge.
//!
//! Exactly one of them may get past nonce redemption; every other attempt
//! must fail with `ChallengeInvalidOrReused`, whatever the interleaving.

use std::sync::Arc;

use agentic_did::{
    AgentCredential, ChallengeIssuer, ErrorKind, InMemoryOracle, ManualClock, Policy,
    PresentationBuilder, Role, VerifierConfig, VerifierService,
};

fn service() -> (Arc<VerifierService>, Arc<InMemoryOracle>) {
    let clock = Arc::new(ManualClock::starting_now());
    let oracle = Arc::new(InMemoryOracle::new(clock.clone()));
    let service = VerifierService::builder(oracle.clone())
        .clock(clock)
        .build()
        .expect("default config is valid");
    (Arc::new(service), oracle)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn stress_64_way_race_on_one_nonce() {
    let (service, oracle) = service();
    let cred = AgentCredential::create(Role::Banker, ["bank:transfer"]).unwrap();
    let receipt = oracle
        .register(&cred, Policy::new(Role::Banker, ["bank:transfer"]))
        .unwrap();

    let ch = service.get_challenge("bank-api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(64));
    let mut handles = Vec::with_capacity(64);
    for _ in 0..64 {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let vp = vp.clone();
        let nonce = ch.nonce.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service.present_vp(&vp, &nonce).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(_) => granted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::ChallengeInvalidOrReused),
        }
    }
    assert_eq!(granted, 1, "exactly one presenter may redeem the nonce");
    assert_eq!(service.challenges().outstanding(), 0);
}

#[test]
fn stress_1000_nonces_each_redeemed_once_across_threads() {
    let clock = Arc::new(ManualClock::starting_now());
    let config = VerifierConfig::default().with_max_outstanding_challenges(1_000);
    let issuer = Arc::new(ChallengeIssuer::new(&config, clock));

    let nonces: Vec<String> = (0..1_000)
        .map(|i| issuer.issue_challenge(&format!("aud-{i}")).unwrap().nonce)
        .collect();
    let nonces = Arc::new(nonces);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let issuer = Arc::clone(&issuer);
            let nonces = Arc::clone(&nonces);
            std::thread::spawn(move || {
                nonces
                    .iter()
                    .filter(|n| issuer.redeem(n).is_ok())
                    .count()
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 1_000, "every nonce redeemed exactly once overall");
    assert_eq!(issuer.outstanding(), 0);
}

#[test]
fn stress_issue_and_redeem_interleaved() {
    let clock = Arc::new(ManualClock::starting_now());
    let config = VerifierConfig::default().with_max_outstanding_challenges(10_000);
    let issuer = Arc::new(ChallengeIssuer::new(&config, clock));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let issuer = Arc::clone(&issuer);
            std::thread::spawn(move || {
                for i in 0..250 {
                    let ch = issuer.issue_challenge(&format!("aud-{t}-{i}")).unwrap();
                    assert!(issuer.redeem(&ch.nonce).is_ok());
                    assert!(issuer.redeem(&ch.nonce).is_err());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(issuer.outstanding(), 0);
}
