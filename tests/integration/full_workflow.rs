//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Enrol credentials with the credential-state oracle
//! 2. Issue a challenge bound to an audience
//! 3. Present a VP answering the challenge
//! 4. Receive a scoped, key-bound capability token
//! 5. Check the token at the resource
//! 6. Revoke the credential and verify the next presentation fails

use std::sync::Arc;
use std::time::Duration;

use agentic_did::capability::{verify_token, ActionRequirement};
use agentic_did::{
    AgentCredential, Clock, ErrorKind, InMemoryOracle, ManualClock, Policy, PresentationBuilder,
    RevocationReason, Role, TrustError, VerifierConfig, VerifierService,
};

fn deployment(clock: Arc<ManualClock>) -> (VerifierService, Arc<InMemoryOracle>) {
    let oracle = Arc::new(InMemoryOracle::new(clock.clone()));
    let service = VerifierService::builder(oracle.clone())
        .config(
            VerifierConfig::default()
                .with_issuer("https://verifier.example")
                .with_challenge_ttl(Duration::from_secs(60))
                .with_token_ttl(Duration::from_secs(120)),
        )
        .clock(clock)
        .build()
        .expect("config is valid");
    (service, oracle)
}

#[tokio::test]
async fn full_workflow_enrol_to_revocation() {
    let clock = Arc::new(ManualClock::starting_now());
    let (service, oracle) = deployment(clock.clone());

    // ── Step 1: Enrol a banker credential ───────────────────────────────
    let banker = AgentCredential::create(Role::Banker, ["bank:transfer", "bank:balance"])
        .expect("credential should be created");
    assert!(banker.pid.starts_with("pid_"));
    let receipt = oracle
        .register(&banker, Policy::new(Role::Banker, ["bank:transfer", "bank:balance"]))
        .expect("registration should succeed");
    assert_eq!(receipt.cred_hash, banker.cred_hash);

    // ── Step 2: Challenge ───────────────────────────────────────────────
    let challenge = service.get_challenge("bank-api").expect("challenge");
    assert_eq!(challenge.audience, "bank-api");
    assert!(challenge.expires_at > challenge.issued_at);

    // ── Step 3: Present ─────────────────────────────────────────────────
    let vp = PresentationBuilder::new(&banker, &challenge, receipt.clone())
        .build()
        .expect("presentation should build");
    let grant = service
        .present_vp(&vp, &challenge.nonce)
        .await
        .expect("banker should be granted");

    // ── Step 4: Token contents ──────────────────────────────────────────
    assert_eq!(grant.role, Role::Banker);
    assert!(grant.scopes.contains("bank:transfer"));
    let claims = &grant.token.claims;
    assert_eq!(claims.iss, "https://verifier.example");
    assert_eq!(claims.sub, banker.pid);
    assert_eq!(claims.aud, "bank-api");
    assert_eq!(claims.cnf.jkt, banker.key_thumbprint());
    assert!(claims.exp - claims.iat <= 120);

    // ── Step 5: Resource-side check ─────────────────────────────────────
    let checked = verify_token(
        &grant.token.compact,
        service.issuer_public_key(),
        "bank-api",
        clock.now_micros(),
    )
    .expect("token should verify");
    checked
        .confirm_key(banker.verifying_key())
        .expect("token is bound to the banker's key");
    checked
        .authorize(&ActionRequirement::new("transfer", Role::Banker, "bank:transfer"))
        .expect("banker may transfer");
    assert!(checked
        .authorize(&ActionRequirement::new("flight", Role::Traveler, "travel:book"))
        .is_err());

    // ── Step 6: Revoke, then present again ──────────────────────────────
    oracle
        .revoke(&banker.cred_hash, RevocationReason::ManualRevocation)
        .expect("revocation should succeed");
    let challenge = service.get_challenge("bank-api").expect("challenge");
    let vp = PresentationBuilder::new(&banker, &challenge, receipt)
        .build()
        .expect("presentation should build");
    let err = service
        .present_vp(&vp, &challenge.nonce)
        .await
        .expect_err("revoked credential must be refused");
    assert_eq!(err.kind(), ErrorKind::CredentialRevoked);
}

#[tokio::test]
async fn token_expires_after_ttl() {
    let clock = Arc::new(ManualClock::starting_now());
    let (service, oracle) = deployment(clock.clone());
    let shopper = AgentCredential::create(Role::Shopper, ["shop:purchase", "shop:cart"]).unwrap();
    let receipt = oracle
        .register(&shopper, Policy::new(Role::Shopper, ["shop:purchase", "shop:cart"]))
        .unwrap();

    let challenge = service.get_challenge("shop-api").unwrap();
    let vp = PresentationBuilder::new(&shopper, &challenge, receipt)
        .build()
        .unwrap();
    let grant = service.present_vp(&vp, &challenge.nonce).await.unwrap();

    clock.advance(Duration::from_secs(121));
    assert!(matches!(
        verify_token(
            &grant.token.compact,
            service.issuer_public_key(),
            "shop-api",
            clock.now_micros()
        ),
        Err(TrustError::TokenExpired)
    ));
}

#[tokio::test]
async fn partial_disclosure_grants_only_disclosed_scopes() {
    let clock = Arc::new(ManualClock::starting_now());
    let (service, oracle) = deployment(clock);
    let traveler = AgentCredential::create(Role::Traveler, ["travel:book", "travel:cancel"]).unwrap();
    let receipt = oracle
        .register(&traveler, Policy::new(Role::Traveler, ["travel:book", "travel:cancel"]))
        .unwrap();

    let challenge = service.get_challenge("travel-api").unwrap();
    let vp = PresentationBuilder::new(&traveler, &challenge, receipt)
        .disclose_scopes(["travel:book"])
        .build()
        .unwrap();
    let grant = service.present_vp(&vp, &challenge.nonce).await.unwrap();

    assert_eq!(grant.scopes.len(), 1);
    assert!(grant.token.claims.has_scope("travel:book"));
    assert!(!grant.token.claims.has_scope("travel:cancel"));
}

#[tokio::test]
async fn wildcard_policy_grants_disclosed_scopes() {
    let clock = Arc::new(ManualClock::starting_now());
    let (service, oracle) = deployment(clock);
    let admin = AgentCredential::create(Role::Admin, ["ops:restart", "ops:deploy"]).unwrap();
    let receipt = oracle
        .register(&admin, Policy::new(Role::Admin, ["ops:*"]))
        .unwrap();

    let challenge = service.get_challenge("ops-api").unwrap();
    let vp = PresentationBuilder::new(&admin, &challenge, receipt)
        .build()
        .unwrap();
    let grant = service.present_vp(&vp, &challenge.nonce).await.unwrap();
    assert_eq!(grant.scopes.len(), 2);
    assert_eq!(grant.role, Role::Admin);
}

#[tokio::test]
async fn vp_survives_json_transport() {
    let clock = Arc::new(ManualClock::starting_now());
    let (service, oracle) = deployment(clock);
    let banker = AgentCredential::create(Role::Banker, ["bank:balance"]).unwrap();
    let receipt = oracle
        .register(&banker, Policy::new(Role::Banker, ["bank:transfer", "bank:balance"]))
        .unwrap();

    let challenge = service.get_challenge("bank-api").unwrap();
    let json = PresentationBuilder::new(&banker, &challenge, receipt)
        .build()
        .unwrap()
        .to_json()
        .unwrap();
    let grant = service
        .present_vp_json(&json, &challenge.nonce)
        .await
        .unwrap();
    assert!(grant.scopes.contains("bank:balance"));
}
