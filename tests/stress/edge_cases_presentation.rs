//! Edge cases: malformed, oversized and boundary-timed presentations.
//!
//! None of these may panic, and every refusal must carry the right kind.

use std::sync::Arc;
use std::time::Duration;

use agentic_did::{
    AgentCredential, Clock, CredentialStateReceipt, ErrorKind, InMemoryOracle, ManualClock, Policy,
    PresentationBuilder, Role, VerifiablePresentation, VerifierConfig, VerifierService,
};

struct Env {
    clock: Arc<ManualClock>,
    oracle: Arc<InMemoryOracle>,
    service: VerifierService,
}

fn env() -> Env {
    let clock = Arc::new(ManualClock::starting_now());
    let oracle = Arc::new(InMemoryOracle::new(clock.clone()));
    let service = VerifierService::builder(oracle.clone())
        .config(VerifierConfig::default().with_challenge_ttl(Duration::from_secs(30)))
        .clock(clock.clone())
        .build()
        .unwrap();
    Env {
        clock,
        oracle,
        service,
    }
}

fn banker(env: &Env) -> (AgentCredential, CredentialStateReceipt) {
    let cred = AgentCredential::create(Role::Banker, ["bank:transfer"]).unwrap();
    let receipt = env
        .oracle
        .register(&cred, Policy::new(Role::Banker, ["bank:transfer"]))
        .unwrap();
    (cred, receipt)
}

#[tokio::test]
async fn edge_garbage_json_is_malformed() {
    let env = env();
    let ch = env.service.get_challenge("api").unwrap();
    for input in [
        "",
        "null",
        "[]",
        "{}",
        "{\"pid\": 5}",
        "\u{0}\u{1}\u{2}",
        "{".repeat(10_000).as_str(),
    ] {
        let err = env.service.present_vp_json(input, &ch.nonce).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVp, "input {input:?}");
    }
    // Structural failures do not burn the challenge.
    assert_eq!(env.service.challenges().outstanding(), 1);
}

#[tokio::test]
async fn edge_unknown_nonce() {
    let env = env();
    let (cred, receipt) = banker(&env);
    let ch = env.service.get_challenge("api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    for nonce in ["", "00", "f".repeat(64).as_str(), "x".repeat(100_000).as_str()] {
        let err = env.service.present_vp(&vp, nonce).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChallengeInvalidOrReused);
    }
}

#[tokio::test]
async fn edge_challenge_expiry_boundary() {
    let env = env();
    let (cred, receipt) = banker(&env);

    let ch = env.service.get_challenge("api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt.clone()).build().unwrap();
    env.clock.set(ch.expires_at);
    assert!(env.service.present_vp(&vp, &ch.nonce).await.is_ok());

    let ch = env.service.get_challenge("api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    env.clock.set(ch.expires_at + 1);
    let err = env.service.present_vp(&vp, &ch.nonce).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChallengeInvalidOrReused);
}

#[tokio::test]
async fn edge_credential_expired_at_oracle() {
    let env = env();
    let cred = AgentCredential::create(Role::Banker, ["bank:transfer"]).unwrap();
    let receipt = env
        .oracle
        .register_hash(
            &cred.cred_hash,
            Policy::new(Role::Banker, ["bank:transfer"]),
            env.clock.now_micros() + 10_000_000,
        )
        .unwrap();
    env.clock.advance(Duration::from_secs(11));

    let ch = env.service.get_challenge("api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    let err = env.service.present_vp(&vp, &ch.nonce).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialExpired);
}

#[tokio::test]
async fn edge_unregistered_credential_is_unknown() {
    let env = env();
    let cred = AgentCredential::create(Role::Banker, ["bank:transfer"]).unwrap();
    let receipt = CredentialStateReceipt {
        attestation: "bm90LWEtc2lnbmF0dXJl".into(),
        cred_hash: cred.cred_hash.clone(),
    };
    let ch = env.service.get_challenge("api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    let err = env.service.present_vp(&vp, &ch.nonce).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialStateUnknown);
}

#[tokio::test]
async fn edge_many_scopes() {
    let env = env();
    let scopes: Vec<String> = (0..500).map(|i| format!("data:set-{i}")).collect();
    let cred = AgentCredential::create(Role::Agent, scopes.iter().cloned()).unwrap();
    let receipt = env
        .oracle
        .register(&cred, Policy::new(Role::Agent, ["data:*"]))
        .unwrap();

    let ch = env.service.get_challenge("api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();
    let grant = env.service.present_vp(&vp, &ch.nonce).await.unwrap();
    assert_eq!(grant.scopes.len(), 500);
}

#[tokio::test]
async fn edge_unicode_role_and_scopes() {
    let env = env();
    let role = Role::Custom("Ägent-观察者".into());
    let cred = AgentCredential::create(role.clone(), ["观察:读取", "émoji:🚀"]).unwrap();
    let receipt = env
        .oracle
        .register(&cred, Policy::new(role.clone(), ["观察:读取", "émoji:🚀"]))
        .unwrap();

    let ch = env.service.get_challenge("api").unwrap();
    let json = PresentationBuilder::new(&cred, &ch, receipt)
        .build()
        .unwrap()
        .to_json()
        .unwrap();
    let grant = env.service.present_vp_json(&json, &ch.nonce).await.unwrap();
    assert_eq!(grant.role, role);
}

#[tokio::test]
async fn edge_structural_defects_each_malformed() {
    let env = env();
    let (cred, receipt) = banker(&env);
    let ch = env.service.get_challenge("api").unwrap();
    let vp = PresentationBuilder::new(&cred, &ch, receipt).build().unwrap();

    let defects: [fn(&mut VerifiablePresentation); 8] = [
        |vp| vp.pid = String::new(),
        |vp| vp.pid = "pid_0OIl".into(),
        |vp| vp.holder_key = "not base64!".into(),
        |vp| vp.possession_proof = "AAAA".into(),
        |vp| vp.receipt.cred_hash = "ABC".into(),
        |vp| vp.receipt.attestation = String::new(),
        |vp| vp.disclosed.scopes.clear(),
        |vp| {
            vp.disclosed.scopes.insert("has space".into());
        },
    ];
    for (i, defect) in defects.iter().enumerate() {
        let mut broken = vp.clone();
        defect(&mut broken);
        let err = env.service.present_vp(&broken, &ch.nonce).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVp, "defect {i}");
    }
    // The untouched presentation still redeems the challenge.
    assert!(env.service.present_vp(&vp, &ch.nonce).await.is_ok());
}

#[test]
fn edge_empty_audience_rejected() {
    let env = env();
    for audience in ["", " ", "\t\n"] {
        let err = env.service.get_challenge(audience).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}

#[test]
fn edge_credential_without_scopes_rejected() {
    let none: [&str; 0] = [];
    assert!(AgentCredential::create(Role::Banker, none).is_err());
    assert!(AgentCredential::create(Role::Banker, ["bad scope"]).is_err());
}
