//! Revocation checks with online checks enabled.
//!
//! Uses wiremock to serve CRLs from the leaf's distribution point.

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use signed_data_verifier::{
    CertificateError, CrlRevocationChecker, InMemoryRevocationList, ManualClock,
    RevocationChecker, RevocationStatus, SignedDataVerifier, VerificationStatus,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

const CRL_PATH: &str = "/crl/intermediate.crl";

fn online_verifier(chain: &TestChain) -> SignedDataVerifier {
    SignedDataVerifier::new(sandbox_config(chain).with_online_checks(true)).unwrap()
}

async fn chain_with_crl_server() -> (TestChain, MockServer) {
    let server = MockServer::start().await;
    let chain = TestChain::build(ChainOptions {
        leaf_crl_url: Some(format!("{}{}", server.uri(), CRL_PATH)),
        ..Default::default()
    });
    (chain, server)
}

async fn serve_crl(server: &MockServer, status: u16, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(CRL_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_revoked_leaf_in_memory_list() {
    let chain = TestChain::new();
    let mut list = InMemoryRevocationList::new();
    list.revoke(&chain.leaf, &chain.intermediate).unwrap();

    let verifier = SignedDataVerifier::builder(sandbox_config(&chain).with_online_checks(true))
        .revocation_checker(Arc::new(list))
        .build()
        .unwrap();

    let err = verifier
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .unwrap_err();
    assert_eq!(err.status(), VerificationStatus::VerificationFailure);
    assert!(matches!(
        err.certificate_error(),
        Some(CertificateError::InvalidCertificate { .. })
    ));
}

#[tokio::test]
async fn test_revocation_ignored_when_online_checks_disabled() {
    let chain = TestChain::new();
    let mut list = InMemoryRevocationList::new();
    list.revoke(&chain.leaf, &chain.intermediate).unwrap();

    let verifier = SignedDataVerifier::builder(sandbox_config(&chain))
        .revocation_checker(Arc::new(list))
        .build()
        .unwrap();

    assert!(verifier
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_revoked_intermediate_in_memory_list() {
    let chain = TestChain::new();
    let mut list = InMemoryRevocationList::new();
    list.revoke(&chain.intermediate, &chain.root).unwrap();

    let verifier = SignedDataVerifier::builder(sandbox_config(&chain).with_online_checks(true))
        .revocation_checker(Arc::new(list))
        .build()
        .unwrap();

    let err = verifier
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .unwrap_err();
    assert_eq!(err.status(), VerificationStatus::VerificationFailure);
    assert!(matches!(
        err.certificate_error(),
        Some(CertificateError::InvalidCertificate { .. })
    ));
}

#[tokio::test]
async fn test_revocation_is_scoped_to_issuer() {
    // Same serial and names, different keys throughout.
    let revoked = TestChain::new();
    let unrelated = TestChain::new();
    assert_eq!(revoked.leaf_serial, unrelated.leaf_serial);

    let mut list = InMemoryRevocationList::new();
    list.revoke(&revoked.leaf, &revoked.intermediate).unwrap();

    assert_eq!(
        list.check(&unrelated.leaf, &unrelated.intermediate)
            .await
            .unwrap(),
        RevocationStatus::Good
    );

    let verifier =
        SignedDataVerifier::builder(sandbox_config(&unrelated).with_online_checks(true))
            .revocation_checker(Arc::new(list))
            .build()
            .unwrap();
    assert!(verifier
        .verify_and_decode_transaction(&unrelated.sign(&transaction_payload("Sandbox")))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_online_checks_reject_leaf_expired_at_wall_clock() {
    // Valid when signed, expired by the time it is presented.
    let chain = TestChain::build(ChainOptions {
        leaf_years: (2020, 2026),
        ..Default::default()
    });
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    let token = chain.sign(&transaction_payload("Sandbox"));

    let online = SignedDataVerifier::builder(sandbox_config(&chain).with_online_checks(true))
        .clock(Arc::new(ManualClock::new(now)))
        .revocation_checker(Arc::new(InMemoryRevocationList::new()))
        .build()
        .unwrap();
    let err = online
        .verify_and_decode_transaction(&token)
        .await
        .unwrap_err();
    assert_eq!(err.status(), VerificationStatus::VerificationFailure);
    assert!(matches!(
        err.certificate_error(),
        Some(CertificateError::InvalidCertificate { .. })
    ));

    // Offline, only the signing date counts.
    let offline = SignedDataVerifier::builder(sandbox_config(&chain))
        .clock(Arc::new(ManualClock::new(now)))
        .build()
        .unwrap();
    assert!(offline.verify_and_decode_transaction(&token).await.is_ok());
}

#[tokio::test]
async fn test_revoked_leaf_listed_in_crl() {
    let (chain, server) = chain_with_crl_server().await;
    serve_crl(&server, 200, chain.intermediate_crl(&[chain.leaf_serial])).await;

    let err = online_verifier(&chain)
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .unwrap_err();
    assert_eq!(
        err.certificate_error().map(|e| e.status()),
        Some(VerificationStatus::InvalidCertificate)
    );
}

#[tokio::test]
async fn test_crl_without_leaf_passes() {
    let (chain, server) = chain_with_crl_server().await;
    serve_crl(&server, 200, chain.intermediate_crl(&[chain.leaf_serial + 100])).await;

    assert!(online_verifier(&chain)
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_unreachable_crl_is_soft_failure() {
    let (chain, server) = chain_with_crl_server().await;
    serve_crl(&server, 503, Vec::new()).await;

    assert!(online_verifier(&chain)
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_garbage_crl_is_soft_failure() {
    let (chain, server) = chain_with_crl_server().await;
    serve_crl(&server, 200, b"definitely not DER".to_vec()).await;

    assert!(online_verifier(&chain)
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_crl_from_wrong_issuer_is_not_trusted() {
    let (chain, server) = chain_with_crl_server().await;
    let other = TestChain::new();
    serve_crl(&server, 200, other.intermediate_crl(&[chain.leaf_serial])).await;

    // The forged CRL cannot revoke; the soft-fail path lets it through.
    assert!(online_verifier(&chain)
        .verify_and_decode_transaction(&chain.sign(&transaction_payload("Sandbox")))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_crl_checker_sends_user_agent() {
    let (chain, server) = chain_with_crl_server().await;
    Mock::given(method("GET"))
        .and(path(CRL_PATH))
        .and(header(
            "user-agent",
            concat!("signed-data-verifier/", env!("CARGO_PKG_VERSION")),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(chain.intermediate_crl(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let checker = CrlRevocationChecker::new().unwrap();
    let status = checker.check(&chain.leaf, &chain.intermediate).await.unwrap();
    assert_eq!(status, RevocationStatus::Good);
}
