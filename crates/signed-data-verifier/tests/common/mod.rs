//! Shared helpers: certificate chains built with rcgen and ES256 tokens
//! signed with the leaf key.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use rcgen::{
    date_time_ymd, BasicConstraints, CertificateParams, CertificateRevocationListParams,
    CrlDistributionPoint, CustomExtension, DistinguishedName, DnType, IsCa, KeyIdMethod, KeyPair,
    KeyUsagePurpose, RevocationReason, RevokedCertParams, SerialNumber,
};
use serde_json::{json, Value};
use signed_data_verifier::{
    CertificateError, ChainVerifier, Environment, SignedDataVerifier, VerifierConfig,
    X509ChainVerifier,
};

pub const BUNDLE_ID: &str = "com.example";
pub const APP_APPLE_ID: i64 = 1234;

/// 2025-01-01T00:00:00Z in epoch milliseconds.
pub const SIGNED_DATE_MS: i64 = 1_735_689_600_000;

const LEAF_MARKER: &[u64] = &[1, 2, 840, 113635, 100, 6, 11, 1];
const INTERMEDIATE_MARKER: &[u64] = &[1, 2, 840, 113635, 100, 6, 2, 1];

pub fn signed_date() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(SIGNED_DATE_MS).unwrap()
}

/// Knobs for [`TestChain::build`].
#[derive(Debug, Clone)]
pub struct ChainOptions {
    /// Leaf validity as `(not_before_year, not_after_year)`.
    pub leaf_years: (i32, i32),
    pub leaf_marker: bool,
    pub intermediate_marker: bool,
    /// CRL distribution point for the leaf.
    pub leaf_crl_url: Option<String>,
    pub leaf_serial: u64,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            leaf_years: (2020, 2040),
            leaf_marker: true,
            intermediate_marker: true,
            leaf_crl_url: None,
            leaf_serial: 3,
        }
    }
}

/// A root -> intermediate -> leaf chain.
pub struct TestChain {
    pub root: Vec<u8>,
    pub intermediate: Vec<u8>,
    pub leaf: Vec<u8>,
    pub leaf_key: SigningKey,
    pub leaf_serial: u64,
    intermediate_cert: rcgen::Certificate,
    intermediate_key: KeyPair,
}

fn ca_params(common_name: &str, serial: u64) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(2040, 1, 1);
    params.serial_number = Some(SerialNumber::from(serial));
    params
}

fn marker(oid: &[u64]) -> CustomExtension {
    // DER NULL
    CustomExtension::from_oid_content(oid, vec![0x05, 0x00])
}

impl TestChain {
    pub fn new() -> Self {
        Self::build(ChainOptions::default())
    }

    pub fn build(options: ChainOptions) -> Self {
        let root_key = KeyPair::generate().unwrap();
        let root_cert = ca_params("Test Root CA", 1).self_signed(&root_key).unwrap();

        let intermediate_key = KeyPair::generate().unwrap();
        let mut intermediate_params = ca_params("Test Intermediate CA", 2);
        if options.intermediate_marker {
            intermediate_params.custom_extensions = vec![marker(INTERMEDIATE_MARKER)];
        }
        let intermediate_cert = intermediate_params
            .signed_by(&intermediate_key, &root_cert, &root_key)
            .unwrap();

        let leaf_key_pair = KeyPair::generate().unwrap();
        let mut leaf_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, "Test Signing Leaf");
        leaf_params.distinguished_name = name;
        leaf_params.is_ca = IsCa::ExplicitNoCa;
        leaf_params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        leaf_params.not_before = date_time_ymd(options.leaf_years.0, 1, 1);
        leaf_params.not_after = date_time_ymd(options.leaf_years.1, 1, 1);
        leaf_params.serial_number = Some(SerialNumber::from(options.leaf_serial));
        if options.leaf_marker {
            leaf_params.custom_extensions = vec![marker(LEAF_MARKER)];
        }
        if let Some(url) = &options.leaf_crl_url {
            leaf_params.crl_distribution_points = vec![CrlDistributionPoint {
                uris: vec![url.clone()],
            }];
        }
        let leaf_cert = leaf_params
            .signed_by(&leaf_key_pair, &intermediate_cert, &intermediate_key)
            .unwrap();

        let leaf_key = SigningKey::from_pkcs8_der(&leaf_key_pair.serialize_der()).unwrap();

        Self {
            root: root_cert.der().to_vec(),
            intermediate: intermediate_cert.der().to_vec(),
            leaf: leaf_cert.der().to_vec(),
            leaf_key,
            leaf_serial: options.leaf_serial,
            intermediate_cert,
            intermediate_key,
        }
    }

    /// `x5c` entries as standard base64.
    pub fn x5c(&self) -> Vec<String> {
        [&self.leaf, &self.intermediate, &self.root]
            .iter()
            .map(|der| STANDARD.encode(der))
            .collect()
    }

    /// Sign `payload` with a full three-certificate header.
    pub fn sign(&self, payload: &Value) -> String {
        self.sign_with_header(&json!({"alg": "ES256", "x5c": self.x5c()}), payload)
    }

    /// Sign `payload` under an arbitrary header.
    pub fn sign_with_header(&self, header: &Value, payload: &Value) -> String {
        let signing_input = format!("{}.{}", encode_json(header), encode_json(payload));
        let signature: Signature = self.leaf_key.sign(signing_input.as_bytes());
        format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    /// DER CRL issued by the intermediate listing `revoked` serials.
    pub fn intermediate_crl(&self, revoked: &[u64]) -> Vec<u8> {
        let params = CertificateRevocationListParams {
            this_update: date_time_ymd(2024, 1, 1),
            next_update: date_time_ymd(2040, 1, 1),
            crl_number: SerialNumber::from(1u64),
            issuing_distribution_point: None,
            revoked_certs: revoked
                .iter()
                .map(|serial| RevokedCertParams {
                    serial_number: SerialNumber::from(*serial),
                    revocation_time: date_time_ymd(2024, 6, 1),
                    reason_code: Some(RevocationReason::KeyCompromise),
                    invalidity_date: None,
                })
                .collect(),
            key_identifier_method: KeyIdMethod::Sha256,
        };
        params
            .signed_by(&self.intermediate_cert, &self.intermediate_key)
            .unwrap()
            .der()
            .to_vec()
    }
}

pub fn encode_json(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
}

/// Token with a syntactically valid but meaningless signature and no chain.
pub fn unsigned_token(payload: &Value) -> String {
    format!(
        "{}.{}.{}",
        encode_json(&json!({"alg": "ES256"})),
        encode_json(payload),
        URL_SAFE_NO_PAD.encode(b"not a signature")
    )
}

pub fn transaction_payload(environment: &str) -> Value {
    json!({
        "transactionId": "2000000000000001",
        "originalTransactionId": "2000000000000000",
        "bundleId": BUNDLE_ID,
        "productId": "com.example.monthly",
        "type": "Auto-Renewable Subscription",
        "purchaseDate": SIGNED_DATE_MS - 60_000,
        "signedDate": SIGNED_DATE_MS,
        "environment": environment,
    })
}

pub fn sandbox_config(chain: &TestChain) -> VerifierConfig {
    VerifierConfig::new(BUNDLE_ID, Environment::Sandbox).with_trust_anchor(chain.root.clone())
}

pub fn production_config(chain: &TestChain) -> VerifierConfig {
    VerifierConfig::new(BUNDLE_ID, Environment::Production)
        .with_trust_anchor(chain.root.clone())
        .with_app_apple_id(APP_APPLE_ID)
}

pub fn sandbox_verifier(chain: &TestChain) -> SignedDataVerifier {
    SignedDataVerifier::new(sandbox_config(chain)).unwrap()
}

/// Chain verifier that counts calls to the wrapped primitive.
#[derive(Debug)]
pub struct CountingChainVerifier {
    inner: X509ChainVerifier,
    calls: AtomicUsize,
}

impl CountingChainVerifier {
    pub fn new(trust_anchors: Vec<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            inner: X509ChainVerifier::new(trust_anchors).unwrap(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainVerifier for CountingChainVerifier {
    async fn verify_chain(
        &self,
        leaf: &[u8],
        intermediate: &[u8],
        effective: DateTime<Utc>,
    ) -> Result<p256::ecdsa::VerifyingKey, CertificateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_chain(leaf, intermediate, effective).await
    }
}
