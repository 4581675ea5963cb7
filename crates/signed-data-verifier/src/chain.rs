//! Certificate chain validation for the `x5c` header.
//!
//! The token carries `[leaf, intermediate, root]`. Only the leaf and the
//! intermediate are taken from the token; the path must end at one of the
//! pinned trust anchors supplied at construction.
//!
//! [`X509ChainVerifier`] is the uncached primitive. [`CachingChainValidator`]
//! puts the [`PublicKeyCache`] in front of any [`ChainVerifier`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256, Sha384};
use tracing::{debug, warn};
use x509_parser::prelude::*;

use crate::clock::Clock;
use crate::digest::chain_fingerprint;
use crate::error::CertificateError;
use crate::key_cache::PublicKeyCache;
use crate::revocation::{RevocationChecker, RevocationStatus};

/// ecdsa-with-SHA256
const OID_ECDSA_SHA256: &str = "1.2.840.10045.4.3.2";

/// ecdsa-with-SHA384
const OID_ECDSA_SHA384: &str = "1.2.840.10045.4.3.3";

/// Marker extension present on platform receipt-signing leaf certificates.
pub const LEAF_MARKER_OID: &str = "1.2.840.113635.100.6.11.1";

/// Marker extension present on the platform's signing intermediate.
pub const INTERMEDIATE_MARKER_OID: &str = "1.2.840.113635.100.6.2.1";

/// Extra constraints on the certificates in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPolicy {
    /// Extension OID the leaf must carry.
    pub leaf_marker_oid: Option<String>,

    /// Extension OID the intermediate must carry.
    pub intermediate_marker_oid: Option<String>,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            leaf_marker_oid: Some(LEAF_MARKER_OID.to_string()),
            intermediate_marker_oid: Some(INTERMEDIATE_MARKER_OID.to_string()),
        }
    }
}

impl ChainPolicy {
    /// No marker extensions required.
    pub fn without_markers() -> Self {
        Self {
            leaf_marker_oid: None,
            intermediate_marker_oid: None,
        }
    }
}

/// Validates a `(leaf, intermediate)` pair and yields the leaf signing key.
#[async_trait]
pub trait ChainVerifier: Send + Sync + fmt::Debug {
    /// Validate the chain as of `effective`.
    async fn verify_chain(
        &self,
        leaf: &[u8],
        intermediate: &[u8],
        effective: DateTime<Utc>,
    ) -> Result<p256::ecdsa::VerifyingKey, CertificateError>;
}

/// Chain verifier backed by `x509-parser` and RustCrypto ECDSA.
#[derive(Debug, Clone)]
pub struct X509ChainVerifier {
    /// Pinned roots (DER)
    trust_anchors: Arc<Vec<Vec<u8>>>,

    policy: ChainPolicy,

    /// Set when online checks are enabled
    revocation: Option<Arc<dyn RevocationChecker>>,

    /// Set when online checks are enabled; validity is also checked at its
    /// current time
    wall_clock: Option<Arc<dyn Clock>>,
}

/// Owned result of the offline part of validation.
struct TrustPath {
    leaf_key: p256::ecdsa::VerifyingKey,
    anchor_der: Vec<u8>,
}

impl X509ChainVerifier {
    /// Create a verifier over the given DER trust anchors.
    ///
    /// Every anchor must parse; an unparseable anchor is a configuration
    /// mistake and is reported immediately.
    pub fn new(trust_anchors: Vec<Vec<u8>>) -> Result<Self, CertificateError> {
        for (i, der) in trust_anchors.iter().enumerate() {
            parse_cert(der, "trust anchor").map_err(|e| {
                CertificateError::malformed(format!("trust anchor #{}: {}", i, e))
            })?;
        }

        Ok(Self {
            trust_anchors: Arc::new(trust_anchors),
            policy: ChainPolicy::default(),
            revocation: None,
            wall_clock: None,
        })
    }

    /// Replace the marker-extension policy.
    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable revocation checks through `checker`.
    pub fn with_revocation_checker(mut self, checker: Arc<dyn RevocationChecker>) -> Self {
        self.revocation = Some(checker);
        self
    }

    /// Also require every certificate to be valid at `clock`'s current time,
    /// in addition to the effective instant.
    pub fn with_wall_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.wall_clock = Some(clock);
        self
    }

    /// Number of pinned anchors.
    pub fn trust_anchor_count(&self) -> usize {
        self.trust_anchors.len()
    }

    /// Offline validation: issuance, validity windows, markers.
    fn build_path(
        &self,
        leaf_der: &[u8],
        intermediate_der: &[u8],
        effective: DateTime<Utc>,
    ) -> Result<TrustPath, CertificateError> {
        let leaf = parse_cert(leaf_der, "leaf")?;
        let intermediate = parse_cert(intermediate_der, "intermediate")?;

        if !intermediate.is_ca() {
            return Err(CertificateError::untrusted(
                "intermediate certificate is not a CA",
            ));
        }

        check_issued_by(&leaf, &intermediate)
            .map_err(|reason| CertificateError::untrusted(format!("leaf: {}", reason)))?;

        let anchor_der = self
            .trust_anchors
            .iter()
            .find(|anchor_der| {
                parse_cert(anchor_der, "trust anchor")
                    .map(|anchor| check_issued_by(&intermediate, &anchor).is_ok())
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                CertificateError::untrusted("intermediate is not issued by a trusted root")
            })?;
        let anchor = parse_cert(anchor_der, "trust anchor")?;

        let now = self.wall_clock.as_ref().map(|clock| clock.now());
        for (label, cert) in [
            ("leaf", &leaf),
            ("intermediate", &intermediate),
            ("root", &anchor),
        ] {
            check_validity(label, cert, effective)?;
            if let Some(now) = now {
                check_validity(label, cert, now)?;
            }
        }

        if let Some(oid) = &self.policy.leaf_marker_oid {
            require_extension("leaf", &leaf, oid)?;
        }
        if let Some(oid) = &self.policy.intermediate_marker_oid {
            require_extension("intermediate", &intermediate, oid)?;
        }

        let leaf_key = p256::ecdsa::VerifyingKey::from_public_key_der(leaf.public_key().raw)
            .map_err(|e| CertificateError::malformed(format!("leaf key is not P-256: {}", e)))?;

        Ok(TrustPath {
            leaf_key,
            anchor_der: anchor_der.clone(),
        })
    }

    async fn check_revocation(
        checker: &dyn RevocationChecker,
        label: &str,
        cert_der: &[u8],
        issuer_der: &[u8],
    ) -> Result<(), CertificateError> {
        match checker.check(cert_der, issuer_der).await {
            Ok(RevocationStatus::Revoked) => Err(CertificateError::invalid(format!(
                "{} certificate has been revoked",
                label
            ))),
            Ok(RevocationStatus::Good) => Ok(()),
            Ok(RevocationStatus::Unknown) => {
                debug!(certificate = label, "no revocation source for certificate");
                Ok(())
            }
            Err(e) => {
                warn!(
                    certificate = label,
                    error = %e,
                    "revocation status unavailable, continuing with offline result"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ChainVerifier for X509ChainVerifier {
    async fn verify_chain(
        &self,
        leaf: &[u8],
        intermediate: &[u8],
        effective: DateTime<Utc>,
    ) -> Result<p256::ecdsa::VerifyingKey, CertificateError> {
        let path = self.build_path(leaf, intermediate, effective)?;

        if let Some(checker) = &self.revocation {
            Self::check_revocation(checker.as_ref(), "leaf", leaf, intermediate).await?;
            Self::check_revocation(
                checker.as_ref(),
                "intermediate",
                intermediate,
                &path.anchor_der,
            )
            .await?;
        }

        Ok(path.leaf_key)
    }
}

/// Chain validator with a public-key cache in front of the primitive.
#[derive(Debug, Clone)]
pub struct CachingChainValidator {
    verifier: Arc<dyn ChainVerifier>,
    cache: PublicKeyCache,
}

impl CachingChainValidator {
    pub fn new(verifier: Arc<dyn ChainVerifier>, cache: PublicKeyCache) -> Self {
        Self { verifier, cache }
    }

    /// Validate the chain, consulting the cache first.
    ///
    /// A hit means the byte-identical chain was fully validated within the
    /// cache TTL; failures are never cached.
    pub async fn validate(
        &self,
        leaf: &[u8],
        intermediate: &[u8],
        effective: DateTime<Utc>,
    ) -> Result<p256::ecdsa::VerifyingKey, CertificateError> {
        let fingerprint = chain_fingerprint(leaf, intermediate);

        if let Some(key) = self.cache.get(&fingerprint).await {
            debug!(fingerprint = %fingerprint, "public key cache hit");
            return Ok(key);
        }

        debug!(fingerprint = %fingerprint, "public key cache miss, validating chain");
        let key = self
            .verifier
            .verify_chain(leaf, intermediate, effective)
            .await?;
        self.cache.insert(fingerprint, key.clone()).await;

        Ok(key)
    }

    /// The underlying cache.
    pub fn cache(&self) -> &PublicKeyCache {
        &self.cache
    }
}

fn parse_cert<'a>(der: &'a [u8], label: &str) -> Result<X509Certificate<'a>, CertificateError> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|e| CertificateError::malformed(format!("invalid {} DER: {}", label, e)))
}

/// Name chaining plus signature over the child's TBS bytes.
fn check_issued_by(child: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> Result<(), String> {
    if child.issuer().as_raw() != issuer.subject().as_raw() {
        return Err(format!(
            "issuer '{}' does not match subject '{}'",
            child.issuer(),
            issuer.subject()
        ));
    }

    verify_signed_bytes(
        issuer.public_key().raw,
        child.tbs_certificate.as_ref(),
        &child.signature_algorithm.algorithm.to_id_string(),
        &child.signature_value.data,
    )
}

fn check_validity(
    label: &str,
    cert: &X509Certificate<'_>,
    effective: DateTime<Utc>,
) -> Result<(), CertificateError> {
    let at = effective.timestamp();
    let validity = cert.validity();

    if at < validity.not_before.timestamp() {
        return Err(CertificateError::invalid(format!(
            "{} certificate not valid before {}",
            label, validity.not_before
        )));
    }
    if at > validity.not_after.timestamp() {
        return Err(CertificateError::invalid(format!(
            "{} certificate expired at {}",
            label, validity.not_after
        )));
    }

    Ok(())
}

fn require_extension(
    label: &str,
    cert: &X509Certificate<'_>,
    oid: &str,
) -> Result<(), CertificateError> {
    if cert
        .extensions()
        .iter()
        .any(|ext| ext.oid.to_id_string() == oid)
    {
        Ok(())
    } else {
        Err(CertificateError::invalid(format!(
            "{} certificate is missing marker extension {}",
            label, oid
        )))
    }
}

/// Verify an X.509-style ECDSA signature (DER-encoded) over `message`.
///
/// Supports SHA-256 and SHA-384 digests with P-256 or P-384 issuer keys.
pub(crate) fn verify_signed_bytes(
    issuer_spki_der: &[u8],
    message: &[u8],
    algorithm_oid: &str,
    signature: &[u8],
) -> Result<(), String> {
    let prehash: Vec<u8> = match algorithm_oid {
        OID_ECDSA_SHA256 => Sha256::digest(message).to_vec(),
        OID_ECDSA_SHA384 => Sha384::digest(message).to_vec(),
        other => return Err(format!("unsupported signature algorithm OID: {}", other)),
    };

    if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(issuer_spki_der) {
        let sig = p256::ecdsa::Signature::from_der(signature)
            .map_err(|e| format!("bad ECDSA signature bytes: {}", e))?;
        return key
            .verify_prehash(&prehash, &sig)
            .map_err(|_| "signature verification failed".to_string());
    }

    if let Ok(key) = p384::ecdsa::VerifyingKey::from_public_key_der(issuer_spki_der) {
        let sig = p384::ecdsa::Signature::from_der(signature)
            .map_err(|e| format!("bad ECDSA signature bytes: {}", e))?;
        return key
            .verify_prehash(&prehash, &sig)
            .map_err(|_| "signature verification failed".to_string());
    }

    Err("unsupported issuer key type".to_string())
}
