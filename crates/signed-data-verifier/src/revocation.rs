//! Certificate revocation checking.
//!
//! The default checker downloads the CRL named in a certificate's
//! distribution-point extension, authenticates it with the issuer key and
//! looks up the certificate serial. Callers of [`RevocationChecker`] treat an
//! `Err` as "status unknown", never as "revoked".

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::*;

use crate::chain::verify_signed_bytes;
use crate::error::RevocationError;

/// User agent for revocation list requests.
const USER_AGENT_VALUE: &str = concat!("signed-data-verifier/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Revocation state of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    /// Not listed by any consulted source.
    Good,
    /// Listed as revoked.
    Revoked,
    /// The certificate names no revocation source.
    Unknown,
}

/// Checks whether a certificate has been revoked by its issuer.
#[async_trait]
pub trait RevocationChecker: Send + Sync + std::fmt::Debug {
    /// Check `cert_der`, issued by `issuer_der`.
    async fn check(
        &self,
        cert_der: &[u8],
        issuer_der: &[u8],
    ) -> Result<RevocationStatus, RevocationError>;
}

/// An in-memory [`RevocationChecker`] keyed by issuer key and raw serial.
///
/// Serials are only unique per issuer, so an entry never matches a
/// certificate presented with a different issuer.
#[derive(Debug, Default)]
pub struct InMemoryRevocationList {
    revoked: HashSet<(Vec<u8>, Vec<u8>)>,
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the certificate in `cert_der`, issued by `issuer_der`, as revoked.
    pub fn revoke(&mut self, cert_der: &[u8], issuer_der: &[u8]) -> Result<(), RevocationError> {
        self.revoked.insert(revocation_key(cert_der, issuer_der)?);
        Ok(())
    }
}

#[async_trait]
impl RevocationChecker for InMemoryRevocationList {
    async fn check(
        &self,
        cert_der: &[u8],
        issuer_der: &[u8],
    ) -> Result<RevocationStatus, RevocationError> {
        if self.revoked.contains(&revocation_key(cert_der, issuer_der)?) {
            Ok(RevocationStatus::Revoked)
        } else {
            Ok(RevocationStatus::Good)
        }
    }
}

/// Revocation checker backed by HTTP CRL distribution points.
#[derive(Debug, Clone)]
pub struct CrlRevocationChecker {
    client: reqwest::Client,
}

impl CrlRevocationChecker {
    /// Create a checker with the default timeout.
    pub fn new() -> Result<Self, RevocationError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a checker with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, RevocationError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| RevocationError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    async fn fetch_crl(&self, url: &url::Url) -> Result<Vec<u8>, RevocationError> {
        debug!(url = %url, "fetching revocation list");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RevocationError::Network {
                message: format!("{} returned {}", url, status),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl RevocationChecker for CrlRevocationChecker {
    async fn check(
        &self,
        cert_der: &[u8],
        issuer_der: &[u8],
    ) -> Result<RevocationStatus, RevocationError> {
        let urls = crl_urls(cert_der)?;
        if urls.is_empty() {
            return Ok(RevocationStatus::Unknown);
        }

        let serial = raw_serial(cert_der)?;
        let mut last_error = None;

        for url in &urls {
            let crl_der = match self.fetch_crl(url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            return crl_lists_serial(&crl_der, issuer_der, &serial).map(|revoked| {
                if revoked {
                    RevocationStatus::Revoked
                } else {
                    RevocationStatus::Good
                }
            });
        }

        Err(last_error.unwrap_or_else(|| RevocationError::Network {
            message: "no reachable distribution point".to_string(),
        }))
    }
}

fn parse_cert(der: &[u8]) -> Result<X509Certificate<'_>, RevocationError> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|e| RevocationError::Parse {
            message: format!("invalid certificate DER: {}", e),
        })
}

fn raw_serial(cert_der: &[u8]) -> Result<Vec<u8>, RevocationError> {
    Ok(parse_cert(cert_der)?.raw_serial().to_vec())
}

/// Issuer public key and certificate serial.
fn revocation_key(
    cert_der: &[u8],
    issuer_der: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), RevocationError> {
    let issuer_key = parse_cert(issuer_der)?.public_key().raw.to_vec();
    Ok((issuer_key, raw_serial(cert_der)?))
}

/// HTTP(S) CRL URLs from the distribution-point extension.
fn crl_urls(cert_der: &[u8]) -> Result<Vec<url::Url>, RevocationError> {
    let cert = parse_cert(cert_der)?;
    let mut urls = Vec::new();

    for ext in cert.extensions() {
        let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() else {
            continue;
        };
        for point in &points.points {
            let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
                continue;
            };
            for name in names {
                if let GeneralName::URI(uri) = name {
                    match url::Url::parse(uri) {
                        Ok(url) if matches!(url.scheme(), "http" | "https") => urls.push(url),
                        _ => debug!(uri = %uri, "skipping unsupported distribution point"),
                    }
                }
            }
        }
    }

    Ok(urls)
}

/// Authenticate `crl_der` against the issuer and look up `serial`.
fn crl_lists_serial(
    crl_der: &[u8],
    issuer_der: &[u8],
    serial: &[u8],
) -> Result<bool, RevocationError> {
    let (_, crl) = CertificateRevocationList::from_der(crl_der).map_err(|e| RevocationError::Parse {
        message: format!("invalid CRL DER: {}", e),
    })?;
    let issuer = parse_cert(issuer_der)?;

    if crl.issuer().as_raw() != issuer.subject().as_raw() {
        return Err(RevocationError::Parse {
            message: "CRL issuer does not match certificate issuer".to_string(),
        });
    }

    verify_signed_bytes(
        issuer.public_key().raw,
        crl.tbs_cert_list.as_ref(),
        &crl.signature_algorithm.algorithm.to_id_string(),
        &crl.signature_value.data,
    )
    .map_err(|e| RevocationError::Parse {
        message: format!("CRL signature invalid: {}", e),
    })?;

    let listed = crl
        .iter_revoked_certificates()
        .any(|revoked| revoked.raw_serial() == serial);
    Ok(listed)
}
