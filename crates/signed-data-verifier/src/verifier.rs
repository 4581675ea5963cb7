//! The signed data verifier.
//!
//! Pipeline for every shape:
//! decode -> structural validation -> bypass? -> chain (cached) -> signature
//! -> identity policy (typed entry points only).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::chain::{CachingChainValidator, ChainPolicy, ChainVerifier, X509ChainVerifier};
use crate::clock::{Clock, SystemClock};
use crate::config::VerifierConfig;
use crate::error::{CertificateError, DecodeError, VerificationError, VerificationResult};
use crate::identity::IdentityPolicy;
use crate::jws::{JwsHeader, SignedEnvelope, ALGORITHM_ES256};
use crate::key_cache::PublicKeyCache;
use crate::payload::{
    AppTransaction, NotificationPayload, RenewalInfo, TransactionInfo, APP_TRANSACTION_VALIDATOR,
    NOTIFICATION_VALIDATOR, RENEWAL_INFO_VALIDATOR, TRANSACTION_VALIDATOR,
};
use crate::revocation::{CrlRevocationChecker, RevocationChecker};
use crate::types::Environment;
use crate::validator::Validator;

/// Number of certificates expected in the `x5c` header.
pub const EXPECTED_CHAIN_LENGTH: usize = 3;

/// Verifies and decodes signed data issued by the platform.
///
/// Cheap to share: wrap in an `Arc` and call from any number of tasks.
#[derive(Debug)]
pub struct SignedDataVerifier {
    environment: Environment,
    identity: IdentityPolicy,
    chain: CachingChainValidator,
    clock: Arc<dyn Clock>,
}

/// Builder for [`SignedDataVerifier`] with injectable collaborators.
#[derive(Debug)]
pub struct SignedDataVerifierBuilder {
    config: VerifierConfig,
    clock: Option<Arc<dyn Clock>>,
    policy: ChainPolicy,
    revocation: Option<Arc<dyn RevocationChecker>>,
    chain_verifier: Option<Arc<dyn ChainVerifier>>,
}

impl SignedDataVerifierBuilder {
    /// Use `clock` for cache expiry, the fallback validation instant and,
    /// with online checks enabled, the wall-clock expiry check.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Marker-extension policy for the default chain verifier.
    pub fn chain_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Revocation source used when online checks are enabled.
    ///
    /// Defaults to [`CrlRevocationChecker`].
    pub fn revocation_checker(mut self, checker: Arc<dyn RevocationChecker>) -> Self {
        self.revocation = Some(checker);
        self
    }

    /// Replace the chain verification primitive entirely.
    ///
    /// The trust anchors, policy and revocation settings of the config are
    /// then the verifier's own business.
    pub fn chain_verifier(mut self, verifier: Arc<dyn ChainVerifier>) -> Self {
        self.chain_verifier = Some(verifier);
        self
    }

    /// Validate the configuration and build the verifier.
    pub fn build(self) -> VerificationResult<SignedDataVerifier> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let chain_verifier: Arc<dyn ChainVerifier> = match self.chain_verifier {
            Some(verifier) => verifier,
            None => {
                let mut verifier = X509ChainVerifier::new(config.trust_anchors.clone())
                    .map_err(|e| VerificationError::config(e.to_string()))?
                    .with_policy(self.policy);

                if config.online_checks {
                    let checker: Arc<dyn RevocationChecker> = match self.revocation {
                        Some(checker) => checker,
                        None => Arc::new(
                            CrlRevocationChecker::new()
                                .map_err(|e| VerificationError::config(e.to_string()))?,
                        ),
                    };
                    verifier = verifier
                        .with_revocation_checker(checker)
                        .with_wall_clock(clock.clone());
                }

                Arc::new(verifier)
            }
        };

        debug!(
            environment = %config.environment,
            bundle_id = %config.bundle_id,
            trust_anchors = config.trust_anchors.len(),
            online_checks = config.online_checks,
            "created signed data verifier"
        );

        Ok(SignedDataVerifier {
            environment: config.environment,
            identity: IdentityPolicy::new(
                config.bundle_id,
                config.environment,
                config.app_apple_id,
            ),
            chain: CachingChainValidator::new(chain_verifier, PublicKeyCache::new(clock.clone())),
            clock,
        })
    }
}

impl SignedDataVerifier {
    /// Create a verifier with default collaborators.
    ///
    /// Fails immediately on an invalid configuration, e.g. production
    /// without an app id.
    pub fn new(config: VerifierConfig) -> VerificationResult<Self> {
        Self::builder(config).build()
    }

    /// Create a verifier from environment variables.
    pub fn from_env() -> VerificationResult<Self> {
        Self::new(VerifierConfig::from_env()?)
    }

    pub fn builder(config: VerifierConfig) -> SignedDataVerifierBuilder {
        SignedDataVerifierBuilder {
            config,
            clock: None,
            policy: ChainPolicy::default(),
            revocation: None,
            chain_verifier: None,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Cache of verified leaf keys.
    pub fn public_key_cache(&self) -> &PublicKeyCache {
        self.chain.cache()
    }

    /// Verify and decode a signed transaction.
    pub async fn verify_and_decode_transaction(
        &self,
        signed_transaction: &str,
    ) -> VerificationResult<TransactionInfo> {
        let transaction = self
            .verify(signed_transaction, &TRANSACTION_VALIDATOR, |t: &TransactionInfo| {
                t.signed_date
            })
            .await?;
        self.identity.enforce(&transaction)?;
        Ok(transaction)
    }

    /// Verify and decode signed subscription renewal info.
    pub async fn verify_and_decode_renewal_info(
        &self,
        signed_renewal_info: &str,
    ) -> VerificationResult<RenewalInfo> {
        let renewal = self
            .verify(signed_renewal_info, &RENEWAL_INFO_VALIDATOR, |r: &RenewalInfo| {
                r.signed_date
            })
            .await?;
        self.identity.enforce(&renewal)?;
        Ok(renewal)
    }

    /// Verify and decode a server notification envelope.
    ///
    /// Nested signed transactions in the notification are not verified;
    /// pass them to [`verify_and_decode_transaction`](Self::verify_and_decode_transaction).
    pub async fn verify_and_decode_notification(
        &self,
        signed_payload: &str,
    ) -> VerificationResult<NotificationPayload> {
        let notification = self
            .verify(
                signed_payload,
                &NOTIFICATION_VALIDATOR,
                |n: &NotificationPayload| n.signed_date,
            )
            .await?;
        self.identity.enforce(&notification)?;
        Ok(notification)
    }

    /// Verify and decode a signed app transaction.
    pub async fn verify_and_decode_app_transaction(
        &self,
        signed_app_transaction: &str,
    ) -> VerificationResult<AppTransaction> {
        let app_transaction = self
            .verify(
                signed_app_transaction,
                &APP_TRANSACTION_VALIDATOR,
                |a: &AppTransaction| a.receipt_creation_date,
            )
            .await?;
        self.identity.enforce(&app_transaction)?;
        Ok(app_transaction)
    }

    /// Generic verification without identity checks.
    ///
    /// In [`Environment::Xcode`] and [`Environment::LocalTesting`] the
    /// payload is returned unverified; callers must apply their own identity
    /// checks to the result.
    pub async fn verify<T, F>(
        &self,
        raw: &str,
        validator: &dyn Validator<T>,
        signed_date: F,
    ) -> VerificationResult<T>
    where
        T: DeserializeOwned + Send,
        F: Fn(&T) -> Option<DateTime<Utc>> + Send,
    {
        let envelope = SignedEnvelope::parse(raw)?;

        let shape = validator.shape();
        if !validator.validate(envelope.payload()) {
            debug!(shape, "payload rejected by structural validator");
            return Err(DecodeError::Rejected { shape }.into());
        }
        let payload = T::deserialize(envelope.payload())
            .map_err(|source| DecodeError::Shape { shape, source })?;

        if self.environment.bypasses_verification() {
            debug!(
                environment = %self.environment,
                shape,
                "skipping chain and signature verification"
            );
            return Ok(payload);
        }

        let header = envelope.header()?;
        if header.x5c.len() != EXPECTED_CHAIN_LENGTH {
            return Err(VerificationError::InvalidChainLength {
                actual: header.x5c.len(),
            });
        }
        let signature = envelope.signature()?;
        let chain = header.certificate_chain()?;

        let effective = signed_date(&payload).unwrap_or_else(|| self.clock.now());
        let key = self.chain.validate(&chain[0], &chain[1], effective).await?;

        verify_signature(&header, &envelope.signing_input(), &signature, &key)?;

        debug!(shape, "signed data verified");
        Ok(payload)
    }
}

/// ES256 check over the signing input. The signature is raw `r || s`.
fn verify_signature(
    header: &JwsHeader,
    signing_input: &[u8],
    signature: &[u8],
    key: &VerifyingKey,
) -> Result<(), CertificateError> {
    if header.alg != ALGORITHM_ES256 {
        return Err(CertificateError::Signature {
            reason: format!("unsupported algorithm '{}'", header.alg),
        });
    }

    let signature = Signature::from_slice(signature).map_err(|_| CertificateError::Signature {
        reason: format!("expected 64-byte signature, got {} bytes", signature.len()),
    })?;

    key.verify(signing_input, &signature)
        .map_err(|_| CertificateError::Signature {
            reason: "payload signature does not match leaf key".to_string(),
        })
}
