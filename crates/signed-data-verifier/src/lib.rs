//! Verification of platform-signed transaction, renewal, notification and
//! app-transaction data.
//!
//! This crate provides:
//!
//! - Compact three-part signed data decoding with an `x5c` certificate chain
//! - Chain validation against pinned roots, with validity windows and
//!   optional CRL revocation and wall-clock expiry checks
//! - ES256 payload signature verification
//! - A bounded, time-expiring cache of verified leaf keys
//! - Bundle id, app id and environment checks shared by all payload shapes
//!
//! # Quick Start
//!
//! ```no_run
//! use signed_data_verifier::{Environment, SignedDataVerifier, VerifierConfig};
//!
//! # async fn example(root_der: Vec<u8>, signed: &str) -> anyhow::Result<()> {
//! let config = VerifierConfig::new("com.example.app", Environment::Production)
//!     .with_trust_anchor(root_der)
//!     .with_app_apple_id(1234567890);
//! let verifier = SignedDataVerifier::new(config)?;
//!
//! let transaction = verifier.verify_and_decode_transaction(signed).await?;
//! println!("verified transaction {:?}", transaction.transaction_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Testing environments
//!
//! In `Xcode` and `LocalTesting` the chain and signature checks are skipped;
//! the typed entry points still enforce bundle id and environment.
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `SIGNED_DATA_ROOT_CERTS` | Comma-separated DER/PEM root certificate paths |
//! | `SIGNED_DATA_ENVIRONMENT` | `Production`, `Sandbox`, `Xcode`, `LocalTesting` (default: `Production`) |
//! | `SIGNED_DATA_BUNDLE_ID` | Expected bundle id |
//! | `SIGNED_DATA_APP_APPLE_ID` | Expected app id (required in production) |
//! | `SIGNED_DATA_ONLINE_CHECKS` | Enable revocation and wall-clock expiry checks (`1`/`true`) |

pub mod chain;
pub mod clock;
pub mod config;
mod digest;
pub mod error;
pub mod identity;
pub mod jws;
pub mod key_cache;
pub mod payload;
pub mod revocation;
pub mod types;
pub mod validator;
pub mod verifier;

// Re-export main types
pub use chain::{
    CachingChainValidator, ChainPolicy, ChainVerifier, X509ChainVerifier, INTERMEDIATE_MARKER_OID,
    LEAF_MARKER_OID,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_certificates, VerifierConfig};
pub use error::{
    CertificateError, DecodeError, RevocationError, VerificationError, VerificationResult,
    VerificationStatus,
};
pub use identity::IdentityPolicy;
pub use jws::{JwsHeader, SignedEnvelope};
pub use key_cache::{PublicKeyCache, CACHE_TTL_SECS, MAX_CACHE_SIZE};
pub use payload::{
    AppAppleId, AppTransaction, ExternalPurchaseToken, IdentityFields, NotificationData,
    NotificationPayload, NotificationSummary, RenewalInfo, TransactionInfo,
    APP_TRANSACTION_VALIDATOR, NOTIFICATION_VALIDATOR, RENEWAL_INFO_VALIDATOR,
    TRANSACTION_VALIDATOR,
};
pub use revocation::{
    CrlRevocationChecker, InMemoryRevocationList, RevocationChecker, RevocationStatus,
};
pub use types::Environment;
pub use validator::{FieldKind, FieldRule, FieldValidator, Validator};
pub use verifier::{SignedDataVerifier, SignedDataVerifierBuilder, EXPECTED_CHAIN_LENGTH};
