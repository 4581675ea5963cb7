//! Error types for signed data verification.

use crate::types::Environment;

/// Top-level outcome kinds reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationStatus {
    /// Malformed structure, undecodable payload or rejected shape.
    Failure,
    /// The header's `x5c` array did not hold exactly three certificates.
    InvalidChainLength,
    /// Chain of trust or signature check failed.
    VerificationFailure,
    /// A certificate was outside its validity window, revoked, or missing a
    /// required marker extension.
    InvalidCertificate,
    /// Bundle id or app id did not match the verifier configuration.
    InvalidAppIdentifier,
    /// Payload environment did not match the verifier configuration.
    InvalidEnvironment,
    /// The verifier could not be constructed.
    Config,
}

/// Verification errors.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The signed data could not be decoded or failed structural validation.
    #[error("failed to decode signed data: {cause}")]
    Failure {
        #[source]
        cause: DecodeError,
    },

    /// The certificate chain embedded in the header has the wrong length.
    #[error("invalid certificate chain length: expected 3, got {actual}")]
    InvalidChainLength { actual: usize },

    /// Chain or signature verification failed.
    #[error("verification failed: {cause}")]
    VerificationFailure {
        #[source]
        cause: CertificateError,
    },

    /// Bundle id or app id mismatch.
    #[error("app identifier mismatch: expected {expected}, got {actual}")]
    InvalidAppIdentifier { expected: String, actual: String },

    /// Environment mismatch.
    #[error("environment mismatch: expected {expected}, got {}", display_environment(.actual))]
    InvalidEnvironment {
        expected: Environment,
        actual: Option<Environment>,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

fn display_environment(environment: &Option<Environment>) -> String {
    environment
        .map(|e| e.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl VerificationError {
    /// Status kind for this error.
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::Failure { .. } => VerificationStatus::Failure,
            Self::InvalidChainLength { .. } => VerificationStatus::InvalidChainLength,
            Self::VerificationFailure { .. } => VerificationStatus::VerificationFailure,
            Self::InvalidAppIdentifier { .. } => VerificationStatus::InvalidAppIdentifier,
            Self::InvalidEnvironment { .. } => VerificationStatus::InvalidEnvironment,
            Self::Config { .. } => VerificationStatus::Config,
        }
    }

    /// Whether the data was well formed but failed a trust or identity check.
    ///
    /// Callers should treat these as possible forgery or misrouting rather
    /// than as transport noise.
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidChainLength { .. }
                | Self::VerificationFailure { .. }
                | Self::InvalidAppIdentifier { .. }
                | Self::InvalidEnvironment { .. }
        )
    }

    /// The underlying certificate error, if this is a verification failure.
    pub fn certificate_error(&self) -> Option<&CertificateError> {
        match self {
            Self::VerificationFailure { cause } => Some(cause),
            _ => None,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<DecodeError> for VerificationError {
    fn from(cause: DecodeError) -> Self {
        Self::Failure { cause }
    }
}

impl From<CertificateError> for VerificationError {
    fn from(cause: CertificateError) -> Self {
        Self::VerificationFailure { cause }
    }
}

/// Errors raised while decoding the compact signed structure.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Wrong number of `.`-separated segments.
    #[error("expected 3 segments, found {parts}")]
    Structure { parts: usize },

    /// A segment was not valid base64url.
    #[error("invalid base64 in {segment}: {source}")]
    Base64 {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A segment was not valid JSON.
    #[error("invalid JSON in {segment}: {source}")]
    Json {
        segment: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The structural validator rejected the payload.
    #[error("payload rejected by {shape} validator")]
    Rejected { shape: &'static str },

    /// The payload passed validation but did not match the typed model.
    #[error("payload does not match {shape}: {source}")]
    Shape {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by certificate chain and signature checks.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CertificateError {
    /// Certificate or key bytes could not be parsed.
    #[error("malformed certificate data: {reason}")]
    Malformed { reason: String },

    /// The chain does not lead to a trusted root.
    #[error("untrusted certificate chain: {reason}")]
    UntrustedChain { reason: String },

    /// A certificate is expired, not yet valid, revoked or missing a marker.
    #[error("invalid certificate: {reason}")]
    InvalidCertificate { reason: String },

    /// The payload signature did not verify.
    #[error("signature invalid: {reason}")]
    Signature { reason: String },
}

impl CertificateError {
    /// Status kind for this cause.
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::InvalidCertificate { .. } => VerificationStatus::InvalidCertificate,
            _ => VerificationStatus::VerificationFailure,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub(crate) fn untrusted(reason: impl Into<String>) -> Self {
        Self::UntrustedChain {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCertificate {
            reason: reason.into(),
        }
    }
}

/// Errors from a revocation source. Never surfaced by chain validation;
/// an unreachable source is logged and treated as a pass.
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    /// Network error fetching the revocation list.
    #[error("failed to fetch revocation list: {message}")]
    Network { message: String },

    /// The revocation list could not be parsed or authenticated.
    #[error("failed to parse revocation list: {message}")]
    Parse { message: String },
}

impl From<reqwest::Error> for RevocationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for verification operations.
pub type VerificationResult<T> = Result<T, VerificationError>;
