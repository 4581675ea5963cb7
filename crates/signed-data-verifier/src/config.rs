//! Verifier configuration.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use x509_parser::pem::Pem;

use crate::error::{VerificationError, VerificationResult};
use crate::types::Environment;

/// Comma-separated paths to DER or PEM root certificates.
pub const ENV_ROOT_CERTS: &str = "SIGNED_DATA_ROOT_CERTS";
pub const ENV_ENVIRONMENT: &str = "SIGNED_DATA_ENVIRONMENT";
pub const ENV_BUNDLE_ID: &str = "SIGNED_DATA_BUNDLE_ID";
pub const ENV_APP_APPLE_ID: &str = "SIGNED_DATA_APP_APPLE_ID";
pub const ENV_ONLINE_CHECKS: &str = "SIGNED_DATA_ONLINE_CHECKS";

/// Configuration for a [`SignedDataVerifier`](crate::SignedDataVerifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierConfig {
    /// Pinned root certificates (DER). Serialized as standard base64.
    #[serde(default, with = "der_list")]
    pub trust_anchors: Vec<Vec<u8>>,

    /// Enable revocation and wall-clock expiry checks.
    #[serde(default)]
    pub online_checks: bool,

    /// Environment payloads must target.
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Expected bundle id.
    pub bundle_id: String,

    /// Expected app id. Required in production.
    #[serde(default)]
    pub app_apple_id: Option<i64>,
}

fn default_environment() -> Environment {
    Environment::Production
}

impl VerifierConfig {
    /// Create a config with no trust anchors and online checks off.
    pub fn new(bundle_id: impl Into<String>, environment: Environment) -> Self {
        Self {
            trust_anchors: Vec::new(),
            online_checks: false,
            environment,
            bundle_id: bundle_id.into(),
            app_apple_id: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `SIGNED_DATA_ROOT_CERTS` | Comma-separated DER/PEM root certificate paths |
    /// | `SIGNED_DATA_ENVIRONMENT` | `Production`, `Sandbox`, `Xcode` or `LocalTesting` (default: `Production`) |
    /// | `SIGNED_DATA_BUNDLE_ID` | Expected bundle id (required) |
    /// | `SIGNED_DATA_APP_APPLE_ID` | Expected app id (required in production) |
    /// | `SIGNED_DATA_ONLINE_CHECKS` | `1`/`true` enables revocation and wall-clock expiry checks |
    pub fn from_env() -> VerificationResult<Self> {
        let bundle_id = std::env::var(ENV_BUNDLE_ID)
            .map_err(|_| VerificationError::config(format!("{} is not set", ENV_BUNDLE_ID)))?;

        let environment = match std::env::var(ENV_ENVIRONMENT) {
            Ok(value) => value.parse::<Environment>().map_err(|e| {
                VerificationError::config(format!("{}: {}", ENV_ENVIRONMENT, e))
            })?,
            Err(_) => default_environment(),
        };

        let app_apple_id = match std::env::var(ENV_APP_APPLE_ID) {
            Ok(value) => Some(value.trim().parse::<i64>().map_err(|_| {
                VerificationError::config(format!(
                    "{} must be numeric, got '{}'",
                    ENV_APP_APPLE_ID, value
                ))
            })?),
            Err(_) => None,
        };

        let online_checks = std::env::var(ENV_ONLINE_CHECKS)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mut trust_anchors = Vec::new();
        if let Ok(paths) = std::env::var(ENV_ROOT_CERTS) {
            for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                trust_anchors.extend(load_certificates(path)?);
            }
        }

        Ok(Self {
            trust_anchors,
            online_checks,
            environment,
            bundle_id,
            app_apple_id,
        })
    }

    /// Add a DER trust anchor.
    pub fn with_trust_anchor(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.trust_anchors.push(der.into());
        self
    }

    /// Replace the trust anchors.
    pub fn with_trust_anchors(mut self, anchors: Vec<Vec<u8>>) -> Self {
        self.trust_anchors = anchors;
        self
    }

    /// Set the expected app id.
    pub fn with_app_apple_id(mut self, app_apple_id: i64) -> Self {
        self.app_apple_id = Some(app_apple_id);
        self
    }

    /// Enable or disable revocation and wall-clock expiry checks.
    pub fn with_online_checks(mut self, enabled: bool) -> Self {
        self.online_checks = enabled;
        self
    }

    /// Check the settings that do not depend on certificate contents.
    pub fn validate(&self) -> VerificationResult<()> {
        if self.bundle_id.is_empty() {
            return Err(VerificationError::config("bundle id must not be empty"));
        }
        if self.environment == Environment::Production && self.app_apple_id.is_none() {
            return Err(VerificationError::config(
                "app apple id is required for the Production environment",
            ));
        }
        if self.trust_anchors.is_empty() && !self.environment.bypasses_verification() {
            return Err(VerificationError::config(format!(
                "at least one trust anchor is required for the {} environment",
                self.environment
            )));
        }
        Ok(())
    }
}

/// Read the certificates in a DER or PEM file.
///
/// PEM files may hold several certificates; each becomes one anchor.
pub fn load_certificates(path: impl AsRef<Path>) -> VerificationResult<Vec<Vec<u8>>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        VerificationError::config(format!("failed to read {}: {}", path.display(), e))
    })?;

    if !bytes.starts_with(b"-----BEGIN") {
        return Ok(vec![bytes]);
    }

    let mut certificates = Vec::new();
    for pem in Pem::iter_from_buffer(&bytes) {
        let pem = pem.map_err(|e| {
            VerificationError::config(format!("invalid PEM in {}: {}", path.display(), e))
        })?;
        if pem.label == "CERTIFICATE" {
            certificates.push(pem.contents);
        }
    }

    if certificates.is_empty() {
        return Err(VerificationError::config(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certificates)
}

mod der_list {
    use super::*;

    pub fn serialize<S: Serializer>(
        anchors: &[Vec<u8>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = anchors.iter().map(|der| BASE64.encode(der)).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
