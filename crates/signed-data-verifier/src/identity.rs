//! Identity checks applied after verification.
//!
//! One routine for every payload shape. Shapes differ only in what they
//! report through [`IdentityFields`].

use tracing::debug;

use crate::error::{VerificationError, VerificationResult};
use crate::payload::{AppAppleId, IdentityFields};
use crate::types::Environment;

/// Expected identity of the calling app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPolicy {
    pub bundle_id: String,
    pub environment: Environment,
    /// Only compared in [`Environment::Production`].
    pub app_apple_id: Option<i64>,
}

impl IdentityPolicy {
    pub fn new(
        bundle_id: impl Into<String>,
        environment: Environment,
        app_apple_id: Option<i64>,
    ) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            environment,
            app_apple_id,
        }
    }

    /// Check bundle id, then app id, then environment.
    pub fn enforce(&self, payload: &dyn IdentityFields) -> VerificationResult<()> {
        let bundle_id = payload.bundle_id();
        if bundle_id != Some(self.bundle_id.as_str()) {
            debug!(
                expected = %self.bundle_id,
                actual = ?bundle_id,
                "bundle id mismatch"
            );
            return Err(VerificationError::InvalidAppIdentifier {
                expected: self.bundle_id.clone(),
                actual: bundle_id.unwrap_or("none").to_string(),
            });
        }

        if self.environment == Environment::Production {
            if let AppAppleId::Claimed(actual) = payload.app_apple_id() {
                if actual != self.app_apple_id {
                    debug!(expected = ?self.app_apple_id, actual = ?actual, "app id mismatch");
                    return Err(VerificationError::InvalidAppIdentifier {
                        expected: display_app_id(self.app_apple_id),
                        actual: display_app_id(actual),
                    });
                }
            }
        }

        let environment = payload.environment();
        if environment != Some(self.environment) {
            return Err(VerificationError::InvalidEnvironment {
                expected: self.environment,
                actual: environment,
            });
        }

        Ok(())
    }
}

fn display_app_id(id: Option<i64>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string())
}
