use chrono::serde::ts_milliseconds_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppAppleId, IdentityFields};
use crate::types::Environment;
use crate::validator::{FieldKind, FieldRule, FieldValidator};

/// Decoded app transaction (app-install attestation).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTransaction {
    /// Environment the receipt was issued in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_type: Option<Environment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_apple_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_external_identifier: Option<i64>,

    /// Signing instant of the receipt.
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub receipt_creation_date: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_purchase_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_application_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_verification: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_verification_nonce: Option<String>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub preorder_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_platform: Option<String>,
}

impl IdentityFields for AppTransaction {
    fn bundle_id(&self) -> Option<&str> {
        self.bundle_id.as_deref()
    }

    fn environment(&self) -> Option<Environment> {
        self.receipt_type
    }

    fn app_apple_id(&self) -> AppAppleId {
        AppAppleId::Claimed(self.app_apple_id)
    }
}

const RULES: &[FieldRule] = &[
    FieldRule::new("receiptType", FieldKind::Environment),
    FieldRule::new("appAppleId", FieldKind::Integer),
    FieldRule::new("bundleId", FieldKind::String),
    FieldRule::new("applicationVersion", FieldKind::String),
    FieldRule::new("versionExternalIdentifier", FieldKind::Integer),
    FieldRule::new("receiptCreationDate", FieldKind::Integer),
    FieldRule::new("originalPurchaseDate", FieldKind::Integer),
    FieldRule::new("originalApplicationVersion", FieldKind::String),
    FieldRule::new("deviceVerification", FieldKind::String),
    FieldRule::new("deviceVerificationNonce", FieldKind::String),
    FieldRule::new("preorderDate", FieldKind::Integer),
    FieldRule::new("appTransactionId", FieldKind::String),
    FieldRule::new("originalPlatform", FieldKind::String),
];

/// Default structural validator for [`AppTransaction`].
pub static APP_TRANSACTION_VALIDATOR: FieldValidator<AppTransaction> =
    FieldValidator::new("app transaction", RULES);
