use chrono::serde::ts_milliseconds_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IdentityFields;
use crate::types::Environment;
use crate::validator::{FieldKind, FieldRule, FieldValidator};

/// A decoded signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_order_line_item_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_group_identifier: Option<String>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub purchase_date: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_purchase_date: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,

    /// Product type, e.g. `Auto-Renewable Subscription`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_account_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app_ownership_type: Option<String>,

    /// When the platform signed this payload; also the certificate
    /// validation instant.
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub signed_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_reason: Option<i32>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub revocation_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_upgraded: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_type: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storefront: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storefront_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Price in milliunits of `currency`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_discount_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_transaction_id: Option<String>,

    /// ISO 8601 duration of the applied offer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_period: Option<String>,
}

impl IdentityFields for TransactionInfo {
    fn bundle_id(&self) -> Option<&str> {
        self.bundle_id.as_deref()
    }

    fn environment(&self) -> Option<Environment> {
        self.environment
    }
}

const RULES: &[FieldRule] = &[
    FieldRule::new("originalTransactionId", FieldKind::String),
    FieldRule::new("transactionId", FieldKind::String),
    FieldRule::new("webOrderLineItemId", FieldKind::String),
    FieldRule::new("bundleId", FieldKind::String),
    FieldRule::new("productId", FieldKind::String),
    FieldRule::new("subscriptionGroupIdentifier", FieldKind::String),
    FieldRule::new("purchaseDate", FieldKind::Integer),
    FieldRule::new("originalPurchaseDate", FieldKind::Integer),
    FieldRule::new("expiresDate", FieldKind::Integer),
    FieldRule::new("quantity", FieldKind::Integer),
    FieldRule::new("type", FieldKind::String),
    FieldRule::new("appAccountToken", FieldKind::String),
    FieldRule::new("inAppOwnershipType", FieldKind::String),
    FieldRule::new("signedDate", FieldKind::Integer),
    FieldRule::new("revocationReason", FieldKind::Integer),
    FieldRule::new("revocationDate", FieldKind::Integer),
    FieldRule::new("isUpgraded", FieldKind::Bool),
    FieldRule::new("offerType", FieldKind::Integer),
    FieldRule::new("offerIdentifier", FieldKind::String),
    FieldRule::new("environment", FieldKind::Environment),
    FieldRule::new("storefront", FieldKind::String),
    FieldRule::new("storefrontId", FieldKind::String),
    FieldRule::new("transactionReason", FieldKind::String),
    FieldRule::new("currency", FieldKind::String),
    FieldRule::new("price", FieldKind::Integer),
    FieldRule::new("offerDiscountType", FieldKind::String),
    FieldRule::new("appTransactionId", FieldKind::String),
    FieldRule::new("offerPeriod", FieldKind::String),
];

/// Default structural validator for [`TransactionInfo`].
pub static TRANSACTION_VALIDATOR: FieldValidator<TransactionInfo> =
    FieldValidator::new("transaction", RULES);
