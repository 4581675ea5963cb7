use chrono::serde::ts_milliseconds_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IdentityFields;
use crate::types::Environment;
use crate::validator::{FieldKind, FieldRule, FieldValidator};

/// Decoded subscription renewal info.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_intent: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_renew_product_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    /// 1 when auto-renew is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_renew_status: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_in_billing_retry_period: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_increase_status: Option<i32>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub grace_period_expires_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_type: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_identifier: Option<String>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub signed_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub recent_subscription_start_date: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub renewal_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Renewal price in milliunits of `currency`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_price: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_discount_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligible_win_back_offer_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_account_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_period: Option<String>,
}

impl IdentityFields for RenewalInfo {
    fn bundle_id(&self) -> Option<&str> {
        self.bundle_id.as_deref()
    }

    fn environment(&self) -> Option<Environment> {
        self.environment
    }
}

const RULES: &[FieldRule] = &[
    FieldRule::new("bundleId", FieldKind::String),
    FieldRule::new("expirationIntent", FieldKind::Integer),
    FieldRule::new("originalTransactionId", FieldKind::String),
    FieldRule::new("autoRenewProductId", FieldKind::String),
    FieldRule::new("productId", FieldKind::String),
    FieldRule::new("autoRenewStatus", FieldKind::Integer),
    FieldRule::new("isInBillingRetryPeriod", FieldKind::Bool),
    FieldRule::new("priceIncreaseStatus", FieldKind::Integer),
    FieldRule::new("gracePeriodExpiresDate", FieldKind::Integer),
    FieldRule::new("offerType", FieldKind::Integer),
    FieldRule::new("offerIdentifier", FieldKind::String),
    FieldRule::new("signedDate", FieldKind::Integer),
    FieldRule::new("environment", FieldKind::Environment),
    FieldRule::new("recentSubscriptionStartDate", FieldKind::Integer),
    FieldRule::new("renewalDate", FieldKind::Integer),
    FieldRule::new("currency", FieldKind::String),
    FieldRule::new("renewalPrice", FieldKind::Integer),
    FieldRule::new("offerDiscountType", FieldKind::String),
    FieldRule::new("eligibleWinBackOfferIds", FieldKind::StringArray),
    FieldRule::new("appAccountToken", FieldKind::String),
    FieldRule::new("appTransactionId", FieldKind::String),
    FieldRule::new("offerPeriod", FieldKind::String),
];

/// Default structural validator for [`RenewalInfo`].
pub static RENEWAL_INFO_VALIDATOR: FieldValidator<RenewalInfo> =
    FieldValidator::new("renewal info", RULES);
