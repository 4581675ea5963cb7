use chrono::serde::ts_milliseconds_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppAppleId, IdentityFields};
use crate::types::Environment;
use crate::validator::{FieldKind, FieldRule, FieldValidator};

/// Prefix marking a sandbox external purchase id.
const SANDBOX_PURCHASE_PREFIX: &str = "SANDBOX";

/// Decoded server notification envelope.
///
/// At most one of `data`, `summary` and `external_purchase_token` is
/// expected. Identity is read from the first one present, in that order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    #[serde(
        rename = "notificationUUID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub notification_uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub signed_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<NotificationSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_purchase_token: Option<ExternalPurchaseToken>,
}

/// App metadata and signed payloads attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_apple_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    /// Nested signed transaction; verify it separately before use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_transaction_info: Option<String>,

    /// Nested signed renewal info; verify it separately before use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_renewal_info: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption_request_reason: Option<String>,
}

/// Summary attached to a renewal-extension notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_apple_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storefront_country_codes: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded_count: Option<i64>,
}

/// External purchase token attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPurchaseToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_purchase_id: Option<String>,

    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub token_creation_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_apple_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
}

impl ExternalPurchaseToken {
    /// The token has no environment field; sandbox ids carry a prefix.
    pub fn environment(&self) -> Environment {
        match &self.external_purchase_id {
            Some(id) if id.starts_with(SANDBOX_PURCHASE_PREFIX) => Environment::Sandbox,
            _ => Environment::Production,
        }
    }
}

/// Identity fields of whichever sub-object a notification carries.
struct Identity<'a> {
    bundle_id: Option<&'a str>,
    environment: Option<Environment>,
    app_apple_id: Option<i64>,
}

impl NotificationPayload {
    fn identity(&self) -> Identity<'_> {
        if let Some(data) = &self.data {
            Identity {
                bundle_id: data.bundle_id.as_deref(),
                environment: data.environment,
                app_apple_id: data.app_apple_id,
            }
        } else if let Some(summary) = &self.summary {
            Identity {
                bundle_id: summary.bundle_id.as_deref(),
                environment: summary.environment,
                app_apple_id: summary.app_apple_id,
            }
        } else if let Some(token) = &self.external_purchase_token {
            Identity {
                bundle_id: token.bundle_id.as_deref(),
                environment: Some(token.environment()),
                app_apple_id: token.app_apple_id,
            }
        } else {
            Identity {
                bundle_id: None,
                environment: None,
                app_apple_id: None,
            }
        }
    }
}

impl IdentityFields for NotificationPayload {
    fn bundle_id(&self) -> Option<&str> {
        self.identity().bundle_id
    }

    fn environment(&self) -> Option<Environment> {
        self.identity().environment
    }

    fn app_apple_id(&self) -> AppAppleId {
        AppAppleId::Claimed(self.identity().app_apple_id)
    }
}

const DATA_RULES: &[FieldRule] = &[
    FieldRule::new("appAppleId", FieldKind::Integer),
    FieldRule::new("bundleId", FieldKind::String),
    FieldRule::new("bundleVersion", FieldKind::String),
    FieldRule::new("environment", FieldKind::Environment),
    FieldRule::new("signedTransactionInfo", FieldKind::String),
    FieldRule::new("signedRenewalInfo", FieldKind::String),
    FieldRule::new("status", FieldKind::Integer),
    FieldRule::new("consumptionRequestReason", FieldKind::String),
];

const SUMMARY_RULES: &[FieldRule] = &[
    FieldRule::new("requestIdentifier", FieldKind::String),
    FieldRule::new("environment", FieldKind::Environment),
    FieldRule::new("appAppleId", FieldKind::Integer),
    FieldRule::new("bundleId", FieldKind::String),
    FieldRule::new("productId", FieldKind::String),
    FieldRule::new("storefrontCountryCodes", FieldKind::StringArray),
    FieldRule::new("failedCount", FieldKind::Integer),
    FieldRule::new("succeededCount", FieldKind::Integer),
];

const EXTERNAL_PURCHASE_TOKEN_RULES: &[FieldRule] = &[
    FieldRule::new("externalPurchaseId", FieldKind::String),
    FieldRule::new("tokenCreationDate", FieldKind::Integer),
    FieldRule::new("appAppleId", FieldKind::Integer),
    FieldRule::new("bundleId", FieldKind::String),
];

const RULES: &[FieldRule] = &[
    FieldRule::new("notificationType", FieldKind::String),
    FieldRule::new("subtype", FieldKind::String),
    FieldRule::new("notificationUUID", FieldKind::String),
    FieldRule::new("version", FieldKind::String),
    FieldRule::new("signedDate", FieldKind::Integer),
    FieldRule::new("data", FieldKind::Object(DATA_RULES)),
    FieldRule::new("summary", FieldKind::Object(SUMMARY_RULES)),
    FieldRule::new(
        "externalPurchaseToken",
        FieldKind::Object(EXTERNAL_PURCHASE_TOKEN_RULES),
    ),
];

/// Default structural validator for [`NotificationPayload`].
pub static NOTIFICATION_VALIDATOR: FieldValidator<NotificationPayload> =
    FieldValidator::new("notification", RULES);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validator;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> NotificationPayload {
        assert!(NOTIFICATION_VALIDATOR.validate(&value));
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_identity_from_data() {
        let n = decode(json!({
            "notificationType": "SUBSCRIBED",
            "notificationUUID": "002e14d5-51f5-4503-b5a8-c3a1af68eb20",
            "data": {"appAppleId": 41234, "bundleId": "com.example", "environment": "Sandbox"},
        }));
        assert_eq!(n.notification_uuid.as_deref(), Some("002e14d5-51f5-4503-b5a8-c3a1af68eb20"));
        assert_eq!(n.bundle_id(), Some("com.example"));
        assert_eq!(n.environment(), Some(Environment::Sandbox));
        assert_eq!(n.app_apple_id(), AppAppleId::Claimed(Some(41234)));
    }

    #[test]
    fn test_identity_from_summary() {
        let n = decode(json!({
            "summary": {"appAppleId": 7, "bundleId": "com.summary", "environment": "Production"},
        }));
        assert_eq!(n.bundle_id(), Some("com.summary"));
        assert_eq!(n.environment(), Some(Environment::Production));
        assert_eq!(n.app_apple_id(), AppAppleId::Claimed(Some(7)));
    }

    #[test]
    fn test_data_wins_over_summary() {
        let n = decode(json!({
            "data": {"bundleId": "com.data", "environment": "Sandbox"},
            "summary": {"bundleId": "com.summary", "environment": "Production"},
        }));
        assert_eq!(n.bundle_id(), Some("com.data"));
        assert_eq!(n.environment(), Some(Environment::Sandbox));
    }

    #[test]
    fn test_external_purchase_token_environment() {
        let sandbox = decode(json!({
            "externalPurchaseToken": {
                "externalPurchaseId": "SANDBOX_b2158121-7af9-49d4-9561-1f588205523e",
                "bundleId": "com.example",
                "appAppleId": 55555,
            },
        }));
        assert_eq!(sandbox.environment(), Some(Environment::Sandbox));
        assert_eq!(sandbox.bundle_id(), Some("com.example"));

        let production = decode(json!({
            "externalPurchaseToken": {"externalPurchaseId": "b2158121-7af9-49d4-9561-1f588205523e"},
        }));
        assert_eq!(production.environment(), Some(Environment::Production));
    }

    #[test]
    fn test_empty_notification_has_no_identity() {
        let n = decode(json!({"notificationType": "TEST"}));
        assert_eq!(n.bundle_id(), None);
        assert_eq!(n.environment(), None);
        assert_eq!(n.app_apple_id(), AppAppleId::Claimed(None));
    }

    #[test]
    fn test_validator_checks_nested_objects() {
        assert!(!NOTIFICATION_VALIDATOR.validate(&json!({"data": {"appAppleId": "x"}})));
        assert!(!NOTIFICATION_VALIDATOR.validate(&json!({"summary": "x"})));
    }
}
