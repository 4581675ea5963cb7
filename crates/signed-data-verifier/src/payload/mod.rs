//! Typed payload shapes and their default structural validators.
//!
//! Each shape exposes the fields the identity policy needs through
//! [`IdentityFields`], so the policy is written once for all of them.

mod app_transaction;
mod notification;
mod renewal;
mod transaction;

pub use app_transaction::{AppTransaction, APP_TRANSACTION_VALIDATOR};
pub use notification::{
    ExternalPurchaseToken, NotificationData, NotificationPayload, NotificationSummary,
    NOTIFICATION_VALIDATOR,
};
pub use renewal::{RenewalInfo, RENEWAL_INFO_VALIDATOR};
pub use transaction::{TransactionInfo, TRANSACTION_VALIDATOR};

use crate::types::Environment;

/// App id carried by a payload, as seen by the identity policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAppleId {
    /// The shape has no app id field; nothing to compare.
    NotApplicable,
    /// The shape has an app id field, possibly absent in this payload.
    Claimed(Option<i64>),
}

/// Identity fields of a decoded payload.
pub trait IdentityFields {
    fn bundle_id(&self) -> Option<&str>;

    fn environment(&self) -> Option<Environment>;

    fn app_apple_id(&self) -> AppAppleId {
        AppAppleId::NotApplicable
    }
}
