use chrono::{DateTime, Duration, Utc};
use plg_common::{Currency, MinorUnits};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db_types::{LinkStatus, Order, OrderId, PaymentLink, Transaction, TransactionStatus},
    validator::ValidationResult,
};

pub const DEFAULT_LINK_TTL_HOURS: i64 = 24;
pub const DEFAULT_REFERENCE_PREFIX: &str = "PLG";

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long a new link stays payable
    pub ttl: Duration,
    pub reference_prefix: String,
    /// Where the processor sends the customer after payment, unless the request names its own.
    pub callback_url: Option<String>,
    /// Channels offered to the customer. Empty means the processor's defaults.
    pub channels: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_LINK_TTL_HOURS),
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
            callback_url: None,
            channels: Vec::new(),
        }
    }
}

/// What to create a link for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkRequest {
    /// A link paying for an order in the order store.
    Order { order_id: OrderId },
    /// A free-standing link for an arbitrary amount, not tied to any order.
    Custom { amount: MinorUnits, currency: Currency, email: String, description: Option<String> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkOptions {
    pub callback_url: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    /// Merged into the link metadata
    pub metadata: Option<Value>,
    /// Overrides the configured TTL
    pub ttl_hours: Option<i64>,
}

/// The state of a link, merged with what the processor reports about its transaction.
#[derive(Debug, Clone, Serialize)]
pub struct LinkStatusReport {
    pub reference: String,
    pub order_id: OrderId,
    pub status: LinkStatus,
    pub transaction_status: TransactionStatus,
    pub amount: MinorUnits,
    pub currency: Currency,
    pub authorization_url: String,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    /// The processor's status for the transaction, if it could be reached.
    pub processor_status: Option<String>,
    pub verification_error: Option<String>,
}

impl LinkStatusReport {
    pub fn new(link: PaymentLink, transaction: &Transaction) -> Self {
        Self {
            reference: link.reference,
            order_id: link.order_id,
            status: link.status,
            transaction_status: transaction.status,
            amount: transaction.amount,
            currency: transaction.currency,
            authorization_url: link.authorization_url,
            expires_at: link.expires_at,
            paid_at: link.paid_at,
            processor_status: None,
            verification_error: None,
        }
    }
}

/// The outcome of applying a verified transaction.
#[derive(Debug, Clone)]
pub enum ConfirmationOutcome {
    /// The payment was applied. `order` is `None` for custom links.
    Confirmed { transaction: Transaction, order: Option<Order> },
    AlreadyConfirmed,
    /// The reference is not one of ours.
    UnknownReference,
    /// The confirmation failed validation and was not applied.
    Rejected(ValidationResult),
}

impl ConfirmationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationOutcome::Confirmed { .. })
    }
}
