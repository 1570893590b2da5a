use chrono::{DateTime, Utc};
use plg_common::MinorUnits;
use serde_json::Value;

use crate::{
    db_types::{NewPaymentLink, NewTransaction, OrderId, PaymentLink, Transaction},
    traits::{ConfirmationResult, InsertLinkResult, PaymentConfirmation, PaymentGatewayError},
};

/// Persistence for transactions and the payment links that wrap them.
#[allow(async_fn_in_trait)]
pub trait LinkManagement {
    async fn reference_exists(&self, reference: &str) -> Result<bool, PaymentGatewayError>;

    /// The order's active link, if it has one that has not yet reached its expiry time.
    async fn fetch_usable_link_for_order(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentLink>, PaymentGatewayError>;

    /// Atomically stores the transaction and its link. Any active link of the same order that has passed its expiry
    /// time is expired first. If a usable link for the order already exists, nothing is written and that link is
    /// returned.
    async fn insert_link(
        &self,
        transaction: NewTransaction,
        link: NewPaymentLink,
    ) -> Result<InsertLinkResult, PaymentGatewayError>;

    async fn fetch_link(&self, reference: &str) -> Result<Option<PaymentLink>, PaymentGatewayError>;

    async fn fetch_links_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentLink>, PaymentGatewayError>;

    async fn fetch_transaction(&self, reference: &str) -> Result<Option<Transaction>, PaymentGatewayError>;

    /// Moves an active link to expired. Returns false if the link was not active.
    async fn expire_link(&self, reference: &str) -> Result<bool, PaymentGatewayError>;

    /// Expires every active link whose expiry time is at or before `now`, returning them.
    async fn expire_stale_links(&self, now: DateTime<Utc>) -> Result<Vec<PaymentLink>, PaymentGatewayError>;

    /// Cancels every active link of the order. Returns the number of links cancelled.
    async fn cancel_links_for_order(&self, order_id: OrderId) -> Result<u64, PaymentGatewayError>;

    /// Applies a verified payment in one database transaction: the transaction becomes `success`, an active link
    /// becomes `paid`, and a pending order becomes `paid` with a note. Confirming an already successful transaction
    /// changes nothing.
    async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ConfirmationResult, PaymentGatewayError>;

    /// Marks an initialized transaction as failed. Returns false if it was not in the initialized state.
    async fn fail_transaction(&self, reference: &str, raw_payload: Value) -> Result<bool, PaymentGatewayError>;

    /// The sum of all successful transactions for the order.
    async fn confirmed_total_for_order(&self, order_id: OrderId) -> Result<MinorUnits, PaymentGatewayError>;
}
