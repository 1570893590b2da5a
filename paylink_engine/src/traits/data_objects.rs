use serde::{Deserialize, Serialize};
use serde_json::Value;
use plg_common::MinorUnits;

use crate::db_types::{Order, OrderId, PaymentLink, Transaction, WebhookEvent};

/// The outcome of persisting a new link.
#[derive(Debug, Clone)]
pub enum InsertLinkResult {
    Inserted(PaymentLink),
    /// Another caller stored an active link for the same order first. That link is returned instead.
    ActiveLinkExists(PaymentLink),
}

impl InsertLinkResult {
    pub fn into_link(self) -> PaymentLink {
        match self {
            InsertLinkResult::Inserted(link) | InsertLinkResult::ActiveLinkExists(link) => link,
        }
    }
}

/// A verified payment to be applied atomically to the transaction, its link and its order.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub reference: String,
    pub order_id: OrderId,
    pub amount: MinorUnits,
    pub channel: Option<String>,
    pub raw_payload: Value,
}

#[derive(Debug, Clone)]
pub struct ConfirmationResult {
    pub transaction: Transaction,
    /// The order after the update. `None` for custom links.
    pub order: Option<Order>,
    /// False when the transaction had already been confirmed; nothing was changed in that case.
    pub newly_confirmed: bool,
}

/// The outcome of trying to claim a webhook event for processing.
#[derive(Debug, Clone)]
pub enum WebhookClaim {
    /// This caller owns the event and must mark it processed or rejected.
    Claimed(WebhookEvent),
    AlreadyProcessed(WebhookEvent),
    /// Another worker claimed it recently and has not finished yet.
    InFlight(WebhookEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message_id: String,
}
