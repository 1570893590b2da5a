use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use plg_common::{Currency, MinorUnits};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The merchant's order number. Links that are not tied to an order (custom links) use [`OrderId::CUSTOM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl OrderId {
    pub const CUSTOM: OrderId = OrderId(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_custom(&self) -> bool {
        self.0 == 0
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// Awaiting payment
    Pending,
    /// A confirmed payment covers the order total
    Paid,
    /// Voided by the merchant. No further payments or reminders.
    Cancelled,
    /// The customer disputed the charge with their bank
    Disputed,
    /// The payment was returned to the customer
    Refunded,
}

impl OrderStatusType {
    /// Paid and cancelled orders are done with: no new links, no reminders.
    pub fn is_settled(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
            OrderStatusType::Disputed => write!(f, "disputed"),
            OrderStatusType::Refunded => write!(f, "refunded"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            "disputed" => Ok(Self::Disputed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ConversionError::new("order status", s)),
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub total: MinorUnits,
    pub currency: Currency,
    pub billing_email: String,
    pub billing_phone: Option<String>,
    pub status: OrderStatusType,
    /// The reference of the transaction that paid for the order
    pub paid_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatusType::Paid
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatusType::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub id: OrderId,
    pub total: MinorUnits,
    pub currency: Currency,
    pub billing_email: String,
    pub billing_phone: Option<String>,
}

impl NewOrder {
    pub fn new(id: OrderId, total: MinorUnits, currency: Currency, billing_email: &str) -> Self {
        Self { id, total, currency, billing_email: billing_email.to_string(), billing_phone: None }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.billing_phone = Some(phone.to_string());
        self
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderNote {
    pub id: i64,
    pub order_id: OrderId,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   TransactionStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Initialized,
    Success,
    Failed,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Initialized => write!(f, "initialized"),
            TransactionStatus::Success => write!(f, "success"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------      Transaction      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub reference: String,
    pub order_id: OrderId,
    pub amount: MinorUnits,
    pub currency: Currency,
    pub email: String,
    pub status: TransactionStatus,
    pub channel: Option<String>,
    /// The last payload the processor sent us for this transaction
    pub raw_payload: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub order_id: OrderId,
    pub amount: MinorUnits,
    pub currency: Currency,
    pub email: String,
}

//--------------------------------------      LinkStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Paid,
    Expired,
    Cancelled,
}

impl LinkStatus {
    /// Links only ever move out of `Active`.
    pub fn can_transition_to(&self, next: LinkStatus) -> bool {
        matches!(self, LinkStatus::Active) && next != LinkStatus::Active
    }
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Active => write!(f, "active"),
            LinkStatus::Paid => write!(f, "paid"),
            LinkStatus::Expired => write!(f, "expired"),
            LinkStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

//--------------------------------------      PaymentLink      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentLink {
    pub id: i64,
    pub order_id: OrderId,
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
    pub status: LinkStatus,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentLink {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LinkStatus::Expired || (self.status == LinkStatus::Active && self.expires_at <= now)
    }

    /// Active and inside its lifetime.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LinkStatus::Active && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentLink {
    pub order_id: OrderId,
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------     WebhookStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    /// Claimed by a worker; the handler has not finished yet
    Received,
    Processed,
    /// The handler failed. A redelivery may claim the event again.
    Rejected,
}

impl Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookStatus::Received => write!(f, "received"),
            WebhookStatus::Processed => write!(f, "processed"),
            WebhookStatus::Rejected => write!(f, "rejected"),
        }
    }
}

//--------------------------------------     WebhookEvent      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEvent {
    pub id: i64,
    /// The dedup key
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub signature: String,
    pub status: WebhookStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub signature: String,
}

//--------------------------------------     ReminderType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    Gentle,
    Urgent,
    Final,
}

impl ReminderType {
    /// The first reminder is gentle and the last of a multi-step cascade is final. Everything in between is urgent.
    pub fn for_sequence(sequence: i64, cascade_length: i64) -> Self {
        if sequence <= 1 {
            ReminderType::Gentle
        } else if sequence >= cascade_length {
            ReminderType::Final
        } else {
            ReminderType::Urgent
        }
    }
}

impl Display for ReminderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderType::Gentle => write!(f, "gentle"),
            ReminderType::Urgent => write!(f, "urgent"),
            ReminderType::Final => write!(f, "final"),
        }
    }
}

//--------------------------------------    ReminderStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Scheduled,
    Sent,
    /// Delivery failed. If `next_attempt_at` is set, the reminder will be retried then; otherwise it is abandoned.
    Failed,
    Cancelled,
}

impl Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderStatus::Scheduled => write!(f, "scheduled"),
            ReminderStatus::Sent => write!(f, "sent"),
            ReminderStatus::Failed => write!(f, "failed"),
            ReminderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

//--------------------------------------   ReminderSchedule    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReminderSchedule {
    pub id: i64,
    pub order_id: OrderId,
    pub contact: String,
    pub sequence: i64,
    pub reminder_type: ReminderType,
    pub scheduled_for: DateTime<Utc>,
    pub status: ReminderStatus,
    pub retry_count: i64,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderSchedule {
    /// Scheduled, or failed with a retry still to come.
    pub fn is_pending(&self) -> bool {
        match self.status {
            ReminderStatus::Scheduled => true,
            ReminderStatus::Failed => self.next_attempt_at.is_some(),
            ReminderStatus::Sent | ReminderStatus::Cancelled => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub order_id: OrderId,
    pub contact: String,
    pub sequence: i64,
    pub reminder_type: ReminderType,
    pub scheduled_for: DateTime<Utc>,
}

//--------------------------------------        OptOut         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OptOut {
    pub contact: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
