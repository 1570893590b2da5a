//! Typed webhook payloads.
//!
//! Paystack wraps every callback in `{"event": "...", "data": {...}}`. The envelope is decoded first, then `data` is
//! decoded into the type for that event, so every event the engine acts on is handled by exactly one match arm.
use paystack_tools::Customer;
use plg_common::MinorUnits;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plg_api::errors::WebhookError;

pub const CHARGE_SUCCESS: &str = "charge.success";
pub const CHARGE_FAILED: &str = "charge.failed";
pub const DISPUTE_CREATED: &str = "charge.dispute.create";
pub const REFUND_PROCESSED: &str = "refund.processed";

#[derive(Debug, Clone, Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeData {
    pub id: Option<i64>,
    pub reference: String,
    pub amount: MinorUnits,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputedTransaction {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeData {
    pub id: Option<i64>,
    pub transaction: DisputedTransaction,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundData {
    #[serde(default)]
    pub id: Option<i64>,
    pub transaction_reference: String,
    /// Paystack sends refund amounts as strings on some integrations and numbers on others.
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PaystackEvent {
    ChargeSuccess(ChargeData),
    ChargeFailed(ChargeData),
    DisputeCreated(DisputeData),
    RefundProcessed(RefundData),
    Unknown { event: String, data: Value },
}

impl PaystackEvent {
    /// Decodes the raw request body.
    pub fn decode(body: &[u8]) -> Result<Self, WebhookError> {
        let raw: RawEvent = serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))?;
        let malformed = |e: serde_json::Error| WebhookError::Malformed(format!("{} payload: {e}", raw.event));
        let event = match raw.event.as_str() {
            CHARGE_SUCCESS => Self::ChargeSuccess(serde_json::from_value(raw.data.clone()).map_err(malformed)?),
            CHARGE_FAILED => Self::ChargeFailed(serde_json::from_value(raw.data.clone()).map_err(malformed)?),
            DISPUTE_CREATED => Self::DisputeCreated(serde_json::from_value(raw.data.clone()).map_err(malformed)?),
            REFUND_PROCESSED => Self::RefundProcessed(serde_json::from_value(raw.data.clone()).map_err(malformed)?),
            _ => Self::Unknown { event: raw.event.clone(), data: raw.data.clone() },
        };
        Ok(event)
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::ChargeSuccess(_) => CHARGE_SUCCESS,
            Self::ChargeFailed(_) => CHARGE_FAILED,
            Self::DisputeCreated(_) => DISPUTE_CREATED,
            Self::RefundProcessed(_) => REFUND_PROCESSED,
            Self::Unknown { event, .. } => event.as_str(),
        }
    }

    /// The transaction reference the event is about, if it names one.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::ChargeSuccess(d) | Self::ChargeFailed(d) => Some(d.reference.as_str()),
            Self::DisputeCreated(d) => Some(d.transaction.reference.as_str()),
            Self::RefundProcessed(d) => Some(d.transaction_reference.as_str()),
            Self::Unknown { data, .. } => data.get("reference").and_then(Value::as_str),
        }
    }

    fn processor_id(&self) -> Option<String> {
        match self {
            Self::ChargeSuccess(d) | Self::ChargeFailed(d) => d.id.map(|id| id.to_string()),
            Self::DisputeCreated(d) => d.id.map(|id| id.to_string()),
            Self::RefundProcessed(d) => d.id.map(|id| id.to_string()),
            Self::Unknown { data, .. } => match data.get("id") {
                Some(Value::Number(n)) => Some(n.to_string()),
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            },
        }
    }

    /// The dedup key: `"{event}:{data.id}"`, falling back to the reference when the processor omits the id.
    pub fn event_id(&self) -> Option<String> {
        let key = self.processor_id().or_else(|| self.reference().filter(|r| !r.is_empty()).map(String::from))?;
        Some(format!("{}:{key}", self.event_type()))
    }
}

/// How an accepted delivery was handled. Every variant is acknowledged with a 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    Processed,
    /// The event identity was already processed. Nothing was done.
    Duplicate,
    /// The event type is not one the engine acts on.
    Ignored,
}
