use chrono::{DateTime, Utc};
use plg_common::{Currency, MinorUnits};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope Paystack wraps around every response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackResponse<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeTransactionRequest {
    pub email: String,
    /// Amount in minor units (kobo for NGN).
    pub amount: MinorUnits,
    pub currency: Currency,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub channels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Paystack's view of a transaction as returned by `/transaction/verify/{reference}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedTransaction {
    pub id: i64,
    /// `success`, `failed`, `abandoned`, `ongoing`, `pending`, `reversed`...
    pub status: String,
    pub reference: String,
    pub amount: MinorUnits,
    /// Kept as a string so an unexpected currency surfaces as a validation failure rather than a decode error.
    pub currency: String,
    pub channel: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_response: Option<String>,
    pub customer: Option<Customer>,
    #[serde(default)]
    pub metadata: Value,
}

impl VerifiedTransaction {
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_verify_response() {
        let body = r#"{
          "status": true,
          "message": "Verification successful",
          "data": {
            "id": 4099260516,
            "domain": "test",
            "status": "success",
            "reference": "PLG_42_1718000000_ab12cd34",
            "amount": 500000,
            "gateway_response": "Successful",
            "paid_at": "2024-06-10T09:33:20.000Z",
            "channel": "card",
            "currency": "NGN",
            "metadata": { "order_id": 42 },
            "customer": { "id": 1, "email": "ada@example.com", "phone": null }
          }
        }"#;
        let resp: PaystackResponse<VerifiedTransaction> = serde_json::from_str(body).unwrap();
        let tx = resp.data.unwrap();
        assert!(tx.is_successful());
        assert_eq!(tx.amount, MinorUnits::from(500_000));
        assert_eq!(tx.currency, "NGN");
        assert_eq!(tx.metadata["order_id"], 42);
        assert_eq!(tx.customer.unwrap().email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn initialize_request_omits_empty_fields() {
        let req = InitializeTransactionRequest {
            email: "ada@example.com".into(),
            amount: MinorUnits::from(500_000),
            currency: Currency::Ngn,
            reference: "PLG_1".into(),
            callback_url: None,
            channels: vec![],
            metadata: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"email": "ada@example.com", "amount": 500000, "currency": "NGN", "reference": "PLG_1"}));
    }
}
