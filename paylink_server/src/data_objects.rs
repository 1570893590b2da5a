use std::fmt::Display;

use paylink_engine::{
    db_types::{NewOrder, Order, OrderId, OrderNote, ReminderSchedule},
    helpers::{is_valid_email, normalize_contact},
    plg_api::link_objects::{LinkOptions, LinkRequest},
};
use plg_common::{Currency, MinorUnits};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// An order pushed in by the merchant. The total is given either in minor units (`total`) or as a display amount
/// (`amount`, e.g. `"5000.00"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub id: i64,
    #[serde(default)]
    pub total: Option<MinorUnits>,
    #[serde(default)]
    pub amount: Option<String>,
    pub currency: Currency,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl TryFrom<NewOrderRequest> for NewOrder {
    type Error = ServerError;

    fn try_from(req: NewOrderRequest) -> Result<Self, Self::Error> {
        let total = match (req.total, req.amount.as_deref()) {
            (Some(total), None) => total,
            (None, Some(amount)) => {
                req.currency.parse_amount(amount).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?
            },
            (Some(_), Some(_)) => {
                return Err(ServerError::InvalidRequestBody("Give either total or amount, not both".into()))
            },
            (None, None) => return Err(ServerError::InvalidRequestBody("The order total is missing".into())),
        };
        if !is_valid_email(&req.email) {
            return Err(ServerError::InvalidRequestBody(format!("{} is not a valid e-mail address", req.email)));
        }
        let mut order = NewOrder::new(OrderId(req.id), total, req.currency, &req.email);
        if let Some(phone) = req.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            if normalize_contact(phone).is_empty() {
                return Err(ServerError::InvalidRequestBody(format!("{phone} is not a valid phone number")));
            }
            order = order.with_phone(phone);
        }
        Ok(order)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRegistration {
    pub order: Order,
    pub created: bool,
    pub reminders: Vec<ReminderSchedule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub notes: Vec<OrderNote>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(flatten)]
    pub request: LinkRequest,
    #[serde(default)]
    pub options: LinkOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireReminderRequest {
    pub order_id: i64,
    pub contact: String,
    pub sequence: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptOutRequest {
    pub contact: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptOutResponse {
    pub contact: String,
    pub cancelled_reminders: u64,
}
