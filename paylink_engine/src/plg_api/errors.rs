use paystack_tools::PaystackApiError;
use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::PaymentGatewayError,
    validator::ValidationResult,
};

#[derive(Debug, Clone, Error)]
pub enum LinkError {
    #[error("The link request is invalid: {}", .0.messages().join("; "))]
    Validation(ValidationResult),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has already been paid")]
    OrderAlreadyPaid(OrderId),
    #[error("Order {0} is {1} and cannot be paid")]
    OrderNotPayable(OrderId, OrderStatusType),
    #[error("No payment link exists with reference {0}")]
    LinkNotFound(String),
    #[error("Payment link {0} has expired")]
    LinkExpired(String),
    #[error("Payment link {0} has already been paid")]
    LinkAlreadyPaid(String),
    #[error("Payment link {0} was cancelled")]
    LinkCancelled(String),
    #[error("Payment processor error. {0}")]
    Processor(#[from] PaystackApiError),
    #[error("Database error. {0}")]
    Database(#[from] PaymentGatewayError),
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("The webhook signature header is missing")]
    MissingSignature,
    #[error("The webhook signature is invalid")]
    InvalidSignature,
    #[error("The webhook payload could not be decoded. {0}")]
    Malformed(String),
    #[error("Event {0} is being processed by another worker")]
    InFlight(String),
    #[error("The handler for event {event_id} failed. {reason}")]
    HandlerFailed { event_id: String, reason: String },
    #[error("Database error. {0}")]
    Database(#[from] PaymentGatewayError),
}

#[derive(Debug, Clone, Error)]
pub enum ReminderError {
    #[error("Order {0} has no reminder #{1}")]
    ReminderNotFound(OrderId, i64),
    #[error("Reminder #{sequence} of order {order_id} is not addressed to {contact}")]
    ContactMismatch { order_id: OrderId, sequence: i64, contact: String },
    #[error("{0} is not a usable contact")]
    InvalidContact(String),
    #[error("Database error. {0}")]
    Database(#[from] PaymentGatewayError),
}
