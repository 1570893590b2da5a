use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{LinkManagement, OrderStore, ReminderManagement, WebhookManagement},
};

/// The highest level of behaviour for storage backends of the payment-link engine.
#[allow(async_fn_in_trait)]
pub trait PaylinkDatabase: Clone + OrderStore + LinkManagement + WebhookManagement + ReminderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the connection pool. Mostly useful in tests.
    async fn close(&mut self) -> Result<(), PaymentGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Transaction reference {0} already exists")]
    DuplicateReference(String),
    #[error("No transaction exists with reference {0}")]
    TransactionNotFound(String),
    #[error("No payment link exists with reference {0}")]
    LinkNotFound(String),
    #[error("Illegal status change. {0}")]
    IllegalStatusChange(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
