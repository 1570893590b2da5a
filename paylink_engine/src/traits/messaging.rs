use thiserror::Error;

use crate::traits::MessageReceipt;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagingError {
    #[error("The messaging channel is not configured")]
    Unavailable,
    #[error("Message delivery timed out")]
    Timeout,
    #[error("The messaging channel rejected the message: {0}")]
    Rejected(String),
    #[error("Could not reach the messaging channel: {0}")]
    Transport(String),
}

/// The channel reminders go out on.
#[allow(async_fn_in_trait)]
pub trait MessagingChannel {
    async fn send_message(&self, contact: &str, text: &str) -> Result<MessageReceipt, MessagingError>;
}
