use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaystackApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("No Paystack secret key has been configured")]
    MissingCredentials,
    #[error("Rate limit reached for {endpoint}. Try again later.")]
    RateLimited { endpoint: String },
    #[error("Could not reach Paystack: {0}")]
    TransportError(String),
    #[error("Paystack returned error {status}. {message}")]
    HttpError { status: u16, message: String },
    #[error("Could not deserialize Paystack response: {0}")]
    DecodeError(String),
}

impl PaystackApiError {
    /// Whether retrying the same idempotent request has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            PaystackApiError::TransportError(_) => true,
            PaystackApiError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
