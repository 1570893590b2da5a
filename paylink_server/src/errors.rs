use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use paylink_engine::{LinkError, PaymentGatewayError, ReminderError, WebhookError};
use paystack_tools::PaystackApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("A valid API key is required")]
    Unauthorized,
    #[error("Requests from this address are not accepted")]
    ForbiddenPeer,
    #[error("{0}")]
    Link(#[from] LinkError),
    #[error("{0}")]
    Webhook(#[from] WebhookError),
    #[error("{0}")]
    Reminder(#[from] ReminderError),
    #[error("{0}")]
    Database(#[from] PaymentGatewayError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ForbiddenPeer => StatusCode::FORBIDDEN,
            Self::Link(e) => link_status(e),
            Self::Webhook(e) => webhook_status(e),
            Self::Reminder(e) => match e {
                ReminderError::ReminderNotFound(_, _) => StatusCode::NOT_FOUND,
                ReminderError::ContactMismatch { .. } => StatusCode::CONFLICT,
                ReminderError::InvalidContact(_) => StatusCode::BAD_REQUEST,
                ReminderError::Database(e) => database_status(e),
            },
            Self::Database(e) => database_status(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn link_status(e: &LinkError) -> StatusCode {
    match e {
        LinkError::Validation(_) => StatusCode::BAD_REQUEST,
        LinkError::OrderNotFound(_) | LinkError::LinkNotFound(_) => StatusCode::NOT_FOUND,
        LinkError::OrderAlreadyPaid(_)
        | LinkError::OrderNotPayable(_, _)
        | LinkError::LinkAlreadyPaid(_)
        | LinkError::LinkCancelled(_) => StatusCode::CONFLICT,
        LinkError::LinkExpired(_) => StatusCode::GONE,
        LinkError::Processor(e) => match e {
            PaystackApiError::MissingCredentials => StatusCode::SERVICE_UNAVAILABLE,
            PaystackApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_GATEWAY,
        },
        LinkError::Database(e) => database_status(e),
    }
}

/// The processor only distinguishes 200 (done), 400 (malformed), 401 (not from us) and 500 (try again later).
fn webhook_status(e: &WebhookError) -> StatusCode {
    match e {
        WebhookError::MissingSignature | WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
        WebhookError::Malformed(_) => StatusCode::BAD_REQUEST,
        WebhookError::InFlight(_) | WebhookError::HandlerFailed { .. } | WebhookError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

fn database_status(e: &PaymentGatewayError) -> StatusCode {
    match e {
        PaymentGatewayError::OrderNotFound(_)
        | PaymentGatewayError::LinkNotFound(_)
        | PaymentGatewayError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        PaymentGatewayError::IllegalStatusChange(_) | PaymentGatewayError::DuplicateReference(_) => StatusCode::CONFLICT,
        PaymentGatewayError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
