//! Paystack API tools
//!
//! A thin client for the parts of the Paystack REST API the payment-link gateway needs:
//! * [`PaystackApi::initialize_transaction`] creates a processor-side transaction and returns the hosted checkout URL.
//! * [`PaystackApi::verify_transaction`] fetches the authoritative state of a transaction.
//! * [`verify_signature`] authenticates webhook deliveries.
//!
//! Every outbound call passes through a per-endpoint [`RateLimiter`], so a burst of activity fails fast with
//! [`PaystackApiError::RateLimited`] instead of being throttled by the processor.
mod api;
mod config;
mod data_objects;
mod error;
mod rate_limiter;
mod redact;
mod signature;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{
    Customer,
    InitializeTransactionRequest,
    InitializedTransaction,
    PaystackResponse,
    VerifiedTransaction,
};
pub use error::PaystackApiError;
pub use rate_limiter::RateLimiter;
pub use redact::redact_payload;
pub use signature::{sign_payload, verify_signature, SIGNATURE_HEADER};
