//! # Paylink server
//! The HTTP front end of the payment-link gateway. It is responsible for:
//! * Accepting orders from the merchant and handing out Paystack payment links for them.
//! * Receiving Paystack webhooks, checking their signatures and passing them to the engine for confirmation.
//! * Running the reminder and housekeeping workers.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/pay/{reference}`: The customer-facing payment link. Redirects to checkout while the link is payable.
//! * `/paystack/webhook`: Paystack's callbacks. Optionally restricted to an IP whitelist.
//! * `/api/...`: The merchant's back office, behind the API key. See [routes](routes/index.html).

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
