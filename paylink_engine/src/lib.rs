//! Paylink Engine
//!
//! The engine turns merchant orders into Paystack payment links, confirms payments that arrive through webhooks, and
//! chases unpaid orders with a bounded cascade of reminders. It is independent of the HTTP server that exposes it.
//!
//! The library is divided into these sections:
//! 1. Database management and control ([`mod@traits`] and [`mod@sqlite`]). The traits describe what a storage backend
//!    must provide; SQLite is the supported backend. The row types live in [`mod@db_types`].
//! 2. The public API ([`mod@plg_api`]). [`PaymentLinkApi`] owns the link lifecycle, [`WebhookApi`] ingests and
//!    dispatches processor callbacks, [`ReminderApi`] runs the reminder state machine, and [`OrderApi`] is the local
//!    order-store adapter.
//! 3. The [`TransactionValidator`], a pure rule engine for transaction requests and confirmations.
//!
//! The engine publishes [`events`] when orders are paid or annulled, so that other components (the reminder
//! scheduler, most importantly) can react without being called directly.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod plg_api;
pub mod traits;
pub mod validator;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use plg_api::{
    errors::{LinkError, ReminderError, WebhookError},
    link_api::PaymentLinkApi,
    order_api::OrderApi,
    reminder_api::ReminderApi,
    webhook_api::WebhookApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    LinkManagement,
    MessagingChannel,
    OrderStore,
    PaylinkDatabase,
    PaymentGatewayError,
    PaymentProcessor,
    ReminderManagement,
    WebhookManagement,
};
pub use validator::{TransactionValidator, ValidationResult, ValidationRules};
