//! # Storage and collaborator contracts
//!
//! This module defines the interfaces the engine needs from the outside world.
//!
//! Storage backends implement:
//! * [`OrderStore`], the merchant's orders. The engine only ever reads an order, marks it paid, adds notes and changes
//!   its status.
//! * [`LinkManagement`], transactions and the payment links that wrap them.
//! * [`WebhookManagement`], the dedup store for processor callbacks.
//! * [`ReminderManagement`], the persisted reminder schedule and the opt-out list.
//! * [`PaylinkDatabase`] ties them together for the APIs that need all of them.
//!
//! External services implement:
//! * [`PaymentProcessor`], the processor's transaction API and webhook signature check.
//! * [`MessagingChannel`], the channel reminders are delivered over.
mod data_objects;
mod link_management;
mod messaging;
mod order_store;
mod paylink_database;
mod payment_processor;
mod reminder_management;
mod webhook_management;

pub use data_objects::{ConfirmationResult, InsertLinkResult, MessageReceipt, PaymentConfirmation, WebhookClaim};
pub use link_management::LinkManagement;
pub use messaging::{MessagingChannel, MessagingError};
pub use order_store::OrderStore;
pub use paylink_database::{PaylinkDatabase, PaymentGatewayError};
pub use payment_processor::PaymentProcessor;
pub use reminder_management::ReminderManagement;
pub use webhook_management::WebhookManagement;
