//! # Paylink engine public API
//!
//! The `plg_api` module exposes the programmatic API of the payment-link engine. Each API is created by handing it a
//! storage backend (anything implementing [`crate::traits::PaylinkDatabase`]) and, where it talks to the outside
//! world, the processor and messaging collaborators.
//!
//! * [`link_api`] is the payment-link lifecycle manager: create (idempotently per order), report status with a live
//!   re-verification, expire, and apply verified confirmations.
//! * [`webhook_api`] ingests processor callbacks: signature check, typed decode, dedup by event identity and dispatch
//!   to one handler per event type.
//! * [`reminder_api`] runs the reminder cascade for unpaid orders, including fire-time re-checks, retries with
//!   backoff and opt-out suppression.
//! * [`order_api`] is the thin adapter over the local order store.
//!
//! ```rust,ignore
//! use paylink_engine::{PaymentLinkApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/paylink.db", 5).await?;
//! let links = PaymentLinkApi::new(db, processor, validator, LinkConfig::default(), producers);
//! let link = links.create(LinkRequest::Order { order_id: OrderId(42) }, LinkOptions::default()).await?;
//! ```
pub mod errors;
pub mod link_api;
pub mod link_objects;
pub mod order_api;
pub mod reminder_api;
pub mod reminder_objects;
pub mod webhook_api;
pub mod webhook_objects;
