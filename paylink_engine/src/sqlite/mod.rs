//! SQLite backend for the payment-link engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
