//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction and pass `&mut *tx`, without
//! any other changes.
//!
//! Timestamps are always bound from Rust and compared through `julianday()`, so comparisons do not depend on how
//! many fractional-second digits a stored value happens to have.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod links;
pub mod opt_outs;
pub mod orders;
pub mod reminders;
pub mod webhooks;

const SQLITE_DB_URL: &str = "sqlite://data/paylink.db";

pub fn db_url() -> String {
    let result = env::var("PLG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ PLG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// True if the error is a violation of a UNIQUE constraint or index.
pub fn is_unique_violation(e: &SqlxError) -> bool {
    match e {
        SqlxError::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
