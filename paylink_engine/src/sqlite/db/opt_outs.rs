use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::OptOut;

/// Returns false if the contact was already on the list.
pub async fn insert(
    contact: &str,
    reason: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT INTO opt_outs (contact, reason, created_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
        .bind(contact)
        .bind(reason)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove(contact: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM opt_outs WHERE contact = $1").bind(contact).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch(contact: &str, conn: &mut SqliteConnection) -> Result<Option<OptOut>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM opt_outs WHERE contact = $1").bind(contact).fetch_optional(conn).await
}
