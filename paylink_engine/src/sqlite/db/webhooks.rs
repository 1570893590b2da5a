use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{NewWebhookEvent, WebhookEvent};

/// Inserts a new event, or takes over an existing one that was rejected or whose claim went stale.
///
/// Returns the claimed row, or `None` if the event exists and may not be claimed (processed, or claimed recently by
/// someone else). Insert-or-claim is a single statement, so two concurrent deliveries can never both get a row back.
pub async fn claim_event(
    event: NewWebhookEvent,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEvent>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO webhook_events (event_id, event_type, payload, signature, status, attempts, received_at, updated_at)
            VALUES ($1, $2, $3, $4, 'received', 1, $5, $5)
            ON CONFLICT (event_id) DO UPDATE SET
                status = 'received',
                attempts = webhook_events.attempts + 1,
                payload = excluded.payload,
                signature = excluded.signature,
                updated_at = excluded.updated_at
            WHERE webhook_events.status = 'rejected'
               OR (webhook_events.status = 'received' AND julianday(webhook_events.updated_at) < julianday($6))
            RETURNING *;
        "#,
    )
    .bind(event.event_id)
    .bind(event.event_type)
    .bind(event.payload)
    .bind(event.signature)
    .bind(now)
    .bind(stale_before)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_event(event_id: &str, conn: &mut SqliteConnection) -> Result<Option<WebhookEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM webhook_events WHERE event_id = $1").bind(event_id).fetch_optional(conn).await
}

pub async fn mark_processed(event_id: &str, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE webhook_events SET status = 'processed', last_error = NULL, updated_at = $1 WHERE event_id = $2")
        .bind(now)
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn mark_rejected(
    event_id: &str,
    error: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE webhook_events SET status = 'rejected', last_error = $1, updated_at = $2
            WHERE event_id = $3 AND status <> 'processed'
        "#,
    )
    .bind(error)
    .bind(now)
    .bind(event_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn release_stale_claims(
    stale_before: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE webhook_events SET status = 'rejected', last_error = 'claim expired', updated_at = $1
            WHERE status = 'received' AND julianday(updated_at) < julianday($2)
        "#,
    )
    .bind(now)
    .bind(stale_before)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
