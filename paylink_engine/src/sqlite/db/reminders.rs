use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{NewReminder, OrderId, ReminderSchedule};

/// Pending means scheduled, or failed with a retry to come.
const PENDING: &str = "(status = 'scheduled' OR (status = 'failed' AND next_attempt_at IS NOT NULL))";

/// Inserts the reminder unless the `(order, sequence)` pair already has an entry. Returns the new row, if any.
pub async fn insert_if_absent(
    reminder: &NewReminder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ReminderSchedule>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO reminder_schedule (order_id, contact, sequence, reminder_type, scheduled_for, status, retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'scheduled', 0, $6, $6)
            ON CONFLICT (order_id, sequence) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(reminder.order_id)
    .bind(&reminder.contact)
    .bind(reminder.sequence)
    .bind(reminder.reminder_type)
    .bind(reminder.scheduled_for)
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_for_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<ReminderSchedule>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reminder_schedule WHERE order_id = $1 ORDER BY sequence")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_one(
    order_id: OrderId,
    sequence: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReminderSchedule>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reminder_schedule WHERE order_id = $1 AND sequence = $2")
        .bind(order_id)
        .bind(sequence)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_due(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ReminderSchedule>, sqlx::Error> {
    let q = format!(
        r#"
            SELECT * FROM reminder_schedule
            WHERE {PENDING}
              AND julianday(COALESCE(next_attempt_at, scheduled_for)) <= julianday($1)
              AND (claimed_until IS NULL OR julianday(claimed_until) <= julianday($1))
            ORDER BY COALESCE(next_attempt_at, scheduled_for), id
            LIMIT $2
        "#
    );
    sqlx::query_as(&q).bind(now).bind(limit).fetch_all(conn).await
}

/// Leases a pending reminder. The lease check and the update are a single statement.
pub async fn claim(
    id: i64,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ReminderSchedule>, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE reminder_schedule SET claimed_until = $1, updated_at = $2
            WHERE id = $3 AND {PENDING}
              AND (claimed_until IS NULL OR julianday(claimed_until) <= julianday($2))
            RETURNING *;
        "#
    );
    sqlx::query_as(&q).bind(lease_until).bind(now).bind(id).fetch_optional(conn).await
}

/// Records a delivery. Returns `None` if the reminder stopped being pending while the message was in flight.
pub async fn mark_sent(
    id: i64,
    message_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ReminderSchedule>, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE reminder_schedule
            SET status = 'sent', message_id = $1, sent_at = $2, updated_at = $2, claimed_until = NULL,
                next_attempt_at = NULL, last_error = NULL
            WHERE id = $3 AND {PENDING}
            RETURNING *;
        "#
    );
    sqlx::query_as(&q).bind(message_id).bind(now).bind(id).fetch_optional(conn).await
}

/// Records a failed delivery. A reminder that was cancelled (or sent) in the meantime is left alone and `None` is
/// returned.
pub async fn mark_failed(
    id: i64,
    error: &str,
    next_attempt_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ReminderSchedule>, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE reminder_schedule
            SET status = 'failed', last_error = $1, next_attempt_at = $2, retry_count = retry_count + 1,
                claimed_until = NULL, updated_at = $3
            WHERE id = $4 AND {PENDING}
            RETURNING *;
        "#
    );
    sqlx::query_as(&q).bind(error).bind(next_attempt_at).bind(now).bind(id).fetch_optional(conn).await
}

pub async fn cancel(id: i64, reason: &str, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE reminder_schedule
            SET status = 'cancelled', last_error = $1, next_attempt_at = NULL, claimed_until = NULL, updated_at = $2
            WHERE id = $3 AND {PENDING}
        "#
    );
    let result = sqlx::query(&q).bind(reason).bind(now).bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn cancel_for_order(
    order_id: OrderId,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE reminder_schedule
            SET status = 'cancelled', last_error = $1, next_attempt_at = NULL, updated_at = $2
            WHERE order_id = $3 AND {PENDING}
        "#
    );
    let result = sqlx::query(&q).bind(reason).bind(now).bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn cancel_for_contact(
    contact: &str,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE reminder_schedule
            SET status = 'cancelled', last_error = $1, next_attempt_at = NULL, updated_at = $2
            WHERE contact = $3 AND {PENDING}
        "#
    );
    let result = sqlx::query(&q).bind(reason).bind(now).bind(contact).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn cancel_for_settled_orders(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE reminder_schedule
            SET status = 'cancelled', last_error = 'order settled', next_attempt_at = NULL, updated_at = $1
            WHERE {PENDING}
              AND order_id IN (SELECT id FROM orders WHERE status <> 'pending')
        "#
    );
    let result = sqlx::query(&q).bind(now).execute(conn).await?;
    Ok(result.rows_affected())
}
