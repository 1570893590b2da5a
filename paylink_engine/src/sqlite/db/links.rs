use chrono::{DateTime, Utc};
use log::{debug, trace};
use plg_common::MinorUnits;
use serde_json::Value;
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{NewPaymentLink, NewTransaction, OrderId, PaymentLink, Transaction};

//--------------------------------------     Transactions      ---------------------------------------------------------

pub async fn insert_transaction(
    tx: NewTransaction,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO transactions (reference, order_id, amount, currency, email, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'initialized', $6, $6)
            RETURNING *;
        "#,
    )
    .bind(tx.reference)
    .bind(tx.order_id)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(tx.email)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_transaction(reference: &str, conn: &mut SqliteConnection) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE reference = $1").bind(reference).fetch_optional(conn).await
}

pub async fn reference_exists(reference: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Moves an initialized (or failed, since a later success supersedes a failed attempt) transaction to `success`.
/// Returns `None` if the transaction was already successful or does not exist.
pub async fn mark_transaction_successful(
    reference: &str,
    channel: Option<String>,
    raw_payload: Value,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE transactions SET status = 'success', channel = $1, raw_payload = $2, updated_at = $3
            WHERE reference = $4 AND status <> 'success'
            RETURNING *;
        "#,
    )
    .bind(channel)
    .bind(Json(raw_payload))
    .bind(now)
    .bind(reference)
    .fetch_optional(conn)
    .await
}

pub async fn mark_transaction_failed(
    reference: &str,
    raw_payload: Value,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE transactions SET status = 'failed', raw_payload = $1, updated_at = $2
            WHERE reference = $3 AND status = 'initialized'
        "#,
    )
    .bind(Json(raw_payload))
    .bind(now)
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn confirmed_total_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<MinorUnits, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE order_id = $1 AND status = 'success'",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(MinorUnits::from(total))
}

//--------------------------------------     Payment links     ---------------------------------------------------------

pub async fn insert_link(link: NewPaymentLink, conn: &mut SqliteConnection) -> Result<PaymentLink, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payment_links (order_id, reference, authorization_url, access_code, status, metadata, created_at, expires_at)
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(link.order_id)
    .bind(link.reference)
    .bind(link.authorization_url)
    .bind(link.access_code)
    .bind(Json(link.metadata))
    .bind(link.created_at)
    .bind(link.expires_at)
    .fetch_one(conn)
    .await
}

pub async fn fetch_link(reference: &str, conn: &mut SqliteConnection) -> Result<Option<PaymentLink>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_links WHERE reference = $1").bind(reference).fetch_optional(conn).await
}

pub async fn fetch_links_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentLink>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_links WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

/// The order's active link, if it is still inside its lifetime at `now`.
pub async fn fetch_usable_link_for_order(
    order_id: OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentLink>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM payment_links
            WHERE order_id = $1 AND status = 'active' AND julianday(expires_at) > julianday($2)
            ORDER BY id DESC LIMIT 1
        "#,
    )
    .bind(order_id)
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// Expires the order's active link if it has run past its expiry time. Returns the number of links expired.
pub async fn expire_lapsed_link_for_order(
    order_id: OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE payment_links SET status = 'expired'
            WHERE order_id = $1 AND status = 'active' AND julianday(expires_at) <= julianday($2)
        "#,
    )
    .bind(order_id)
    .bind(now)
    .execute(conn)
    .await?;
    if result.rows_affected() > 0 {
        trace!("🗃️ Lapsed link for order {order_id} expired");
    }
    Ok(result.rows_affected())
}

pub async fn expire_link(reference: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE payment_links SET status = 'expired' WHERE reference = $1 AND status = 'active'")
        .bind(reference)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn expire_stale_links(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<PaymentLink>, sqlx::Error> {
    let links: Vec<PaymentLink> = sqlx::query_as(
        r#"
            UPDATE payment_links SET status = 'expired'
            WHERE status = 'active' AND julianday(expires_at) <= julianday($1)
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    if !links.is_empty() {
        debug!("🗃️ {} stale payment links expired", links.len());
    }
    Ok(links)
}

pub async fn cancel_links_for_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE payment_links SET status = 'cancelled' WHERE order_id = $1 AND status = 'active'")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Only an active link can become paid. A payment against an expired link still confirms the transaction, but the
/// link keeps its terminal state.
pub async fn mark_link_paid(
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payment_links SET status = 'paid', paid_at = $1 WHERE reference = $2 AND status = 'active'",
    )
    .bind(now)
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
