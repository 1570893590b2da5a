use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderNote, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts the order, returning `false` in the second parameter if it already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let inserted = match fetch_order(order.id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, now, conn).await?;
            debug!("🗃️ Order {} inserted", order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

async fn insert_order(order: NewOrder, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO orders (id, total, currency, billing_email, billing_phone, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order.total)
    .bind(order.currency)
    .bind(order.billing_email)
    .bind(order.billing_phone)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_order(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Marks the order paid if, and only if, it is still pending.
pub async fn mark_paid(
    id: OrderId,
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'paid', paid_reference = $1, updated_at = $2
            WHERE id = $3 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn cancel_pending(
    id: OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET status = 'cancelled', updated_at = $1 WHERE id = $2 AND status = 'pending' RETURNING *",
    )
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Returns `None` if the order does not exist or is already in `status`.
pub async fn set_status(
    id: OrderId,
    status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status <> $1 RETURNING *")
        .bind(status)
        .bind(now)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_note(
    id: OrderId,
    note: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO order_notes (order_id, note, created_at) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(note)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_notes(id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderNote>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_notes WHERE order_id = $1 ORDER BY id").bind(id).fetch_all(conn).await
}
