//! `SqliteDatabase` is the concrete storage backend of the payment-link engine.
//!
//! It implements all the traits defined in the [`crate::traits`] module by delegating to the free functions in
//! [`super::db`], opening a database transaction wherever several rows have to change together.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use plg_common::MinorUnits;
use serde_json::Value;
use sqlx::SqlitePool;

use super::db::{db_url, is_unique_violation, links, new_pool, opt_outs, orders, reminders, webhooks};
use crate::{
    db_types::{
        NewOrder,
        NewPaymentLink,
        NewReminder,
        NewTransaction,
        NewWebhookEvent,
        Order,
        OrderId,
        OrderNote,
        OrderStatusType,
        PaymentLink,
        ReminderSchedule,
        Transaction,
        WebhookEvent,
        WebhookStatus,
    },
    traits::{
        ConfirmationResult,
        InsertLinkResult,
        LinkManagement,
        OrderStore,
        PaylinkDatabase,
        PaymentConfirmation,
        PaymentGatewayError,
        ReminderManagement,
        WebhookClaim,
        WebhookManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `PLG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), PaymentGatewayError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentGatewayError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl PaylinkDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderStore for SqliteDatabase {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn mark_paid(&self, id: OrderId, reference: &str) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let order = match orders::mark_paid(id, reference, now, &mut tx).await? {
            Some(order) => {
                orders::insert_note(id, &format!("Payment confirmed. Reference {reference}"), now, &mut tx).await?;
                order
            },
            None => orders::fetch_order(id, &mut tx).await?.ok_or(PaymentGatewayError::OrderNotFound(id))?,
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn add_note(&self, id: OrderId, note: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_note(id, note, Utc::now(), &mut conn).await?;
        Ok(())
    }

    async fn set_status_with_note(
        &self,
        id: OrderId,
        status: OrderStatusType,
        note: &str,
    ) -> Result<(Order, bool), PaymentGatewayError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::set_status(id, status, now, &mut tx).await? else {
            let order = orders::fetch_order(id, &mut tx).await?.ok_or(PaymentGatewayError::OrderNotFound(id))?;
            tx.rollback().await?;
            trace!("🗃️ Order {id} was already {status}");
            return Ok((order, false));
        };
        orders::insert_note(id, note, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {id} is now {status}");
        Ok((order, true))
    }

    async fn cancel_pending_order(&self, id: OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::cancel_pending(id, Utc::now(), &mut conn).await?;
        Ok(order)
    }

    async fn fetch_notes(&self, id: OrderId) -> Result<Vec<OrderNote>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let notes = orders::fetch_notes(id, &mut conn).await?;
        Ok(notes)
    }
}

impl LinkManagement for SqliteDatabase {
    async fn reference_exists(&self, reference: &str) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let exists = links::reference_exists(reference, &mut conn).await?;
        Ok(exists)
    }

    async fn fetch_usable_link_for_order(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentLink>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let link = links::fetch_usable_link_for_order(order_id, now, &mut conn).await?;
        Ok(link)
    }

    async fn insert_link(
        &self,
        transaction: NewTransaction,
        link: NewPaymentLink,
    ) -> Result<InsertLinkResult, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let now = link.created_at;
        let order_id = link.order_id;
        if !order_id.is_custom() {
            if let Some(existing) = links::fetch_usable_link_for_order(order_id, now, &mut tx).await? {
                tx.rollback().await?;
                return Ok(InsertLinkResult::ActiveLinkExists(existing));
            }
            links::expire_lapsed_link_for_order(order_id, now, &mut tx).await?;
        }
        let reference = transaction.reference.clone();
        links::insert_transaction(transaction, now, &mut tx).await.map_err(|e| {
            if is_unique_violation(&e) {
                PaymentGatewayError::DuplicateReference(reference.clone())
            } else {
                PaymentGatewayError::from(e)
            }
        })?;
        let link = match links::insert_link(link, &mut tx).await {
            Ok(link) => link,
            Err(e) if is_unique_violation(&e) && !order_id.is_custom() => {
                // A concurrent caller committed an active link for this order between our check and our insert.
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                let existing = links::fetch_usable_link_for_order(order_id, now, &mut conn)
                    .await?
                    .ok_or_else(|| PaymentGatewayError::DatabaseError(e.to_string()))?;
                return Ok(InsertLinkResult::ActiveLinkExists(existing));
            },
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        debug!("🗃️ Payment link {} stored for order {order_id}", link.reference);
        Ok(InsertLinkResult::Inserted(link))
    }

    async fn fetch_link(&self, reference: &str) -> Result<Option<PaymentLink>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let link = links::fetch_link(reference, &mut conn).await?;
        Ok(link)
    }

    async fn fetch_links_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentLink>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = links::fetch_links_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_transaction(&self, reference: &str) -> Result<Option<Transaction>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let tx = links::fetch_transaction(reference, &mut conn).await?;
        Ok(tx)
    }

    async fn expire_link(&self, reference: &str) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let expired = links::expire_link(reference, &mut conn).await?;
        Ok(expired)
    }

    async fn expire_stale_links(&self, now: DateTime<Utc>) -> Result<Vec<PaymentLink>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let expired = links::expire_stale_links(now, &mut conn).await?;
        Ok(expired)
    }

    async fn cancel_links_for_order(&self, order_id: OrderId) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let n = links::cancel_links_for_order(order_id, &mut conn).await?;
        Ok(n)
    }

    async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ConfirmationResult, PaymentGatewayError> {
        let PaymentConfirmation { reference, order_id, amount, channel, raw_payload } = confirmation;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let updated = links::mark_transaction_successful(&reference, channel, raw_payload, now, &mut tx).await?;
        let Some(transaction) = updated else {
            let transaction = links::fetch_transaction(&reference, &mut tx)
                .await?
                .ok_or_else(|| PaymentGatewayError::TransactionNotFound(reference.clone()))?;
            let order = orders::fetch_order(order_id, &mut tx).await?;
            tx.rollback().await?;
            trace!("🗃️ Transaction {reference} was already confirmed");
            return Ok(ConfirmationResult { transaction, order, newly_confirmed: false });
        };
        if !links::mark_link_paid(&reference, now, &mut tx).await? {
            warn!("🗃️ Transaction {reference} confirmed, but its link was no longer active");
        }
        let order = if order_id.is_custom() {
            None
        } else {
            let order = match orders::mark_paid(order_id, &reference, now, &mut tx).await? {
                Some(order) => {
                    let note = format!("Payment of {amount} (minor units) confirmed. Reference {reference}");
                    orders::insert_note(order_id, &note, now, &mut tx).await?;
                    order
                },
                None => {
                    let order = orders::fetch_order(order_id, &mut tx)
                        .await?
                        .ok_or(PaymentGatewayError::OrderNotFound(order_id))?;
                    let note = format!("Payment {reference} confirmed while the order was {}", order.status);
                    orders::insert_note(order_id, &note, now, &mut tx).await?;
                    order
                },
            };
            Some(order)
        };
        tx.commit().await?;
        debug!("🗃️ Transaction {reference} confirmed");
        Ok(ConfirmationResult { transaction, order, newly_confirmed: true })
    }

    async fn fail_transaction(&self, reference: &str, raw_payload: Value) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let failed = links::mark_transaction_failed(reference, raw_payload, Utc::now(), &mut conn).await?;
        Ok(failed)
    }

    async fn confirmed_total_for_order(&self, order_id: OrderId) -> Result<MinorUnits, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let total = links::confirmed_total_for_order(order_id, &mut conn).await?;
        Ok(total)
    }
}

impl WebhookManagement for SqliteDatabase {
    async fn claim_webhook_event(
        &self,
        event: NewWebhookEvent,
        stale_before: DateTime<Utc>,
    ) -> Result<WebhookClaim, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let event_id = event.event_id.clone();
        if let Some(claimed) = webhooks::claim_event(event, Utc::now(), stale_before, &mut conn).await? {
            trace!("🗃️ Webhook event {event_id} claimed (attempt {})", claimed.attempts);
            return Ok(WebhookClaim::Claimed(claimed));
        }
        let existing = webhooks::fetch_event(&event_id, &mut conn)
            .await?
            .ok_or_else(|| PaymentGatewayError::DatabaseError(format!("Webhook event {event_id} vanished")))?;
        match existing.status {
            WebhookStatus::Processed => Ok(WebhookClaim::AlreadyProcessed(existing)),
            WebhookStatus::Received | WebhookStatus::Rejected => Ok(WebhookClaim::InFlight(existing)),
        }
    }

    async fn mark_webhook_processed(&self, event_id: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::mark_processed(event_id, Utc::now(), &mut conn).await?;
        Ok(())
    }

    async fn mark_webhook_rejected(&self, event_id: &str, error: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::mark_rejected(event_id, error, Utc::now(), &mut conn).await?;
        Ok(())
    }

    async fn fetch_webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let event = webhooks::fetch_event(event_id, &mut conn).await?;
        Ok(event)
    }

    async fn release_stale_webhook_claims(&self, stale_before: DateTime<Utc>) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let n = webhooks::release_stale_claims(stale_before, Utc::now(), &mut conn).await?;
        Ok(n)
    }
}

impl ReminderManagement for SqliteDatabase {
    async fn insert_reminders(&self, reminders: &[NewReminder]) -> Result<Vec<ReminderSchedule>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut inserted = Vec::with_capacity(reminders.len());
        for reminder in reminders {
            if let Some(r) = reminders::insert_if_absent(reminder, now, &mut tx).await? {
                inserted.push(r);
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_reminders_for_order(&self, order_id: OrderId) -> Result<Vec<ReminderSchedule>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = reminders::fetch_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_reminder(
        &self,
        order_id: OrderId,
        sequence: i64,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = reminders::fetch_one(order_id, sequence, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ReminderSchedule>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = reminders::fetch_due(now, limit, &mut conn).await?;
        Ok(result)
    }

    async fn claim_reminder(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = reminders::claim(id, now, lease_until, &mut conn).await?;
        Ok(result)
    }

    async fn mark_reminder_sent(
        &self,
        id: i64,
        message_id: &str,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = reminders::mark_sent(id, message_id, Utc::now(), &mut conn).await?;
        Ok(result)
    }

    async fn mark_reminder_failed(
        &self,
        id: i64,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = reminders::mark_failed(id, error, next_attempt_at, Utc::now(), &mut conn).await?;
        Ok(result)
    }

    async fn cancel_reminder(&self, id: i64, reason: &str) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let cancelled = reminders::cancel(id, reason, Utc::now(), &mut conn).await?;
        Ok(cancelled)
    }

    async fn cancel_reminders_for_order(&self, order_id: OrderId, reason: &str) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let n = reminders::cancel_for_order(order_id, reason, Utc::now(), &mut conn).await?;
        Ok(n)
    }

    async fn cancel_reminders_for_contact(&self, contact: &str, reason: &str) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let n = reminders::cancel_for_contact(contact, reason, Utc::now(), &mut conn).await?;
        Ok(n)
    }

    async fn cancel_reminders_for_settled_orders(&self) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let n = reminders::cancel_for_settled_orders(Utc::now(), &mut conn).await?;
        Ok(n)
    }

    async fn opt_out(&self, contact: &str, reason: Option<&str>) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let added = opt_outs::insert(contact, reason, Utc::now(), &mut conn).await?;
        Ok(added)
    }

    async fn opt_in(&self, contact: &str) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let removed = opt_outs::remove(contact, &mut conn).await?;
        Ok(removed)
    }

    async fn is_opted_out(&self, contact: &str) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let found = opt_outs::fetch(contact, &mut conn).await?;
        Ok(found.is_some())
    }
}
