use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewReminder, OrderId, ReminderSchedule},
    traits::PaymentGatewayError,
};

/// The persisted reminder schedule and the opt-out list.
#[allow(async_fn_in_trait)]
pub trait ReminderManagement {
    /// Inserts the reminders, skipping any `(order, sequence)` pair that already has a schedule entry.
    /// Returns the entries that were actually created.
    async fn insert_reminders(&self, reminders: &[NewReminder]) -> Result<Vec<ReminderSchedule>, PaymentGatewayError>;

    async fn fetch_reminders_for_order(&self, order_id: OrderId) -> Result<Vec<ReminderSchedule>, PaymentGatewayError>;

    async fn fetch_reminder(
        &self,
        order_id: OrderId,
        sequence: i64,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError>;

    /// Pending reminders that are due at `now` and not currently leased, oldest first.
    async fn fetch_due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ReminderSchedule>, PaymentGatewayError>;

    /// Leases a pending reminder until `lease_until`. Returns `None` if it is not pending or someone else holds a
    /// live lease.
    async fn claim_reminder(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError>;

    /// Records a delivery. Returns `None`, leaving the row untouched, if the reminder is no longer pending.
    async fn mark_reminder_sent(
        &self,
        id: i64,
        message_id: &str,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError>;

    /// Records a failed delivery and bumps the retry count. `next_attempt_at = None` abandons the reminder.
    /// Returns `None`, leaving the row untouched, if the reminder is no longer pending.
    async fn mark_reminder_failed(
        &self,
        id: i64,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<Option<ReminderSchedule>, PaymentGatewayError>;

    /// Cancels a single pending reminder. Returns false if it was not pending.
    async fn cancel_reminder(&self, id: i64, reason: &str) -> Result<bool, PaymentGatewayError>;

    async fn cancel_reminders_for_order(&self, order_id: OrderId, reason: &str) -> Result<u64, PaymentGatewayError>;

    async fn cancel_reminders_for_contact(&self, contact: &str, reason: &str) -> Result<u64, PaymentGatewayError>;

    /// Cancels pending reminders of every order that is no longer pending.
    async fn cancel_reminders_for_settled_orders(&self) -> Result<u64, PaymentGatewayError>;

    /// Adds a standing suppression. Returns false if the contact had already opted out.
    async fn opt_out(&self, contact: &str, reason: Option<&str>) -> Result<bool, PaymentGatewayError>;

    /// Lifts a suppression. Returns false if there was none.
    async fn opt_in(&self, contact: &str) -> Result<bool, PaymentGatewayError>;

    async fn is_opted_out(&self, contact: &str) -> Result<bool, PaymentGatewayError>;
}
