use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use futures_util::{stream, StreamExt};
use log::*;

use crate::{
    db_types::{NewReminder, Order, OrderId, OrderStatusType, ReminderSchedule, ReminderType},
    helpers::normalize_contact,
    plg_api::{
        errors::{LinkError, ReminderError},
        link_api::PaymentLinkApi,
        link_objects::{LinkOptions, LinkRequest},
        reminder_objects::{compose_reminder, FireOutcome, FireSummary, ReminderConfig, SweepReport},
        webhook_api::DEFAULT_CLAIM_TIMEOUT_MINUTES,
    },
    traits::{MessagingChannel, MessagingError, PaylinkDatabase, PaymentProcessor},
};

const CANCELLED_IN_FLIGHT: &str = "cancelled while the send was in flight";

/// `ReminderApi` chases unpaid orders with a bounded cascade of reminders.
///
/// Reminders are rows in the `reminder_schedule` table, fired by a poller when they come due. Cancellation on
/// payment is best-effort (an `OrderPaid` hook calls [`ReminderApi::cancel_for_order`]); the re-check at fire time is
/// what guarantees a paid, cancelled or opted-out order is never nagged.
pub struct ReminderApi<B, P, M> {
    db: B,
    links: PaymentLinkApi<B, P>,
    messenger: Arc<M>,
    config: ReminderConfig,
}

impl<B: Clone, P, M> Clone for ReminderApi<B, P, M> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            links: self.links.clone(),
            messenger: Arc::clone(&self.messenger),
            config: self.config.clone(),
        }
    }
}

impl<B, P, M> Debug for ReminderApi<B, P, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReminderApi ({:?})", self.config)
    }
}

impl<B: Clone, P, M> ReminderApi<B, P, M> {
    pub fn new(links: PaymentLinkApi<B, P>, messenger: Arc<M>, config: ReminderConfig) -> Self {
        let db = links.db().clone();
        Self { db, links, messenger, config }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }
}

impl<B, P, M> ReminderApi<B, P, M>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
    M: MessagingChannel,
{
    /// Schedules the reminder cascade for a new order.
    ///
    /// Reminders go to the billing phone if there is one, otherwise to the billing e-mail. Nothing is scheduled when
    /// reminders are disabled, the order is settled, or the contact has opted out. Scheduling twice is harmless: a
    /// sequence number that already has an entry is skipped.
    pub async fn schedule_for_order(&self, order: &Order) -> Result<Vec<ReminderSchedule>, ReminderError> {
        if !self.config.enabled {
            trace!("⏰️ Reminders are disabled. Nothing scheduled for order {}", order.id);
            return Ok(Vec::new());
        }
        if order.status != OrderStatusType::Pending {
            debug!("⏰️ Order {} is {}. No reminders scheduled.", order.id, order.status);
            return Ok(Vec::new());
        }
        let raw_contact = order.billing_phone.as_deref().filter(|p| !p.trim().is_empty()).unwrap_or(&order.billing_email);
        let contact = normalize_contact(raw_contact);
        if contact.is_empty() {
            return Err(ReminderError::InvalidContact(raw_contact.to_string()));
        }
        if self.db.is_opted_out(&contact).await? {
            info!("⏰️ {contact} has opted out. No reminders scheduled for order {}", order.id);
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let cascade = self.config.cascade_length();
        let reminders = self.config.delays[..cascade]
            .iter()
            .enumerate()
            .map(|(i, delay)| {
                let sequence = i as i64 + 1;
                NewReminder {
                    order_id: order.id,
                    contact: contact.clone(),
                    sequence,
                    reminder_type: ReminderType::for_sequence(sequence, cascade as i64),
                    scheduled_for: now + to_chrono(*delay),
                }
            })
            .collect::<Vec<_>>();
        let scheduled = self.db.insert_reminders(&reminders).await?;
        debug!("⏰️ {} reminders scheduled for order {}", scheduled.len(), order.id);
        Ok(scheduled)
    }

    /// Schedules whatever part of the cascade is missing and returns the order's full schedule. Safe to call on every
    /// registration of the order, so a registration that failed after the order was stored is completed by a retry.
    pub async fn ensure_scheduled(&self, order: &Order) -> Result<Vec<ReminderSchedule>, ReminderError> {
        let scheduled = self.schedule_for_order(order).await?;
        if !scheduled.is_empty() {
            debug!("⏰️ {} missing reminders scheduled for order {}", scheduled.len(), order.id);
        }
        self.reminders_for_order(order.id).await
    }

    /// The entry point for one due reminder.
    pub async fn fire(&self, order_id: OrderId, contact: &str, sequence: i64) -> Result<FireOutcome, ReminderError> {
        let reminder = self
            .db
            .fetch_reminder(order_id, sequence)
            .await?
            .ok_or(ReminderError::ReminderNotFound(order_id, sequence))?;
        if reminder.contact != normalize_contact(contact) {
            return Err(ReminderError::ContactMismatch { order_id, sequence, contact: contact.to_string() });
        }
        self.fire_reminder(reminder).await
    }

    /// Claims the reminder, re-checks that it is still wanted, and delivers it.
    pub async fn fire_reminder(&self, reminder: ReminderSchedule) -> Result<FireOutcome, ReminderError> {
        let id = reminder.id;
        let order_id = reminder.order_id;
        let seq = reminder.sequence;
        if !reminder.is_pending() {
            debug!("⏰️ Reminder #{seq} of order {order_id} is {}. Nothing to do.", reminder.status);
            return Ok(FireOutcome::Skipped { status: reminder.status });
        }
        let now = Utc::now();
        let lease_until = now + to_chrono(self.config.lease);
        let Some(reminder) = self.db.claim_reminder(id, now, lease_until).await? else {
            debug!("⏰️ Reminder #{seq} of order {order_id} is held by another worker");
            return Ok(FireOutcome::Skipped { status: reminder.status });
        };
        let order = match self.db.get_order(order_id).await? {
            Some(order) => order,
            None => return self.cancel_one(&reminder, "order no longer exists").await,
        };
        match order.status {
            OrderStatusType::Pending => {},
            status => return self.cancel_one(&reminder, &format!("order is {status}")).await,
        }
        if self.db.is_opted_out(&reminder.contact).await? {
            return self.cancel_one(&reminder, "contact opted out").await;
        }
        let link = match self.links.create(LinkRequest::Order { order_id }, LinkOptions::default()).await {
            Ok(link) => link,
            Err(LinkError::OrderAlreadyPaid(_)) => return self.cancel_one(&reminder, "order is paid").await,
            Err(LinkError::OrderNotPayable(_, status)) => {
                return self.cancel_one(&reminder, &format!("order is {status}")).await
            },
            Err(e) => return self.record_failure(&reminder, &format!("Could not obtain a payment link. {e}")).await,
        };
        let text = compose_reminder(&order, &link, reminder.reminder_type);
        let send = self.messenger.send_message(&reminder.contact, &text);
        let delivery = match tokio::time::timeout(self.config.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(MessagingError::Timeout),
        };
        match delivery {
            Ok(receipt) => {
                if self.db.mark_reminder_sent(id, &receipt.message_id).await?.is_none() {
                    warn!(
                        "⏰️ Reminder #{seq} for order {order_id} was cancelled while message {} was in flight. It \
                         stays cancelled.",
                        receipt.message_id
                    );
                    return Ok(FireOutcome::Cancelled { reason: CANCELLED_IN_FLIGHT.to_string() });
                }
                info!(
                    "⏰️ {} reminder #{seq} for order {order_id} sent to {} (message {})",
                    reminder.reminder_type, reminder.contact, receipt.message_id
                );
                Ok(FireOutcome::Sent { message_id: receipt.message_id })
            },
            Err(e) => self.record_failure(&reminder, &e.to_string()).await,
        }
    }

    async fn cancel_one(&self, reminder: &ReminderSchedule, reason: &str) -> Result<FireOutcome, ReminderError> {
        self.db.cancel_reminder(reminder.id, reason).await?;
        info!("⏰️ Reminder #{} of order {} cancelled: {reason}", reminder.sequence, reminder.order_id);
        Ok(FireOutcome::Cancelled { reason: reason.to_string() })
    }

    async fn record_failure(&self, reminder: &ReminderSchedule, error: &str) -> Result<FireOutcome, ReminderError> {
        let attempt = reminder.retry_count + 1;
        let next = retry_at(Utc::now(), &self.config, reminder.retry_count);
        if self.db.mark_reminder_failed(reminder.id, error, next).await?.is_none() {
            debug!(
                "⏰️ Reminder #{} of order {} was cancelled during a failed attempt. No retry. {error}",
                reminder.sequence, reminder.order_id
            );
            return Ok(FireOutcome::Cancelled { reason: CANCELLED_IN_FLIGHT.to_string() });
        }
        match next {
            Some(at) => {
                warn!(
                    "⏰️ Reminder #{} of order {} failed (attempt {attempt}). Retrying at {at}. {error}",
                    reminder.sequence, reminder.order_id
                );
                Ok(FireOutcome::Retrying { error: error.to_string(), attempt })
            },
            None => {
                error!(
                    "⏰️ Reminder #{} of order {} failed {attempt} times and has been abandoned. {error}",
                    reminder.sequence, reminder.order_id
                );
                Ok(FireOutcome::Abandoned { error: error.to_string() })
            },
        }
    }

    /// Fires every reminder that is due, a few at a time.
    pub async fn process_due(&self) -> Result<FireSummary, ReminderError> {
        let due = self.db.fetch_due_reminders(Utc::now(), self.config.batch_size).await?;
        let mut summary = FireSummary::default();
        if due.is_empty() {
            return Ok(summary);
        }
        trace!("⏰️ {} reminders are due", due.len());
        let outcomes = stream::iter(due)
            .map(|reminder| self.fire_reminder(reminder))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!("⏰️ Could not fire a reminder. {e}");
                    summary.errors += 1;
                },
            }
        }
        debug!("⏰️ Reminder poll complete: {summary:?}");
        Ok(summary)
    }

    pub async fn cancel_for_order(&self, order_id: OrderId, reason: &str) -> Result<u64, ReminderError> {
        let n = self.db.cancel_reminders_for_order(order_id, reason).await?;
        if n > 0 {
            info!("⏰️ {n} pending reminders of order {order_id} cancelled: {reason}");
        }
        Ok(n)
    }

    /// Adds a standing suppression for the contact and cancels everything pending for it. Returns the number of
    /// reminders cancelled. Messages already sent are not affected.
    pub async fn opt_out(&self, contact: &str, reason: Option<&str>) -> Result<u64, ReminderError> {
        let contact = normalize_contact(contact);
        if contact.is_empty() {
            return Err(ReminderError::InvalidContact(contact));
        }
        if self.db.opt_out(&contact, reason).await? {
            info!("⏰️ {contact} opted out of reminders");
        }
        let n = self.db.cancel_reminders_for_contact(&contact, "contact opted out").await?;
        Ok(n)
    }

    /// Lifts a suppression. Only reminders scheduled from now on are affected.
    pub async fn opt_in(&self, contact: &str) -> Result<bool, ReminderError> {
        let contact = normalize_contact(contact);
        let removed = self.db.opt_in(&contact).await?;
        if removed {
            info!("⏰️ {contact} opted back in to reminders");
        }
        Ok(removed)
    }

    pub async fn reminders_for_order(&self, order_id: OrderId) -> Result<Vec<ReminderSchedule>, ReminderError> {
        let reminders = self.db.fetch_reminders_for_order(order_id).await?;
        Ok(reminders)
    }

    /// The periodic housekeeping pass: expire lapsed links, cancel reminders of settled orders, and free webhook
    /// claims whose worker went away.
    pub async fn sweep(&self) -> Result<SweepReport, ReminderError> {
        let expired_links = match self.links.expire_stale().await {
            Ok(links) => links.len(),
            Err(LinkError::Database(e)) => return Err(e.into()),
            Err(e) => {
                warn!("⏰️ Could not expire stale links. {e}");
                0
            },
        };
        let cancelled_reminders = self.db.cancel_reminders_for_settled_orders().await?;
        let stale_before = Utc::now() - Duration::minutes(DEFAULT_CLAIM_TIMEOUT_MINUTES);
        let released_webhook_claims = self.db.release_stale_webhook_claims(stale_before).await?;
        let report = SweepReport { expired_links, cancelled_reminders, released_webhook_claims };
        if report != SweepReport::default() {
            info!("⏰️ Sweep complete: {report:?}");
        }
        Ok(report)
    }
}

/// When the next attempt after a failure should happen, or `None` if the retry budget is spent.
fn retry_at(now: DateTime<Utc>, config: &ReminderConfig, retries_so_far: i64) -> Option<DateTime<Utc>> {
    if retries_so_far >= config.max_retries {
        return None;
    }
    let retry_number = retries_so_far + 1;
    let delay = to_chrono(config.retry_delay) * retry_number as i32;
    Some(now + delay)
}

fn to_chrono(d: std::time::Duration) -> Duration {
    Duration::from_std(d).unwrap_or_else(|_| Duration::weeks(52))
}
