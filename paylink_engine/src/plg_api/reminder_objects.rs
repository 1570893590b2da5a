use std::time::Duration;

use serde::Serialize;

use crate::db_types::{Order, PaymentLink, ReminderStatus, ReminderType};

pub const DEFAULT_REMINDER_DELAYS: [u64; 3] = [3600, 86_400, 259_200];
pub const DEFAULT_MAX_REMINDERS: usize = 3;
pub const DEFAULT_MAX_RETRIES: i64 = 2;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// Offset of each reminder from the moment it is scheduled. The cascade length is the shorter of this list and
    /// `max_reminders`.
    pub delays: Vec<Duration>,
    pub max_reminders: usize,
    /// A failed delivery is retried after `retry_delay × retry number`.
    pub retry_delay: Duration,
    pub max_retries: i64,
    /// How long a fire holds its claim on a reminder
    pub lease: Duration,
    /// Most due reminders fired per poll
    pub batch_size: i64,
    /// Most reminders fired at the same time
    pub concurrency: usize,
    pub send_timeout: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delays: DEFAULT_REMINDER_DELAYS.iter().map(|s| Duration::from_secs(*s)).collect(),
            max_reminders: DEFAULT_MAX_REMINDERS,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            lease: Duration::from_secs(120),
            batch_size: 50,
            concurrency: 4,
            send_timeout: Duration::from_secs(20),
        }
    }
}

impl ReminderConfig {
    pub fn cascade_length(&self) -> usize {
        self.delays.len().min(self.max_reminders)
    }
}

/// What happened when a reminder came due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FireOutcome {
    Sent { message_id: String },
    /// Delivery failed and a retry is scheduled.
    Retrying { error: String, attempt: i64 },
    /// Delivery failed and the retry budget is spent.
    Abandoned { error: String },
    /// The fire-time re-check found the reminder is no longer wanted.
    Cancelled { reason: String },
    /// The reminder is not pending (already sent, cancelled or abandoned), or another worker holds it.
    Skipped { status: ReminderStatus },
}

/// The tally of one poll of the due-reminder table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FireSummary {
    pub sent: usize,
    pub retrying: usize,
    pub abandoned: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl FireSummary {
    pub fn record(&mut self, outcome: &FireOutcome) {
        match outcome {
            FireOutcome::Sent { .. } => self.sent += 1,
            FireOutcome::Retrying { .. } => self.retrying += 1,
            FireOutcome::Abandoned { .. } => self.abandoned += 1,
            FireOutcome::Cancelled { .. } => self.cancelled += 1,
            FireOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sent + self.retrying + self.abandoned + self.cancelled + self.skipped + self.errors
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_links: usize,
    pub cancelled_reminders: u64,
    pub released_webhook_claims: u64,
}

/// The reminder text for one step of the cascade.
pub fn compose_reminder(order: &Order, link: &PaymentLink, reminder_type: ReminderType) -> String {
    let amount = format!("{} {}", order.currency, order.currency.format_amount(order.total));
    let url = &link.authorization_url;
    let id = order.id;
    match reminder_type {
        ReminderType::Gentle => {
            format!("Hi! Your order {id} for {amount} is waiting for payment. You can pay here: {url}")
        },
        ReminderType::Urgent => {
            format!("Reminder: order {id} ({amount}) is still unpaid. Complete your payment soon: {url}")
        },
        ReminderType::Final => format!(
            "Final reminder: order {id} ({amount}) will not be held much longer. Pay now to keep it: {url}. This link \
             expires {}.",
            link.expires_at.format("%Y-%m-%d %H:%M UTC")
        ),
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration as ChronoDuration, Utc};
    use plg_common::{Currency, MinorUnits};
    use serde_json::json;
    use sqlx::types::Json;

    use super::*;
    use crate::db_types::{LinkStatus, OrderId, OrderStatusType};

    #[test]
    fn cascade_length_is_bounded_by_both_settings() {
        let mut config = ReminderConfig::default();
        assert_eq!(config.cascade_length(), 3);
        config.max_reminders = 2;
        assert_eq!(config.cascade_length(), 2);
        config.max_reminders = 5;
        config.delays.truncate(1);
        assert_eq!(config.cascade_length(), 1);
    }

    #[test]
    fn messages_escalate() {
        let now = Utc::now();
        let order = Order {
            id: OrderId(42),
            total: MinorUnits::from(500_000),
            currency: Currency::Ngn,
            billing_email: "ada@example.com".into(),
            billing_phone: None,
            status: OrderStatusType::Pending,
            paid_reference: None,
            created_at: now,
            updated_at: now,
        };
        let link = PaymentLink {
            id: 1,
            order_id: OrderId(42),
            reference: "PLG_42_1_abc".into(),
            authorization_url: "https://checkout.paystack.com/abc".into(),
            access_code: "abc".into(),
            status: LinkStatus::Active,
            metadata: Json(json!({})),
            created_at: now,
            expires_at: now + ChronoDuration::hours(24),
            paid_at: None,
        };
        let gentle = compose_reminder(&order, &link, ReminderType::Gentle);
        assert!(gentle.starts_with("Hi!"));
        assert!(gentle.contains("NGN 5000.00"));
        assert!(gentle.contains("https://checkout.paystack.com/abc"));
        assert!(compose_reminder(&order, &link, ReminderType::Urgent).starts_with("Reminder:"));
        assert!(compose_reminder(&order, &link, ReminderType::Final).starts_with("Final reminder:"));
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = FireSummary::default();
        summary.record(&FireOutcome::Sent { message_id: "m1".into() });
        summary.record(&FireOutcome::Cancelled { reason: "order paid".into() });
        summary.record(&FireOutcome::Skipped { status: ReminderStatus::Sent });
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.total(), 3);
    }
}
