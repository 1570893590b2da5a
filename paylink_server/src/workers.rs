use std::time::Duration;

use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::server::GatewayReminderApi;

/// Starts the reminder worker. Every `interval` it fires the reminders that have come due. Do not await the returned
/// JoinHandle, as it will run indefinitely.
pub fn start_reminder_worker(api: GatewayReminderApi, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Reminder worker started. Polling every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running reminder job");
            match api.process_due().await {
                Ok(summary) if summary.total() > 0 => {
                    info!(
                        "🕰️ {} reminders due. {} sent, {} retrying, {} abandoned, {} cancelled, {} skipped",
                        summary.total(),
                        summary.sent,
                        summary.retrying,
                        summary.abandoned,
                        summary.cancelled,
                        summary.skipped
                    );
                },
                Ok(_) => trace!("🕰️ No reminders due"),
                Err(e) => error!("🕰️ Error running reminder job: {e}"),
            }
        }
    })
}

/// Starts the housekeeping worker: stale links are expired, reminders of settled orders cancelled and abandoned
/// webhook claims released. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sweep_worker(api: GatewayReminderApi, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Sweep worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running sweep job");
            match api.sweep().await {
                Ok(report) => debug!(
                    "🕰️ Sweep: {} links expired, {} reminders cancelled, {} webhook claims released",
                    report.expired_links, report.cancelled_reminders, report.released_webhook_claims
                ),
                Err(e) => error!("🕰️ Error running sweep job: {e}"),
            }
        }
    })
}
