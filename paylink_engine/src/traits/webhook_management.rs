use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewWebhookEvent, WebhookEvent},
    traits::{PaymentGatewayError, WebhookClaim},
};

/// The dedup store for processor callbacks.
#[allow(async_fn_in_trait)]
pub trait WebhookManagement {
    /// Inserts the event if its identity is new, or re-claims it if a previous attempt was rejected or its claim is
    /// older than `stale_before`. The check and the claim are a single atomic statement.
    async fn claim_webhook_event(
        &self,
        event: NewWebhookEvent,
        stale_before: DateTime<Utc>,
    ) -> Result<WebhookClaim, PaymentGatewayError>;

    async fn mark_webhook_processed(&self, event_id: &str) -> Result<(), PaymentGatewayError>;

    async fn mark_webhook_rejected(&self, event_id: &str, error: &str) -> Result<(), PaymentGatewayError>;

    async fn fetch_webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>, PaymentGatewayError>;

    /// Marks claims older than `stale_before` that never finished as rejected, so that a redelivery can claim them.
    async fn release_stale_webhook_claims(&self, stale_before: DateTime<Utc>) -> Result<u64, PaymentGatewayError>;
}
