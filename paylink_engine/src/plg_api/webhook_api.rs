use std::{fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use serde_json::to_value;

use crate::{
    db_types::{NewWebhookEvent, OrderStatusType},
    events::{EventProducers, OrderAnnulledEvent},
    helpers::KeyedLocks,
    plg_api::{
        errors::{LinkError, WebhookError},
        link_api::PaymentLinkApi,
        link_objects::ConfirmationOutcome,
        webhook_objects::{ChargeData, PaystackEvent, WebhookAck},
    },
    traits::{PaylinkDatabase, PaymentProcessor, WebhookClaim},
};

/// A claim older than this is considered abandoned (the worker crashed) and may be taken over by a redelivery.
pub const DEFAULT_CLAIM_TIMEOUT_MINUTES: i64 = 30;

/// `WebhookApi` ingests processor callbacks.
///
/// Deliveries go through these stages, and stop at the first one that fails:
/// 1. The signature is checked over the raw body, before anything is decoded.
/// 2. The body is decoded into a typed [`PaystackEvent`].
/// 3. The event identity is claimed in the dedup store. Deliveries with the same identity are serialised by an
///    in-process lock, and the claim itself is a single atomic statement, so only one delivery ever runs the handler.
/// 4. The event is dispatched to its handler. Success marks the event `processed`. Failure marks it `rejected` so that
///    a redelivery can try again, and is reported to the caller.
pub struct WebhookApi<B, P> {
    db: B,
    links: PaymentLinkApi<B, P>,
    locks: Arc<KeyedLocks<String>>,
    claim_timeout: Duration,
    producers: EventProducers,
}

impl<B: Clone, P> Clone for WebhookApi<B, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            links: self.links.clone(),
            locks: Arc::clone(&self.locks),
            claim_timeout: self.claim_timeout,
            producers: self.producers.clone(),
        }
    }
}

impl<B, P> Debug for WebhookApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B: Clone, P> WebhookApi<B, P> {
    /// The webhook API confirms payments through `links`, and shares its storage backend.
    pub fn new(links: PaymentLinkApi<B, P>, producers: EventProducers) -> Self {
        let db = links.db().clone();
        Self {
            db,
            links,
            locks: Arc::new(KeyedLocks::new()),
            claim_timeout: Duration::minutes(DEFAULT_CLAIM_TIMEOUT_MINUTES),
            producers,
        }
    }

    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }

    pub fn claim_timeout(&self) -> Duration {
        self.claim_timeout
    }
}

impl<B, P> WebhookApi<B, P>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
{
    pub async fn ingest(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookAck, WebhookError> {
        let signature = signature.map(str::trim).filter(|s| !s.is_empty()).ok_or(WebhookError::MissingSignature)?;
        if !self.links.processor().verify_signature(body, signature) {
            warn!("🪝️ Rejected a webhook delivery with an invalid signature");
            return Err(WebhookError::InvalidSignature);
        }
        let event = PaystackEvent::decode(body)?;
        let Some(event_id) = event.event_id() else {
            if let PaystackEvent::Unknown { event, .. } = &event {
                info!("🪝️ Acknowledging {event} event without an identity. No handler for this event type.");
                return Ok(WebhookAck::Ignored);
            }
            return Err(WebhookError::Malformed(format!("{} event has neither an id nor a reference", event.event_type())));
        };
        let _guard = self.locks.lock(event_id.clone()).await;
        let new_event = NewWebhookEvent {
            event_id: event_id.clone(),
            event_type: event.event_type().to_string(),
            payload: String::from_utf8_lossy(body).into_owned(),
            signature: signature.to_string(),
        };
        let stale_before = Utc::now() - self.claim_timeout;
        match self.db.claim_webhook_event(new_event, stale_before).await? {
            WebhookClaim::Claimed(claimed) => {
                trace!("🪝️ Claimed {event_id} (attempt {})", claimed.attempts);
            },
            WebhookClaim::AlreadyProcessed(_) => {
                info!("🪝️ Duplicate delivery of {event_id}. Already processed, nothing to do.");
                return Ok(WebhookAck::Duplicate);
            },
            WebhookClaim::InFlight(existing) => {
                warn!("🪝️ {event_id} is claimed by another worker since {}. Asking for redelivery.", existing.updated_at);
                return Err(WebhookError::InFlight(event_id));
            },
        }
        match self.dispatch(&event).await {
            Ok(ack) => {
                self.db.mark_webhook_processed(&event_id).await?;
                debug!("🪝️ {event_id} processed");
                Ok(ack)
            },
            Err(reason) => {
                error!("🪝️ Handler for {event_id} failed. The event stays open for redelivery. {reason}");
                self.db.mark_webhook_rejected(&event_id, &reason).await?;
                Err(WebhookError::HandlerFailed { event_id, reason })
            },
        }
    }

    async fn dispatch(&self, event: &PaystackEvent) -> Result<WebhookAck, String> {
        match event {
            PaystackEvent::ChargeSuccess(data) => self.on_charge_success(data).await,
            PaystackEvent::ChargeFailed(data) => self.on_charge_failed(data).await,
            PaystackEvent::DisputeCreated(data) => {
                let note = format!(
                    "Dispute opened on payment {}. {}",
                    data.transaction.reference,
                    data.reason.as_deref().or(data.category.as_deref()).unwrap_or("No reason given")
                );
                self.annul_order(&data.transaction.reference, OrderStatusType::Disputed, &note).await
            },
            PaystackEvent::RefundProcessed(data) => {
                let note = format!("Refund of {} processed for payment {}", data.amount, data.transaction_reference);
                self.annul_order(&data.transaction_reference, OrderStatusType::Refunded, &note).await
            },
            PaystackEvent::Unknown { event, .. } => {
                info!("🪝️ No handler for {event} events. Acknowledging.");
                Ok(WebhookAck::Ignored)
            },
        }
    }

    /// The payload is never trusted. The transaction is re-verified with the processor and only the verified view is
    /// applied.
    async fn on_charge_success(&self, data: &ChargeData) -> Result<WebhookAck, String> {
        let reference = data.reference.as_str();
        let verified = self
            .links
            .processor()
            .verify_transaction(reference)
            .await
            .map_err(|e| format!("Could not re-verify {reference}. {e}"))?;
        if verified.reference != reference {
            return Err(format!("The processor verified {} when asked for {reference}", verified.reference));
        }
        match self.links.confirm_payment(reference, verified).await {
            Ok(ConfirmationOutcome::Confirmed { order, .. }) => {
                let order = order.map(|o| o.id.to_string()).unwrap_or_else(|| "(custom link)".into());
                info!("🪝️ charge.success for {reference} applied to order {order}");
                Ok(WebhookAck::Processed)
            },
            Ok(ConfirmationOutcome::AlreadyConfirmed) => {
                debug!("🪝️ {reference} was already confirmed");
                Ok(WebhookAck::Processed)
            },
            Ok(ConfirmationOutcome::UnknownReference) => {
                warn!("🪝️ charge.success for {reference}, which this gateway did not create. Acknowledging.");
                Ok(WebhookAck::Ignored)
            },
            Ok(ConfirmationOutcome::Rejected(result)) => {
                warn!("🪝️ charge.success for {reference} failed validation. {}", result.messages().join("; "));
                Ok(WebhookAck::Processed)
            },
            Err(e @ LinkError::OrderNotFound(_)) => {
                warn!("🪝️ charge.success for {reference} could not be applied. {e}");
                Ok(WebhookAck::Ignored)
            },
            Err(e) => Err(e.to_string()),
        }
    }

    async fn on_charge_failed(&self, data: &ChargeData) -> Result<WebhookAck, String> {
        let reference = data.reference.as_str();
        let payload = to_value(data).map_err(|e| e.to_string())?;
        let failed = self.db.fail_transaction(reference, payload).await.map_err(|e| e.to_string())?;
        if failed {
            info!(
                "🪝️ Transaction {reference} failed. {}",
                data.gateway_response.as_deref().unwrap_or("No gateway response")
            );
        } else {
            debug!("🪝️ charge.failed for {reference} ignored. The transaction is not open.");
        }
        Ok(WebhookAck::Processed)
    }

    /// Moves the order paid by `reference` to `status`, records `note` and publishes an `OrderAnnulled` event.
    async fn annul_order(&self, reference: &str, status: OrderStatusType, note: &str) -> Result<WebhookAck, String> {
        let Some(tx) = self.db.fetch_transaction(reference).await.map_err(|e| e.to_string())? else {
            warn!("🪝️ Event for unknown reference {reference}. Acknowledging.");
            return Ok(WebhookAck::Ignored);
        };
        if tx.order_id.is_custom() {
            info!("🪝️ {note} (custom link, no order to update)");
            return Ok(WebhookAck::Processed);
        }
        let order_id = tx.order_id;
        let (order, changed) = self.db.set_status_with_note(order_id, status, note).await.map_err(|e| e.to_string())?;
        if !changed {
            debug!("🪝️ Order {order_id} is already {status}. {note}");
            return Ok(WebhookAck::Processed);
        }
        info!("🪝️ Order {order_id} is now {status}. {note}");
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(order)).await;
        Ok(WebhookAck::Processed)
    }
}
