use std::{fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use paystack_tools::{InitializeTransactionRequest, VerifiedTransaction};
use plg_common::{Currency, MinorUnits};
use serde_json::{json, Map, Value};

use crate::{
    db_types::{
        LinkStatus,
        NewPaymentLink,
        NewTransaction,
        OrderId,
        OrderStatusType,
        PaymentLink,
        Transaction,
        TransactionStatus,
    },
    events::{EventProducers, OrderPaidEvent},
    helpers::{generate_reference, KeyedLocks},
    plg_api::{
        errors::LinkError,
        link_objects::{ConfirmationOutcome, LinkConfig, LinkOptions, LinkRequest, LinkStatusReport},
    },
    traits::{InsertLinkResult, PaylinkDatabase, PaymentConfirmation, PaymentGatewayError, PaymentProcessor},
    validator::{ConfirmationContext, TransactionRequest, TransactionValidator},
};

/// `PaymentLinkApi` owns the lifecycle of payment links: creation, status, expiry and confirmation.
///
/// Creation is idempotent per order. While an order has an active link that has not reached its expiry time, every
/// `create` call for that order returns that same link. Calls for the same order are serialised in-process, and the
/// database refuses a second active link for an order, so concurrent creators converge on one link.
pub struct PaymentLinkApi<B, P> {
    db: B,
    processor: Arc<P>,
    validator: Arc<TransactionValidator>,
    config: LinkConfig,
    locks: Arc<KeyedLocks<OrderId>>,
    producers: EventProducers,
}

impl<B: Clone, P> Clone for PaymentLinkApi<B, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            processor: Arc::clone(&self.processor),
            validator: Arc::clone(&self.validator),
            config: self.config.clone(),
            locks: Arc::clone(&self.locks),
            producers: self.producers.clone(),
        }
    }
}

impl<B, P> Debug for PaymentLinkApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentLinkApi ({:?})", self.config)
    }
}

/// The amount, currency and payer a new link is for, whether it came from an order or a custom request.
struct LinkSpec {
    order_id: OrderId,
    amount: MinorUnits,
    currency: Currency,
    email: String,
    description: Option<String>,
}

impl<B, P> PaymentLinkApi<B, P> {
    pub fn new(
        db: B,
        processor: Arc<P>,
        validator: Arc<TransactionValidator>,
        config: LinkConfig,
        producers: EventProducers,
    ) -> Self {
        Self { db, processor, validator, config, locks: Arc::new(KeyedLocks::new()), producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn processor(&self) -> &P {
        self.processor.as_ref()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl<B, P> PaymentLinkApi<B, P>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
{
    /// Returns a payable link for the request, creating one only if necessary.
    ///
    /// For orders, an existing active link that is still inside its lifetime is returned as-is. Otherwise a new
    /// reference is generated, the request is validated, the processor initializes the transaction and the link is
    /// stored as `active`.
    pub async fn create(&self, request: LinkRequest, options: LinkOptions) -> Result<PaymentLink, LinkError> {
        match request {
            LinkRequest::Order { order_id } => {
                let _guard = self.locks.lock(order_id).await;
                let order = self.db.get_order(order_id).await?.ok_or(LinkError::OrderNotFound(order_id))?;
                match order.status {
                    OrderStatusType::Pending => {},
                    OrderStatusType::Paid => return Err(LinkError::OrderAlreadyPaid(order_id)),
                    status => return Err(LinkError::OrderNotPayable(order_id, status)),
                }
                if let Some(link) = self.db.fetch_usable_link_for_order(order_id, Utc::now()).await? {
                    debug!("🔗️ Order {order_id} already has active link {}. Reusing it.", link.reference);
                    return Ok(link);
                }
                let spec = LinkSpec {
                    order_id,
                    amount: order.total,
                    currency: order.currency,
                    email: order.billing_email,
                    description: None,
                };
                self.initialize_and_store(spec, options).await
            },
            LinkRequest::Custom { amount, currency, email, description } => {
                let spec = LinkSpec { order_id: OrderId::CUSTOM, amount, currency, email, description };
                self.initialize_and_store(spec, options).await
            },
        }
    }

    async fn initialize_and_store(&self, spec: LinkSpec, options: LinkOptions) -> Result<PaymentLink, LinkError> {
        let reference = generate_reference(&self.config.reference_prefix, spec.order_id);
        let callback_url = options.callback_url.or_else(|| self.config.callback_url.clone());
        let channels = if options.channels.is_empty() { self.config.channels.clone() } else { options.channels };
        let metadata = link_metadata(&spec, options.metadata);
        let request = TransactionRequest {
            email: spec.email.trim().to_string(),
            amount: spec.amount.value(),
            currency: spec.currency.code().to_string(),
            reference,
            callback_url,
            channels,
            metadata: Some(metadata.clone()),
        };
        let validation = self.validator.validate_request(&request, &self.db).await?;
        if !validation.valid {
            return Err(LinkError::Validation(validation));
        }
        let TransactionRequest { email, reference, callback_url, channels, .. } = request;
        let init = InitializeTransactionRequest {
            email: email.clone(),
            amount: spec.amount,
            currency: spec.currency,
            reference: reference.clone(),
            callback_url,
            channels,
            metadata: Some(metadata.clone()),
        };
        let initialized = self.processor.initialize_transaction(&init).await?;
        if initialized.reference != reference {
            warn!(
                "🔗️ The processor answered with reference {} for our reference {reference}. Keeping ours.",
                initialized.reference
            );
        }
        let now = Utc::now();
        let ttl = options.ttl_hours.filter(|h| *h > 0).map(Duration::hours).unwrap_or(self.config.ttl);
        let transaction =
            NewTransaction { reference: reference.clone(), order_id: spec.order_id, amount: spec.amount, currency: spec.currency, email };
        let link = NewPaymentLink {
            order_id: spec.order_id,
            reference: reference.clone(),
            authorization_url: initialized.authorization_url,
            access_code: initialized.access_code,
            metadata,
            created_at: now,
            expires_at: now + ttl,
        };
        match self.db.insert_link(transaction, link).await? {
            InsertLinkResult::Inserted(link) => {
                info!("🔗️ Payment link {} created for order {}. Expires {}", link.reference, link.order_id, link.expires_at);
                Ok(link)
            },
            InsertLinkResult::ActiveLinkExists(link) => {
                warn!(
                    "🔗️ Another caller created link {} for order {} first. Processor transaction {reference} will go \
                     unused.",
                    link.reference, link.order_id
                );
                Ok(link)
            },
        }
    }

    pub async fn fetch_link(&self, reference: &str) -> Result<PaymentLink, LinkError> {
        self.db.fetch_link(reference).await?.ok_or_else(|| LinkError::LinkNotFound(reference.to_string()))
    }

    /// Reports the link's state, merged with a live re-verification from the processor.
    ///
    /// If the processor says the transaction was paid while we still think it is open (the webhook was lost, say),
    /// the payment is confirmed on the spot and the report reflects the new state. Processor failures do not fail the
    /// report; they are recorded in `verification_error`.
    pub async fn status(&self, reference: &str) -> Result<LinkStatusReport, LinkError> {
        let link = self.fetch_link(reference).await?;
        let transaction = self.fetch_transaction(reference).await?;
        let mut processor_status = None;
        let mut verification_error = None;
        let open = matches!(link.status, LinkStatus::Active | LinkStatus::Expired);
        if open && transaction.status != TransactionStatus::Success {
            match self.processor.verify_transaction(reference).await {
                Ok(verified) => {
                    processor_status = Some(verified.status.clone());
                    if verified.is_successful() {
                        info!("🔗️ The processor reports {reference} as paid. Reconciling local state.");
                        if let ConfirmationOutcome::Rejected(result) = self.confirm_payment(reference, verified).await? {
                            verification_error = Some(result.messages().join("; "));
                        }
                    }
                },
                Err(e) => {
                    warn!("🔗️ Could not re-verify {reference} with the processor. {e}");
                    verification_error = Some(e.to_string());
                },
            }
        }
        let mut link = self.fetch_link(reference).await?;
        let transaction = self.fetch_transaction(reference).await?;
        if link.status == LinkStatus::Active && link.is_expired_at(Utc::now()) && self.db.expire_link(reference).await? {
            debug!("🔗️ Link {reference} reached its expiry time and is now expired");
            link.status = LinkStatus::Expired;
        }
        let mut report = LinkStatusReport::new(link, &transaction);
        report.processor_status = processor_status;
        report.verification_error = verification_error;
        Ok(report)
    }

    async fn fetch_transaction(&self, reference: &str) -> Result<Transaction, LinkError> {
        let tx = self
            .db
            .fetch_transaction(reference)
            .await?
            .ok_or_else(|| PaymentGatewayError::TransactionNotFound(reference.to_string()))?;
        Ok(tx)
    }

    /// Forces an active link to `expired`. Returns false if the link was not active.
    pub async fn expire(&self, reference: &str) -> Result<bool, LinkError> {
        let link = self.fetch_link(reference).await?;
        if !link.status.can_transition_to(LinkStatus::Expired) {
            debug!("🔗️ Link {reference} is already {}", link.status);
            return Ok(false);
        }
        // The store re-checks the status, in case the link was paid since it was fetched
        let expired = self.db.expire_link(&link.reference).await?;
        if expired {
            info!("🔗️ Link {reference} expired on request");
        } else {
            debug!("🔗️ Link {reference} is {} and cannot be expired", link.status);
        }
        Ok(expired)
    }

    /// Returns the link if a customer may still pay through it, or the reason they may not.
    pub async fn ensure_payable(&self, reference: &str) -> Result<PaymentLink, LinkError> {
        let link = self.fetch_link(reference).await?;
        match link.status {
            LinkStatus::Paid => Err(LinkError::LinkAlreadyPaid(link.reference)),
            LinkStatus::Cancelled => Err(LinkError::LinkCancelled(link.reference)),
            LinkStatus::Expired => Err(LinkError::LinkExpired(link.reference)),
            LinkStatus::Active if link.is_expired_at(Utc::now()) => {
                self.db.expire_link(&link.reference).await?;
                Err(LinkError::LinkExpired(link.reference))
            },
            LinkStatus::Active => Ok(link),
        }
    }

    /// Expires every active link past its expiry time.
    pub async fn expire_stale(&self) -> Result<Vec<PaymentLink>, LinkError> {
        let expired = self.db.expire_stale_links(Utc::now()).await?;
        Ok(expired)
    }

    pub async fn cancel_for_order(&self, order_id: OrderId) -> Result<u64, LinkError> {
        let n = self.db.cancel_links_for_order(order_id).await?;
        if n > 0 {
            debug!("🔗️ {n} active links of order {order_id} cancelled");
        }
        Ok(n)
    }

    /// Applies a transaction the processor has verified.
    ///
    /// The confirmation is validated against the stored transaction and the order before anything changes. A rejected
    /// confirmation leaves a note on the order and is reported as [`ConfirmationOutcome::Rejected`]. A successful one
    /// publishes an `OrderPaid` event.
    pub async fn confirm_payment(
        &self,
        reference: &str,
        verified: VerifiedTransaction,
    ) -> Result<ConfirmationOutcome, LinkError> {
        let Some(transaction) = self.db.fetch_transaction(reference).await? else {
            warn!("🔗️ A confirmation arrived for unknown reference {reference}");
            return Ok(ConfirmationOutcome::UnknownReference);
        };
        if transaction.status == TransactionStatus::Success {
            trace!("🔗️ {reference} is already confirmed");
            return Ok(ConfirmationOutcome::AlreadyConfirmed);
        }
        let order_id = transaction.order_id;
        let (order, already_confirmed) = if order_id.is_custom() {
            (None, MinorUnits::from(0))
        } else {
            let order = self.db.get_order(order_id).await?.ok_or(LinkError::OrderNotFound(order_id))?;
            let confirmed = self.db.confirmed_total_for_order(order_id).await?;
            (Some(order), confirmed)
        };
        let ctx = ConfirmationContext {
            reference,
            expected_amount: transaction.amount,
            expected_currency: transaction.currency,
            expected_email: &transaction.email,
            order: order.as_ref(),
            already_confirmed,
            verified: &verified,
        };
        let validation = self.validator.validate_confirmation(&ctx);
        if !validation.valid {
            let reason = validation.messages().join("; ");
            warn!("🔗️ Payment {reference} failed validation and was not applied. {reason}");
            if !order_id.is_custom() {
                self.db.add_note(order_id, &format!("Payment {reference} was not applied. {reason}")).await?;
            }
            return Ok(ConfirmationOutcome::Rejected(validation));
        }
        let raw_payload = serde_json::to_value(&verified).unwrap_or(Value::Null);
        let confirmation = PaymentConfirmation {
            reference: reference.to_string(),
            order_id,
            amount: verified.amount,
            channel: verified.channel.clone(),
            raw_payload,
        };
        let result = self.db.confirm_payment(confirmation).await?;
        if !result.newly_confirmed {
            return Ok(ConfirmationOutcome::AlreadyConfirmed);
        }
        info!("🔗️ Payment {reference} of {} confirmed", verified.amount);
        if let Some(order) = &result.order {
            if order.is_paid() && order.paid_reference.as_deref() == Some(reference) {
                debug!("🔗️ Notifying order paid subscribers for order {}", order.id);
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), reference)).await;
            }
        }
        Ok(ConfirmationOutcome::Confirmed { transaction: result.transaction, order: result.order })
    }
}

fn link_metadata(spec: &LinkSpec, extra: Option<Value>) -> Value {
    let mut metadata = match extra {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Map::new();
            map.insert("extra".into(), other);
            map
        },
        None => Map::new(),
    };
    metadata.insert("order_id".into(), json!(spec.order_id.value()));
    if let Some(description) = &spec.description {
        metadata.insert("description".into(), json!(description));
    }
    Value::Object(metadata)
}
