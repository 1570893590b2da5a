use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderNote, OrderStatusType},
    events::{EventProducers, OrderAnnulledEvent},
    traits::{LinkManagement, OrderStore, PaymentGatewayError},
};

/// `OrderApi` is the adapter over the local order store. The merchant registers orders here before asking for links,
/// and may cancel them.
pub struct OrderApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B: Clone> Clone for OrderApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl<B> OrderApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderApi<B>
where B: OrderStore + LinkManagement
{
    /// Records a new pending order. Registering an order id that already exists returns the stored order unchanged,
    /// with `false` in the second position.
    pub async fn register(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let id = order.id;
        if id.is_custom() {
            return Err(PaymentGatewayError::IllegalStatusChange(format!("{id} is reserved for custom links")));
        }
        let (order, created) = self.db.insert_order(order).await?;
        if created {
            info!("📦️ Order {id} registered for {} {}", order.currency, order.currency.format_amount(order.total));
        } else {
            debug!("📦️ Order {id} was already registered");
        }
        Ok((order, created))
    }

    pub async fn fetch(&self, id: OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.get_order(id).await
    }

    pub async fn notes(&self, id: OrderId) -> Result<Vec<OrderNote>, PaymentGatewayError> {
        self.db.fetch_notes(id).await
    }

    /// Cancels a pending order: its active links are cancelled, a note is added and an `OrderAnnulled` event is
    /// published so that pending reminders are cancelled too. Cancelling a cancelled order is a no-op. Paid orders
    /// cannot be cancelled here.
    pub async fn cancel(&self, id: OrderId, reason: Option<&str>) -> Result<Order, PaymentGatewayError> {
        let Some(order) = self.db.cancel_pending_order(id).await? else {
            let order = self.db.get_order(id).await?.ok_or(PaymentGatewayError::OrderNotFound(id))?;
            return match order.status {
                OrderStatusType::Cancelled => Ok(order),
                status => Err(PaymentGatewayError::IllegalStatusChange(format!(
                    "Order {id} is {status} and cannot be cancelled"
                ))),
            };
        };
        let links = self.db.cancel_links_for_order(id).await?;
        let note = match reason {
            Some(reason) => format!("Order cancelled. {reason}"),
            None => "Order cancelled".to_string(),
        };
        self.db.add_note(id, &note).await?;
        info!("📦️ Order {id} cancelled. {links} active links cancelled.");
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
        Ok(order)
    }
}
