use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

/// A confirmed payment has been applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub reference: String,
}

impl OrderPaidEvent {
    pub fn new(order: Order, reference: &str) -> Self {
        Self { order, reference: reference.to_string() }
    }
}

/// The order will not be paid through this gateway any more (cancelled, refunded or disputed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}
