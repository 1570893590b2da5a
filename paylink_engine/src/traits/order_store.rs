use crate::{
    db_types::{NewOrder, Order, OrderId, OrderNote, OrderStatusType},
    traits::PaymentGatewayError,
};

/// The merchant's order store, reduced to the operations the gateway performs on it.
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Stores the order if it is new. The flag is false if an order with the same id already existed, in which case
    /// the stored order is returned unchanged.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    /// Marks a pending order as paid by the transaction `reference`. Orders in any other state are returned
    /// unchanged.
    async fn mark_paid(&self, id: OrderId, reference: &str) -> Result<Order, PaymentGatewayError>;

    async fn add_note(&self, id: OrderId, note: &str) -> Result<(), PaymentGatewayError>;

    /// Moves the order to `status` and records `note` in one transaction. An order that is already in `status` is
    /// returned unchanged, without the note, and the flag is false.
    async fn set_status_with_note(
        &self,
        id: OrderId,
        status: OrderStatusType,
        note: &str,
    ) -> Result<(Order, bool), PaymentGatewayError>;

    /// Cancels the order if it is still pending, in a single conditional update. Returns `None` if the order was in
    /// any other state.
    async fn cancel_pending_order(&self, id: OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_notes(&self, id: OrderId) -> Result<Vec<OrderNote>, PaymentGatewayError>;
}
