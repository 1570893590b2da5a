use std::fmt::Debug;

use cucumber::World;
use paylink_engine::{
    db_types::{OrderId, PaymentLink},
    plg_api::{reminder_objects::FireOutcome, webhook_objects::WebhookAck},
    LinkManagement,
    WebhookError,
};

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct PaylinkWorld {
    pub system: Option<TestSystem>,
    pub deliveries: Vec<Result<WebhookAck, WebhookError>>,
    pub outcomes: Vec<FireOutcome>,
}

impl Debug for PaylinkWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let db = self.system.as_ref().map(|s| s.db_path.as_str()).unwrap_or("none");
        write!(f, "PaylinkWorld(db: {db}, deliveries: {:?}, outcomes: {:?})", self.deliveries, self.outcomes)
    }
}

impl PaylinkWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Paylink system not initialised")
    }

    /// The most recent link created for the order.
    pub async fn latest_link(&self, order_id: i64) -> PaymentLink {
        let links = self.system().db.fetch_links_for_order(OrderId(order_id)).await.expect("Error fetching links");
        links.into_iter().last().expect("No link for order")
    }
}
