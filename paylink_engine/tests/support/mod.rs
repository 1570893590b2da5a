#![allow(dead_code)]
use std::{sync::Arc, time::Duration};

use futures_util::FutureExt;
use log::*;
use paylink_engine::{
    db_types::{NewOrder, Order, OrderId},
    events::{EventHandlers, EventHooks},
    plg_api::{link_objects::LinkConfig, reminder_objects::ReminderConfig},
    test_utils::{
        fakes::{FakeMessenger, FakeProcessor},
        prepare_env::{prepare_test_env, random_db_path},
    },
    OrderApi,
    PaylinkDatabase,
    PaymentLinkApi,
    ReminderApi,
    ReminderManagement,
    SqliteDatabase,
    TransactionValidator,
    WebhookApi,
};
use plg_common::{Currency, MinorUnits};
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub struct TestSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub processor: Arc<FakeProcessor>,
    pub messenger: Arc<FakeMessenger>,
    pub orders: OrderApi<SqliteDatabase>,
    pub links: PaymentLinkApi<SqliteDatabase, FakeProcessor>,
    pub webhooks: WebhookApi<SqliteDatabase, FakeProcessor>,
    pub reminders: ReminderApi<SqliteDatabase, FakeProcessor, FakeMessenger>,
}

/// Cancels pending reminders whenever an order is paid or annulled, as the server does.
pub fn cancellation_hooks(db: SqliteDatabase) -> EventHooks {
    let mut hooks = EventHooks::default();
    let paid_db = db.clone();
    hooks.on_order_paid(move |ev| {
        let db = paid_db.clone();
        async move {
            if let Err(e) = db.cancel_reminders_for_order(ev.order.id, "order paid").await {
                error!("🪝️ Hook failed: {e}");
            }
        }
        .boxed()
    });
    hooks.on_order_annulled(move |ev| {
        let db = db.clone();
        async move {
            let reason = format!("order {}", ev.status);
            if let Err(e) = db.cancel_reminders_for_order(ev.order.id, &reason).await {
                error!("🪝️ Hook failed: {e}");
            }
        }
        .boxed()
    });
    hooks
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_reminder_config(ReminderConfig::default()).await
    }

    pub async fn with_reminder_config(config: ReminderConfig) -> Self {
        let db_path = random_db_path();
        prepare_test_env(&db_path).await;
        let db = SqliteDatabase::new_with_url(&db_path, 5).await.expect("Error creating database");
        let handlers = EventHandlers::new(32, cancellation_hooks(db.clone()));
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let processor = Arc::new(FakeProcessor::new());
        let messenger = Arc::new(FakeMessenger::new());
        let validator = Arc::new(TransactionValidator::default());
        let links = PaymentLinkApi::new(
            db.clone(),
            Arc::clone(&processor),
            validator,
            LinkConfig::default(),
            producers.clone(),
        );
        let webhooks = WebhookApi::new(links.clone(), producers.clone());
        let reminders = ReminderApi::new(links.clone(), Arc::clone(&messenger), config);
        let orders = OrderApi::new(db.clone(), producers);
        Self { db_path, db, processor, messenger, orders, links, webhooks, reminders }
    }

    /// Registers an order for `total` kobo and schedules its reminders.
    pub async fn new_order(&self, id: i64, total: i64) -> Order {
        let order = NewOrder::new(OrderId(id), MinorUnits::from(total), Currency::Ngn, "ada@example.com")
            .with_phone("+234 801 234 5678");
        let (order, _) = self.orders.register(order).await.expect("Error registering order");
        self.reminders.schedule_for_order(&order).await.expect("Error scheduling reminders");
        order
    }

    /// A signed `charge.success` delivery for `reference`.
    pub fn charge_success(&self, event_id: i64, reference: &str, amount: i64) -> (Vec<u8>, String) {
        let body = json!({
            "event": "charge.success",
            "data": {
                "id": event_id,
                "reference": reference,
                "amount": amount,
                "currency": "NGN",
                "status": "success",
                "channel": "card",
                "customer": { "email": "ada@example.com" }
            }
        });
        let body = serde_json::to_vec(&body).unwrap();
        let sig = self.processor.sign(&body);
        (body, sig)
    }

    /// Lets the event handlers catch up.
    pub async fn settle_events(&self) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        Sqlite::drop_database(&self.db_path).await.unwrap();
    }
}

pub const CONTACT: &str = "2348012345678";
