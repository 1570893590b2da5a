use std::sync::Arc;

use actix_web::{
    body::to_bytes,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use log::*;
use paylink_engine::{
    db_types::{NewOrder, Order, OrderId},
    events::EventProducers,
    plg_api::{link_objects::LinkConfig, reminder_objects::ReminderConfig},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderApi,
    PaylinkDatabase,
    PaymentLinkApi,
    ReminderApi,
    SqliteDatabase,
    TransactionValidator,
    WebhookApi,
};
use paystack_tools::{sign_payload, verify_signature, Customer, InitializedTransaction, VerifiedTransaction};
use plg_common::{Currency, MinorUnits, Secret};
use serde_json::{json, Value};

use super::mocks::{MockMessenger, MockProcessor};
use crate::middleware::ApiKeyMiddlewareFactory;

// DO NOT re-use these keys anywhere.
pub const TEST_SECRET: &str = "sk_test_e6b4d1c0a9f8";
pub const API_KEY: &str = "plg_test_key_0b1d2e";
pub const EMAIL: &str = "ada@example.com";

pub struct TestApis {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderApi<SqliteDatabase>,
    pub links: PaymentLinkApi<SqliteDatabase, MockProcessor>,
    pub webhooks: WebhookApi<SqliteDatabase, MockProcessor>,
    pub reminders: ReminderApi<SqliteDatabase, MockProcessor, MockMessenger>,
}

impl TestApis {
    pub async fn new(processor: MockProcessor, messenger: MockMessenger) -> Self {
        let db_path = random_db_path();
        prepare_test_env(&db_path).await;
        let db = SqliteDatabase::new_with_url(&db_path, 5).await.expect("Error creating database");
        let producers = EventProducers::default();
        let validator = Arc::new(TransactionValidator::default());
        let links =
            PaymentLinkApi::new(db.clone(), Arc::new(processor), validator, LinkConfig::default(), producers.clone());
        let webhooks = WebhookApi::new(links.clone(), producers.clone());
        let reminders = ReminderApi::new(links.clone(), Arc::new(messenger), ReminderConfig::default());
        let orders = OrderApi::new(db.clone(), producers);
        Self { db_path, db, orders, links, webhooks, reminders }
    }

    /// Registers every engine API with the app.
    pub fn app_data(&self, cfg: &mut ServiceConfig) {
        cfg.app_data(web::Data::new(self.orders.clone()))
            .app_data(web::Data::new(self.links.clone()))
            .app_data(web::Data::new(self.webhooks.clone()))
            .app_data(web::Data::new(self.reminders.clone()));
    }

    pub async fn new_order(&self, id: i64, total: i64) -> Order {
        let order = NewOrder::new(OrderId(id), MinorUnits::from(total), Currency::Ngn, EMAIL).with_phone("+2348012345678");
        let (order, _) = self.orders.register(order).await.expect("Error registering order");
        order
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        let _ = std::fs::remove_file(self.db_path.trim_start_matches("sqlite://"));
    }
}

/// A processor that initializes any transaction and checks signatures against [`TEST_SECRET`]. Verification
/// expectations are left to the test.
pub fn initializing_processor() -> MockProcessor {
    let mut processor = MockProcessor::new();
    processor.expect_initialize_transaction().returning(|req| {
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.paystack.test/{}", req.reference),
            access_code: format!("ac_{}", req.reference),
            reference: req.reference.clone(),
        })
    });
    processor.expect_verify_signature().returning(|body, sig| verify_signature(TEST_SECRET, body, sig));
    processor
}

/// Like [`initializing_processor`], but every transaction verifies as paid with `paid` kobo.
pub fn paying_processor(paid: i64) -> MockProcessor {
    let mut processor = initializing_processor();
    processor.expect_verify_transaction().returning(move |reference| Ok(verified(reference, paid)));
    processor
}

pub fn verified(reference: &str, amount: i64) -> VerifiedTransaction {
    VerifiedTransaction {
        id: 3_050_000,
        status: "success".into(),
        reference: reference.to_string(),
        amount: MinorUnits::from(amount),
        currency: "NGN".into(),
        channel: Some("card".into()),
        paid_at: Some(Utc::now()),
        gateway_response: Some("Approved".into()),
        customer: Some(Customer { email: Some(EMAIL.into()), phone: None }),
        metadata: Value::Null,
    }
}

pub fn charge_success(event_id: i64, reference: &str, amount: i64) -> (Vec<u8>, String) {
    let body = json!({
        "event": "charge.success",
        "data": {
            "id": event_id,
            "reference": reference,
            "amount": amount,
            "currency": "NGN",
            "status": "success",
            "channel": "card",
            "customer": { "email": EMAIL }
        }
    });
    let body = serde_json::to_vec(&body).expect("Error encoding webhook body");
    let signature = sign_payload(TEST_SECRET, &body);
    (body, signature)
}

/// Wraps `routes` in an `/api` scope behind the test API key.
pub fn api_scope(cfg: &mut ServiceConfig, routes: impl FnOnce(&mut ServiceConfig)) {
    cfg.service(web::scope("/api").wrap(ApiKeyMiddlewareFactory::new(Secret::new(API_KEY.to_string()))).configure(routes));
}

pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.expect("Error reading error body");
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn authorized(req: TestRequest) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {API_KEY}")))
}
