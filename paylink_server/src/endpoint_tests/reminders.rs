use actix_web::{http::StatusCode, test::TestRequest, web::ServiceConfig};
use paylink_engine::{traits::MessageReceipt, SqliteDatabase};
use serde_json::{json, Value};

use super::{
    helpers::{api_scope, authorized, initializing_processor, send_request, TestApis},
    mocks::{MockMessenger, MockProcessor},
};
use crate::routes::{FireReminderRoute, OptInRoute, OptOutRoute, SweepRoute};

fn configure(apis: &TestApis) -> impl FnOnce(&mut ServiceConfig) + '_ {
    move |cfg| {
        apis.app_data(cfg);
        api_scope(cfg, |cfg| {
            cfg.service(FireReminderRoute::<SqliteDatabase, MockProcessor, MockMessenger>::new())
                .service(SweepRoute::<SqliteDatabase, MockProcessor, MockMessenger>::new())
                .service(OptOutRoute::<SqliteDatabase, MockProcessor, MockMessenger>::new())
                .service(OptInRoute::<SqliteDatabase, MockProcessor, MockMessenger>::new());
        });
    }
}

async fn schedule(apis: &TestApis, id: i64) {
    let order = apis.new_order(id, 500_000).await;
    let reminders = apis.reminders.schedule_for_order(&order).await.unwrap();
    assert_eq!(reminders.len(), 3);
}

#[actix_web::test]
async fn fire_sends_one_reminder() {
    let _ = env_logger::try_init().ok();
    let mut messenger = MockMessenger::new();
    messenger
        .expect_send_message()
        .withf(|contact, _| contact == "2348012345678")
        .times(1)
        .returning(|_, _| Ok(MessageReceipt { message_id: "SM42".into() }));
    let apis = TestApis::new(initializing_processor(), messenger).await;
    schedule(&apis, 42).await;

    let fire = json!({"order_id": 42, "contact": "+234 801 234 5678", "sequence": 1});
    let req = authorized(TestRequest::post().uri("/api/reminders/fire")).set_json(fire.clone());
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome, json!({"outcome": "sent", "message_id": "SM42"}));

    // A second fire of the same reminder must not send again
    let req = authorized(TestRequest::post().uri("/api/reminders/fire")).set_json(fire);
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["outcome"], json!("skipped"));
    apis.tear_down().await;
}

#[actix_web::test]
async fn fire_checks_the_contact() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    schedule(&apis, 42).await;
    let fire = json!({"order_id": 42, "contact": "+2348099999999", "sequence": 1});
    let req = authorized(TestRequest::post().uri("/api/reminders/fire")).set_json(fire);
    let (status, _) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let fire = json!({"order_id": 42, "contact": "+2348012345678", "sequence": 9});
    let req = authorized(TestRequest::post().uri("/api/reminders/fire")).set_json(fire);
    let (status, _) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    apis.tear_down().await;
}

#[actix_web::test]
async fn opting_out_cancels_pending_reminders() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    schedule(&apis, 42).await;
    let req = authorized(TestRequest::post().uri("/api/opt_out")).set_json(json!({"contact": "+234 801 234 5678"}));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["cancelled_reminders"], json!(3));

    let order = apis.new_order(43, 250_000).await;
    assert!(apis.reminders.schedule_for_order(&order).await.unwrap().is_empty());

    let req = authorized(TestRequest::delete().uri("/api/opt_out/2348012345678"));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":true"#), "{body}");
    let req = authorized(TestRequest::delete().uri("/api/opt_out/2348012345678"));
    let (_, body) = send_request(req, configure(&apis)).await;
    assert!(body.contains(r#""success":false"#), "{body}");
    apis.tear_down().await;
}

#[actix_web::test]
async fn sweep_reports_its_work() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    let req = authorized(TestRequest::post().uri("/api/reminders/sweep"));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report, json!({"expired_links": 0, "cancelled_reminders": 0, "released_webhook_claims": 0}));
    apis.tear_down().await;
}
