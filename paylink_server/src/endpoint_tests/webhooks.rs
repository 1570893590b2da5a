use actix_web::{http::StatusCode, test::TestRequest, web};
use chrono::{Duration, Utc};
use paylink_engine::{
    db_types::{NewWebhookEvent, OrderId},
    plg_api::link_objects::{LinkOptions, LinkRequest},
    SqliteDatabase,
    WebhookManagement,
};
use paystack_tools::{sign_payload, SIGNATURE_HEADER};

use super::{
    helpers::{charge_success, paying_processor, send_request, TestApis, TEST_SECRET},
    mocks::{MockMessenger, MockProcessor},
};
use crate::routes::PaystackWebhookRoute;

fn delivery(body: &[u8], signature: Option<&str>) -> TestRequest {
    let mut req = TestRequest::post().uri("/paystack/webhook").set_payload(body.to_vec());
    if let Some(sig) = signature {
        req = req.insert_header((SIGNATURE_HEADER, sig.to_string()));
    }
    req
}

async fn deliver(apis: &TestApis, req: TestRequest) -> (StatusCode, String) {
    send_request(req, |cfg| {
        apis.app_data(cfg);
        cfg.service(web::scope("/paystack").service(PaystackWebhookRoute::<SqliteDatabase, MockProcessor>::new()));
    })
    .await
}

#[actix_web::test]
async fn unsigned_deliveries_are_refused() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(paying_processor(500_000), MockMessenger::new()).await;
    let (body, _) = charge_success(1, "PLG-42-x", 500_000);
    let (status, res) = deliver(&apis, delivery(&body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(res.contains("signature header is missing"), "{res}");
    let (status, _) = deliver(&apis, delivery(&body, Some("deadbeef"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    apis.tear_down().await;
}

#[actix_web::test]
async fn garbage_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(paying_processor(500_000), MockMessenger::new()).await;
    let body = b"this is not json";
    let sig = sign_payload(TEST_SECRET, body);
    let (status, _) = deliver(&apis, delivery(body, Some(&sig))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    apis.tear_down().await;
}

#[actix_web::test]
async fn unknown_events_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(paying_processor(500_000), MockMessenger::new()).await;
    let body = br#"{"event":"subscription.create","data":{"plan":{"name":"Gold"}}}"#;
    let sig = sign_payload(TEST_SECRET, body);
    let (status, res) = deliver(&apis, delivery(body, Some(&sig))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"status":"ignored"}"#);
    apis.tear_down().await;
}

#[actix_web::test]
async fn redelivered_payments_are_applied_once() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(paying_processor(500_000), MockMessenger::new()).await;
    apis.new_order(42, 500_000).await;
    let link = apis
        .links
        .create(LinkRequest::Order { order_id: OrderId(42) }, LinkOptions::default())
        .await
        .expect("Error creating link");
    let (body, sig) = charge_success(3_050_000, &link.reference, 500_000);

    let (status, res) = deliver(&apis, delivery(&body, Some(&sig))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"status":"processed"}"#);
    let (status, res) = deliver(&apis, delivery(&body, Some(&sig))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"status":"duplicate"}"#);

    let order = apis.orders.fetch(OrderId(42)).await.unwrap().unwrap();
    assert!(order.is_paid());
    let confirmations = apis.orders.notes(OrderId(42)).await.unwrap();
    assert_eq!(confirmations.iter().filter(|n| n.note.contains("confirmed. Reference")).count(), 1);
    apis.tear_down().await;
}

#[actix_web::test]
async fn deliveries_of_a_claimed_event_ask_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(paying_processor(500_000), MockMessenger::new()).await;
    apis.new_order(42, 500_000).await;
    let link = apis
        .links
        .create(LinkRequest::Order { order_id: OrderId(42) }, LinkOptions::default())
        .await
        .expect("Error creating link");
    let (body, sig) = charge_success(3_050_001, &link.reference, 500_000);
    let claim = NewWebhookEvent {
        event_id: "charge.success:3050001".into(),
        event_type: "charge.success".into(),
        payload: String::from_utf8_lossy(&body).into_owned(),
        signature: sig.clone(),
    };
    apis.db.claim_webhook_event(claim, Utc::now() - Duration::minutes(30)).await.unwrap();

    let (status, _) = deliver(&apis, delivery(&body, Some(&sig))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!apis.orders.fetch(OrderId(42)).await.unwrap().unwrap().is_paid());

    // The sweep frees the claim and the next redelivery goes through
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(apis.db.release_stale_webhook_claims(Utc::now()).await.unwrap(), 1);
    let (status, res) = deliver(&apis, delivery(&body, Some(&sig))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"status":"processed"}"#);
    assert!(apis.orders.fetch(OrderId(42)).await.unwrap().unwrap().is_paid());
    apis.tear_down().await;
}
