use actix_web::{http::StatusCode, test::TestRequest, web::ServiceConfig};
use paylink_engine::{
    db_types::{NewOrder, OrderId},
    SqliteDatabase,
};
use plg_common::{Currency, MinorUnits};
use serde_json::{json, Value};

use super::{
    helpers::{api_scope, authorized, send_request, TestApis},
    mocks::{MockMessenger, MockProcessor},
};
use crate::routes::{CancelOrderRoute, OrderByIdRoute, OrderRemindersRoute, RegisterOrderRoute};

fn configure(apis: &TestApis) -> impl FnOnce(&mut ServiceConfig) + '_ {
    move |cfg| {
        apis.app_data(cfg);
        api_scope(cfg, |cfg| {
            cfg.service(RegisterOrderRoute::<SqliteDatabase, MockProcessor, MockMessenger>::new())
                .service(OrderByIdRoute::<SqliteDatabase>::new())
                .service(CancelOrderRoute::<SqliteDatabase>::new())
                .service(OrderRemindersRoute::<SqliteDatabase, MockProcessor, MockMessenger>::new());
        });
    }
}

fn new_order(id: i64) -> Value {
    json!({"id": id, "amount": "5000.00", "currency": "NGN", "email": "ada@example.com", "phone": "+2348012345678"})
}

#[actix_web::test]
async fn orders_need_the_api_key() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    let req = TestRequest::post().uri("/api/orders").set_json(new_order(42));
    let (status, _) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::get().uri("/api/orders/42").insert_header(("Authorization", "Bearer guess"));
    let (status, _) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(apis.orders.fetch(OrderId(42)).await.unwrap().is_none());
    apis.tear_down().await;
}

#[actix_web::test]
async fn register_order_schedules_reminders_once() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    let req = authorized(TestRequest::post().uri("/api/orders")).set_json(new_order(42));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["created"], json!(true));
    assert_eq!(body["order"]["total"], json!(500_000));
    assert_eq!(body["reminders"].as_array().map(|r| r.len()), Some(3));

    let req = authorized(TestRequest::post().uri("/api/orders")).set_json(new_order(42));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["created"], json!(false));
    assert_eq!(body["reminders"].as_array().map(|r| r.len()), Some(3));

    let req = authorized(TestRequest::get().uri("/api/orders/42/reminders"));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let reminders: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(reminders.as_array().map(|r| r.len()), Some(3));
    apis.tear_down().await;
}

#[actix_web::test]
async fn orders_without_a_total_are_rejected() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    let order = json!({"id": 7, "currency": "NGN", "email": "ada@example.com"});
    let req = authorized(TestRequest::post().uri("/api/orders")).set_json(order);
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("total is missing"), "{body}");
    apis.tear_down().await;
}

#[actix_web::test]
async fn fetch_and_cancel_orders() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    let req = authorized(TestRequest::get().uri("/api/orders/42"));
    let (status, _) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    apis.new_order(42, 500_000).await;
    let req = authorized(TestRequest::get().uri("/api/orders/42"));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["order"]["id"], json!(42));

    let req = authorized(TestRequest::post().uri("/api/orders/42/cancel")).set_json(json!({"reason": "Out of stock"}));
    let (status, _) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let order = apis.orders.fetch(OrderId(42)).await.unwrap().unwrap();
    assert!(order.is_cancelled());
    let notes = apis.orders.notes(OrderId(42)).await.unwrap();
    assert!(notes.iter().any(|n| n.note.contains("Out of stock")));
    apis.tear_down().await;
}

#[actix_web::test]
async fn registering_again_completes_a_missing_schedule() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    // The order row was stored but scheduling never happened
    let order = NewOrder::new(OrderId(42), MinorUnits::from(500_000), Currency::Ngn, "ada@example.com")
        .with_phone("+2348012345678");
    let (_, created) = apis.orders.register(order).await.unwrap();
    assert!(created);
    assert!(apis.reminders.reminders_for_order(OrderId(42)).await.unwrap().is_empty());

    let req = authorized(TestRequest::post().uri("/api/orders")).set_json(new_order(42));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["created"], json!(false));
    assert_eq!(body["reminders"].as_array().map(|r| r.len()), Some(3));
    assert_eq!(apis.reminders.reminders_for_order(OrderId(42)).await.unwrap().len(), 3);
    apis.tear_down().await;
}

#[actix_web::test]
async fn unusable_phone_numbers_are_rejected_before_the_order_is_stored() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    let order = json!({"id": 9, "amount": "50.00", "currency": "NGN", "email": "ada@example.com", "phone": "---"});
    let req = authorized(TestRequest::post().uri("/api/orders")).set_json(order);
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("phone"), "{body}");
    assert!(apis.orders.fetch(OrderId(9)).await.unwrap().is_none());
    apis.tear_down().await;
}
