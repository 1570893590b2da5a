use actix_web::{
    http::{header::LOCATION, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use paylink_engine::SqliteDatabase;
use serde_json::{json, Value};

use super::{
    helpers::{api_scope, authorized, initializing_processor, paying_processor, send_request, verified, TestApis},
    mocks::{MockMessenger, MockProcessor},
};
use crate::routes::{CreateLinkRoute, ExpireLinkRoute, LinkStatusRoute, PayRoute};

fn configure(apis: &TestApis) -> impl FnOnce(&mut ServiceConfig) + '_ {
    move |cfg| {
        apis.app_data(cfg);
        cfg.service(PayRoute::<SqliteDatabase, MockProcessor>::new());
        api_scope(cfg, |cfg| {
            cfg.service(CreateLinkRoute::<SqliteDatabase, MockProcessor>::new())
                .service(LinkStatusRoute::<SqliteDatabase, MockProcessor>::new())
                .service(ExpireLinkRoute::<SqliteDatabase, MockProcessor>::new());
        });
    }
}

async fn create_link(apis: &TestApis, request: Value) -> (StatusCode, Value) {
    let req = authorized(TestRequest::post().uri("/api/links")).set_json(request);
    let (status, body) = send_request(req, configure(apis)).await;
    let body = serde_json::from_str(&body).unwrap_or(Value::String(body));
    (status, body)
}

#[actix_web::test]
async fn order_links_are_reused() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(paying_processor(500_000), MockMessenger::new()).await;
    apis.new_order(42, 500_000).await;
    let (status, first) = create_link(&apis, json!({"type": "order", "order_id": 42})).await;
    assert_eq!(status, StatusCode::OK);
    let reference = first["reference"].as_str().unwrap().to_string();
    assert!(first["authorization_url"].as_str().unwrap().ends_with(&reference));
    let (status, second) = create_link(&apis, json!({"type": "order", "order_id": 42})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["reference"], first["reference"]);

    let (status, _) = create_link(&apis, json!({"type": "order", "order_id": 99})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    apis.tear_down().await;
}

#[actix_web::test]
async fn custom_links_are_validated() {
    let _ = env_logger::try_init().ok();
    let apis = TestApis::new(MockProcessor::new(), MockMessenger::new()).await;
    let request = json!({"type": "custom", "amount": 100, "currency": "NGN", "email": "ada@example.com"});
    let (status, body) = create_link(&apis, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid"), "{body}");
    apis.tear_down().await;
}

#[actix_web::test]
async fn pay_redirects_until_the_link_expires() {
    let _ = env_logger::try_init().ok();
    let mut processor = initializing_processor();
    processor.expect_verify_transaction().returning(|reference| {
        let mut tx = verified(reference, 0);
        tx.status = "abandoned".into();
        tx.paid_at = None;
        Ok(tx)
    });
    let apis = TestApis::new(processor, MockMessenger::new()).await;
    apis.new_order(42, 500_000).await;
    let (_, link) = create_link(&apis, json!({"type": "order", "order_id": 42})).await;
    let reference = link["reference"].as_str().unwrap().to_string();

    let service = test::init_service(App::new().configure(configure(&apis))).await;
    let req = TestRequest::get().uri(&format!("/pay/{reference}")).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers().get(LOCATION).and_then(|v| v.to_str().ok());
    assert_eq!(location, link["authorization_url"].as_str());

    let req = authorized(TestRequest::get().uri(&format!("/api/links/{reference}")));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["processor_status"], json!("abandoned"));

    let req = authorized(TestRequest::post().uri(&format!("/api/links/{reference}/expire")));
    let (status, body) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":true"#), "{body}");

    let req = TestRequest::get().uri(&format!("/pay/{reference}"));
    let (status, _) = send_request(req, configure(&apis)).await;
    assert_eq!(status, StatusCode::GONE);
    let (status, _) = send_request(TestRequest::get().uri("/pay/PLG-nope"), configure(&apis)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    apis.tear_down().await;
}
