//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{CatalogStore, InMemoryStore, NewProduct, Product};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const SELLER: i64 = 1;
const BUYER: i64 = 2;
const OTHER_BUYER: i64 = 3;

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = api::create_state(store.clone(), "memory");
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

async fn list(store: &InMemoryStore, title: &str, cents: i64) -> Product {
    store
        .list_product(NewProduct::new(
            UserId::new(SELLER),
            title,
            Money::from_cents(cents),
        ))
        .await
        .unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn add(app: &Router, user: i64, product: &Product) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/cart",
        Some(user),
        Some(json!({ "product_id": product.id.as_i64() })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "memory");
}

#[tokio::test]
async fn test_cart_requires_identity() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("x-user-id"));

    let request = Request::builder()
        .uri("/cart")
        .header("x-user-id", "not-a-number")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_and_get_cart() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    let shelf = list(&store, "Bookshelf", 1500).await;

    let (status, entry) = add(&app, BUYER, &lamp).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["product_id"], lamp.id.as_i64());
    assert_eq!(entry["user_id"], BUYER);
    add(&app, BUYER, &shelf).await;

    let (status, cart) = send(&app, "GET", "/cart", Some(BUYER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total"], "25.00");
    assert!(cart["unavailable"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_add_rejections() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;

    let (status, _) = send(
        &app,
        "POST",
        "/cart",
        Some(BUYER),
        Some(json!({ "product_id": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = add(&app, SELLER, &lamp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (_, entry) = add(&app, BUYER, &lamp).await;
    let (status, json) = add(&app, BUYER, &lamp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["entry_id"], entry["id"]);

    store.mark_sold(lamp.id).await.unwrap();
    let (status, _) = add(&app, OTHER_BUYER, &lamp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_rejects_bad_product_id() {
    let (app, store) = setup();

    for body in [
        json!({}),
        json!({ "product_id": "abc" }),
        json!({ "product_id": null }),
        json!({ "product_id": 0 }),
    ] {
        let (status, json) = send(&app, "POST", "/cart", Some(BUYER), Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert!(json["error"].is_string(), "body {body}");
    }

    let (_, json) = send(&app, "POST", "/cart", Some(BUYER), Some(json!({}))).await;
    assert_eq!(json["error"], "Product ID is required");

    let (status, json) = send(&app, "POST", "/cart", Some(BUYER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Product ID is required");

    assert_eq!(store.cart_entry_count().await, 0);
}

#[tokio::test]
async fn test_remove_from_cart() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    let (_, entry) = add(&app, BUYER, &lamp).await;
    let uri = format!("/cart/{}", entry["id"]);

    let (status, _) = send(&app, "DELETE", &uri, Some(OTHER_BUYER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&app, "DELETE", &uri, Some(BUYER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Item removed from cart");

    let (status, _) = send(&app, "DELETE", &uri, Some(BUYER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/cart/abc", Some(BUYER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_and_get_order() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    let shelf = list(&store, "Bookshelf", 1500).await;
    add(&app, BUYER, &lamp).await;
    add(&app, BUYER, &shelf).await;

    let (status, receipt) = send(
        &app,
        "POST",
        "/cart/checkout",
        Some(BUYER),
        Some(json!({ "shipping_address": "1 Market Street" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(receipt.get("state").is_none());
    assert_eq!(receipt["order"]["total_amount"], "25.00");
    assert_eq!(receipt["order"]["shipping_address"], "1 Market Street");
    assert_eq!(receipt["order"]["items"].as_array().unwrap().len(), 2);

    let uri = format!("/orders/{}", receipt["order"]["id"]);
    let (status, order) = send(&app, "GET", &uri, Some(BUYER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order, receipt["order"]);

    let (status, _) = send(&app, "GET", &uri, Some(OTHER_BUYER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, cart) = send(&app, "GET", "/cart", Some(BUYER), None).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_without_body() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    add(&app, BUYER, &lamp).await;

    let (status, receipt) = send(&app, "POST", "/cart/checkout", Some(BUYER), None).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["order"]["shipping_address"], "");
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/cart/checkout",
        Some(BUYER),
        Some(json!({ "shipping_address": "1 Market Street" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_checkout_with_sold_item_reports_details() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    let shelf = list(&store, "Bookshelf", 1500).await;
    add(&app, BUYER, &lamp).await;
    add(&app, BUYER, &shelf).await;
    add(&app, OTHER_BUYER, &shelf).await;

    let (status, _) = send(&app, "POST", "/cart/checkout", Some(OTHER_BUYER), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(&app, "POST", "/cart/checkout", Some(BUYER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let unavailable = json["unavailable"].as_array().unwrap();
    assert_eq!(unavailable.len(), 1);
    assert_eq!(unavailable[0]["product_id"], shelf.id.as_i64());
    assert_eq!(unavailable[0]["reason"], "sold");

    let (_, cart) = send(&app, "GET", "/cart", Some(BUYER), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["unavailable"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_ledger_failure() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    add(&app, BUYER, &lamp).await;
    store.set_fail_on_commit(true);

    let (status, json) = send(&app, "POST", "/cart/checkout", Some(BUYER), None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].is_string());
    assert!(!store.get_product(lamp.id).await.unwrap().unwrap().sold);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup();

    let (status, _) = send(&app, "GET", "/orders/42", Some(BUYER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/orders/forty-two", Some(BUYER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    add(&app, BUYER, &lamp).await;
    send(&app, "POST", "/cart/checkout", Some(BUYER), None).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_attempts_total"));
    assert!(text.contains("cart_additions_total"));
}

#[tokio::test]
async fn test_checkout_rejects_malformed_body() {
    let (app, store) = setup();
    let lamp = list(&store, "Desk lamp", 1000).await;
    add(&app, BUYER, &lamp).await;

    let request = Request::builder()
        .method("POST")
        .uri("/cart/checkout")
        .header("x-user-id", BUYER.to_string())
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!store.get_product(lamp.id).await.unwrap().unwrap().sold);
}
