mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use seller_backoffice::api::{router, AppState};
use seller_backoffice::config::{SyncConfig, WebhookConfig};
use seller_backoffice::domain::aggregates::{Order, OrderLine, OrderStatus, OrderTable};
use seller_backoffice::locks::{LockManager, ORDERS_SYNC};
use seller_backoffice::publisher::RecordingPublisher;
use seller_backoffice::storage::{MemoryStore, OrderStore, ProductStore};

use common::{package, product, FakeMarketplace};

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    api: Arc<FakeMarketplace>,
    locks: Arc<LockManager>,
}

fn harness(secret: Option<&str>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(FakeMarketplace::default());
    let locks = Arc::new(LockManager::new(Duration::from_millis(50)));
    let state = AppState {
        store: store.clone(),
        api: api.clone(),
        publisher: Arc::new(RecordingPublisher::new()),
        locks: locks.clone(),
        sync: SyncConfig::default(),
        webhook: WebhookConfig { secret: secret.map(String::from), header: "x-api-key".into() },
    };
    Harness { app: router(state), store, api, locks }
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = match body {
        Some(body) => request.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn delivered_order(number: &str) -> Order {
    Order::new(number, OrderStatus::Delivered, Utc::now()).with_line(OrderLine {
        line_id: 1, package_id: 9, barcode: "B1".into(), merchant_sku: "S1".into(), product_name: "Mug".into(),
        color: None, size: None, quantity: 2, price: Decimal::new(100, 0), amount: Decimal::new(200, 0),
        commission_rate: Some(Decimal::new(10, 0)), line_status: None,
    })
}

#[tokio::test]
async fn test_health() {
    let h = harness(None);
    let (status, body) = call(&h.app, Method::GET, "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_webhook_requires_shared_secret() {
    let h = harness(Some("s3cret"));
    let payload = serde_json::to_value(package(1, "1001", "Created", "B1", 1)).unwrap();

    let (status, body) = call(&h.app, Method::POST, "/webhooks/orders", Some(payload.clone()), &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = call(&h.app, Method::POST, "/webhooks/orders", Some(payload.clone()), &[("x-api-key", "wrong")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.store.find_order("1001").await.unwrap().is_none());

    let (status, body) = call(&h.app, Method::POST, "/webhooks/orders", Some(payload), &[("x-api-key", "s3cret")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "inserted");
    assert_eq!(h.store.order_numbers(OrderTable::Created).await, vec!["1001"]);
}

#[tokio::test]
async fn test_webhook_refused_without_configured_secret() {
    let h = harness(None);
    let payload = serde_json::to_value(package(1, "1001", "Created", "B1", 1)).unwrap();
    let (status, _) = call(&h.app, Method::POST, "/webhooks/orders", Some(payload), &[("x-api-key", "")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_busy_returns_conflict() {
    let h = harness(None);
    let _held = h.locks.acquire(ORDERS_SYNC).await.unwrap();

    let (status, body) = call(&h.app, Method::POST, "/api/v1/sync/orders", None, &[]).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_sync_orders_route() {
    let h = harness(None);
    *h.api.packages.lock().await = vec![package(1, "1001", "Shipped", "B1", 1)];

    let (status, body) = call(&h.app, Method::POST, "/api/v1/sync/orders", None, &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["inserted"], 1);
    let (status, body) = call(&h.app, Method::GET, "/api/v1/orders?table=shipped", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["order_number"], "1001");
}

#[tokio::test]
async fn test_unreachable_marketplace_is_bad_gateway() {
    let h = harness(None);
    *h.api.unreachable.lock().await = true;
    let (status, body) = call(&h.app, Method::POST, "/api/v1/sync/products", None, &[]).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_product_cost_entry() {
    let h = harness(None);
    let mug = product("B1", "Mug", "120.00").into_product().unwrap();
    h.store.upsert_products(&[mug]).await.unwrap();

    let (status, body) = call(&h.app, Method::PUT, "/api/v1/products/B1/cost", Some(json!({"cost": "45.5"})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cost"], "45.5");

    let (status, _) = call(&h.app, Method::PUT, "/api/v1/products/B1/cost", Some(json!({"cost": "-1"})), &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = call(&h.app, Method::PUT, "/api/v1/products/NOPE/cost", Some(json!({"cost": "1"})), &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_order_profit_route() {
    let h = harness(None);
    h.store.upsert_order(OrderTable::Delivered, &delivered_order("1001")).await.unwrap();
    let mug = product("B1", "Mug", "100.00").into_product().unwrap();
    h.store.upsert_products(&[mug]).await.unwrap();
    h.store.set_product_cost("B1", Decimal::new(30, 0)).await.unwrap();

    let (status, body) = call(&h.app, Method::GET, "/api/v1/orders/1001/profit", None, &[]).await;

    assert_eq!(status, StatusCode::OK);
    let profit: Decimal = body["data"]["profit"].as_str().unwrap().parse().unwrap();
    assert_eq!(profit, Decimal::new(120, 0));
    assert_eq!(body["data"]["missing_costs"], json!([]));
}

#[tokio::test]
async fn test_archive_routes() {
    let h = harness(None);
    h.store.upsert_order(OrderTable::Delivered, &delivered_order("1001")).await.unwrap();

    let (status, body) = call(&h.app, Method::POST, "/api/v1/orders/1001/archive", Some(json!({"reason": "done"})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source_table"], "delivered");

    let (status, _) = call(&h.app, Method::POST, "/api/v1/orders/1001/archive", None, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&h.app, Method::GET, "/api/v1/orders/1001", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (_, body) = call(&h.app, Method::GET, "/api/v1/archive", None, &[]).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, _) = call(&h.app, Method::POST, "/api/v1/archive/1001/restore", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&h.app, Method::GET, "/api/v1/orders/1001", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["table"], "delivered");
}

#[tokio::test]
async fn test_status_update_validation() {
    let h = harness(None);
    let (status, _) = call(&h.app, Method::PUT, "/api/v1/orders/1001/status", Some(json!({"status": ""})), &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&h.app, Method::PUT, "/api/v1/orders/1001/status", Some(json!({"status": "Picking"})), &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_webhook_uses_configured_secret() {
    let h = harness(Some("s3cret"));
    let (status, body) = call(
        &h.app, Method::POST, "/api/v1/webhooks/register",
        Some(json!({"url": "https://backoffice.example.com/webhooks/orders"})), &[],
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "wh-1");
    let registrations = h.api.registrations.lock().await;
    assert_eq!(registrations[0].api_key, "s3cret");
    assert_eq!(registrations[0].subscribed_statuses.len(), 7);

    let (status, _) = call(&h.app, Method::POST, "/api/v1/webhooks/register", Some(json!({"url": "not a url"})), &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
