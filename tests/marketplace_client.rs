//! `MarketplaceClient` against a local axum server playing the marketplace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use seller_backoffice::config::MarketplaceConfig;
use seller_backoffice::marketplace::{
    DateWindow, LineQuantity, MarketplaceApi, MarketplaceClient, MarketplaceError, PackageStatusUpdate, WebhookRegistration,
};

const BASIC: &str = "Basic a2V5OnNlY3JldA==";

#[derive(Default)]
struct Recorded {
    page_hits: Mutex<HashMap<u32, u32>>,
    queries: Mutex<Vec<HashMap<String, String>>>,
    agents: Mutex<Vec<String>>,
    updates: Mutex<Vec<(i64, Value)>>,
    product_hits: Mutex<u32>,
}

type Shared = State<Arc<Recorded>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(BASIC)
}

async fn orders(State(rec): Shared, headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(agent) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        rec.agents.lock().unwrap().push(agent.to_string());
    }
    let page: u32 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    rec.queries.lock().unwrap().push(q);
    let hits = {
        let mut all = rec.page_hits.lock().unwrap();
        let hits = all.entry(page).or_default();
        *hits += 1;
        *hits
    };
    match page {
        // First page is throttled once, third page never recovers
        0 if hits == 1 => StatusCode::TOO_MANY_REQUESTS.into_response(),
        2 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({
            "page": page, "size": 1, "totalPages": 3, "totalElements": 3,
            "content": [{
                "id": 100 + page, "orderNumber": format!("10{page}"), "orderDate": 1709280000000i64,
                "shipmentPackageStatus": "Created", "cargoTrackingNumber": 7330001,
                "lines": [{ "id": 1000 + page, "barcode": "B1", "quantity": 1, "price": 25 }]
            }]
        }))
        .into_response(),
    }
}

async fn products(State(rec): Shared) -> StatusCode {
    *rec.product_hits.lock().unwrap() += 1;
    StatusCode::BAD_REQUEST
}

async fn package_status(State(rec): Shared, headers: HeaderMap, Path(id): Path<i64>, Json(body): Json<Value>) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    rec.updates.lock().unwrap().push((id, body));
    StatusCode::OK
}

async fn webhooks(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["authenticationType"], "API_KEY");
    Json(json!({ "id": "wh-9" }))
}

async fn start() -> (MarketplaceClient, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route("/integration/order/sellers/42/orders", get(orders))
        .route("/integration/product/sellers/42/products", get(products))
        .route("/integration/order/sellers/42/shipment-packages/:id", put(package_status))
        .route("/integration/webhook/sellers/42/webhooks", post(webhooks))
        .with_state(recorded.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = MarketplaceClient::new(MarketplaceConfig {
        base_url: format!("http://{addr}/"),
        seller_id: "42".into(),
        api_key: "key".into(),
        api_secret: "secret".into(),
        page_size: 1,
        max_concurrency: 2,
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    (client, recorded)
}

#[tokio::test]
async fn test_fetch_orders_pages_with_retry_and_partial_failure() {
    let (client, recorded) = start().await;

    let pages = client.fetch_orders(DateWindow::last_days(7)).await.unwrap();

    assert_eq!(pages.total_pages, 3);
    assert_eq!(pages.failed_pages, vec![2]);
    let mut numbers: Vec<String> = pages.items.iter().map(|p| p.order_number.clone()).collect();
    numbers.sort();
    assert_eq!(numbers, vec!["100", "101"]);
    assert_eq!(pages.items[0].cargo_tracking_number.as_deref(), Some("7330001"));

    let hits = recorded.page_hits.lock().unwrap().clone();
    assert_eq!(hits[&0], 2);
    assert_eq!(hits[&1], 1);
    assert_eq!(hits[&2], 3);

    let queries = recorded.queries.lock().unwrap();
    assert!(queries.iter().all(|q| q["orderByField"] == "PackageLastModifiedDate" && q["size"] == "1"));
    assert!(queries.iter().all(|q| q.contains_key("startDate") && q.contains_key("endDate")));
    assert!(recorded.agents.lock().unwrap().iter().all(|a| a == "42 - SelfIntegration"));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (client, recorded) = start().await;

    let err = client.fetch_products().await.unwrap_err();

    assert!(matches!(err, MarketplaceError::Status { status: 400, .. }));
    assert_eq!(*recorded.product_hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_update_package_status_body() {
    let (client, recorded) = start().await;
    let update = PackageStatusUpdate::new("Invoiced", vec![LineQuantity { line_id: 7, quantity: 2 }], Some("INV-1")).unwrap();

    client.update_package_status(3301, &update).await.unwrap();

    let updates = recorded.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    let (id, body) = &updates[0];
    assert_eq!(*id, 3301);
    assert_eq!(body["status"], "Invoiced");
    assert_eq!(body["params"]["invoiceNumber"], "INV-1");
    assert_eq!(body["lines"][0]["lineId"], 7);
    assert_eq!(body["lines"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_register_webhook() {
    let (client, _) = start().await;
    let registration = WebhookRegistration {
        url: "https://backoffice.example.com/webhooks/orders".into(),
        authentication_type: "API_KEY".into(),
        api_key: "s3cret".into(),
        subscribed_statuses: vec!["CREATED".into()],
    };

    let registered = client.register_webhook(&registration).await.unwrap();

    assert_eq!(registered.id, "wh-9");
}
