//! HTTP routes.

pub mod error;
pub mod orders;
pub mod products;
pub mod returns;
pub mod sync;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{SyncConfig, WebhookConfig};
use crate::locks::LockManager;
use crate::marketplace::MarketplaceApi;
use crate::publisher::EventPublisher;
use crate::storage::{PageRequest, Store};
use crate::sync::SyncJobs;

pub use error::ApiError;

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub api: Arc<dyn MarketplaceApi>,
    pub publisher: Arc<dyn EventPublisher>,
    pub locks: Arc<LockManager>,
    pub sync: SyncConfig,
    pub webhook: WebhookConfig,
}

impl AppState {
    pub fn jobs(&self) -> SyncJobs {
        SyncJobs {
            api: self.api.clone(),
            store: self.store.clone(),
            publisher: self.publisher.clone(),
            locks: self.locks.clone(),
            config: self.sync.clone(),
        }
    }
}

/// Success body: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Json<Self> { Json(Self { success: true, data }) }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: PageRequest, total: Option<i64>) -> Json<Self> {
        Json(Self { success: true, data, page: page.page, per_page: page.per_page, total })
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest { PageRequest::new(self.page, self.per_page) }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "seller-backoffice"})) }))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/archive-delivered", post(orders::archive_delivered))
        .route("/api/v1/orders/:number", get(orders::get_order))
        .route("/api/v1/orders/:number/status", put(orders::update_status))
        .route("/api/v1/orders/:number/profit", get(orders::order_profit))
        .route("/api/v1/orders/:number/archive", post(orders::archive_order))
        .route("/api/v1/archive", get(orders::list_archived))
        .route("/api/v1/archive/:number/restore", post(orders::restore_order))
        .route("/api/v1/sync/orders", post(sync::sync_orders))
        .route("/api/v1/sync/products", post(sync::sync_products))
        .route("/api/v1/sync/returns", post(sync::sync_returns))
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/products/:barcode", get(products::get_product))
        .route("/api/v1/products/:barcode/cost", put(products::update_cost))
        .route("/api/v1/returns", get(returns::list_returns))
        .route("/api/v1/returns/:claim_id", get(returns::get_return))
        .route("/api/v1/webhooks/register", post(webhooks::register))
        .route("/webhooks/orders", post(webhooks::receive_order))
        .with_state(state)
}
