use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::{ApiResult, AppState, PageParams, Paginated, Success};
use crate::domain::aggregates::{ArchivedOrder, Order, OrderTable};
use crate::lifecycle::{self, BulkArchiveReport, StatusChange};
use crate::locks::order_lock;
use crate::profit::{self, OrderProfit};
use crate::BackofficeError;

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub table: Option<OrderTable>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub table: OrderTable,
    #[serde(flatten)]
    pub order: Order,
}

pub async fn list_orders(State(s): State<AppState>, Query(p): Query<OrderListParams>) -> ApiResult<Paginated<Order>> {
    let table = p.table.unwrap_or(OrderTable::Created);
    let page = PageParams { page: p.page, per_page: p.per_page }.request();
    let orders = s.store.list_orders(table, page).await?;
    let total = s.store.count_orders(table).await?;
    Ok(Paginated::new(orders, page, Some(total)))
}

pub async fn get_order(State(s): State<AppState>, Path(number): Path<String>) -> ApiResult<Success<OrderView>> {
    let (table, order) = s.store.find_order(&number).await?.ok_or(BackofficeError::OrderNotFound(number))?;
    Ok(Success::new(OrderView { table, order }))
}

pub async fn update_status(
    State(s): State<AppState>,
    Path(number): Path<String>,
    Json(change): Json<StatusChange>,
) -> ApiResult<Success<Order>> {
    change.validate()?;
    let _guard = s.locks.acquire(&order_lock(&number)).await.map_err(BackofficeError::from)?;
    let order = lifecycle::push_status(s.api.as_ref(), s.store.as_ref(), s.publisher.as_ref(), &number, &change).await?;
    Ok(Success::new(order))
}

pub async fn order_profit(State(s): State<AppState>, Path(number): Path<String>) -> ApiResult<Success<OrderProfit>> {
    let (_, order) = s.store.find_order(&number).await?.ok_or(BackofficeError::OrderNotFound(number))?;
    let barcodes: Vec<String> = order.details.iter().map(|l| l.barcode.clone()).collect();
    let costs = s.store.product_costs(&barcodes).await?;
    Ok(Success::new(profit::order_profit(&order, &costs)))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ArchiveRequest {
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

pub async fn archive_order(
    State(s): State<AppState>,
    Path(number): Path<String>,
    body: Option<Json<ArchiveRequest>>,
) -> ApiResult<Success<ArchivedOrder>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let _guard = s.locks.acquire(&order_lock(&number)).await.map_err(BackofficeError::from)?;
    let archived = lifecycle::archive_order(s.store.as_ref(), s.publisher.as_ref(), &number, request.reason).await?;
    Ok(Success::new(archived))
}

pub async fn list_archived(State(s): State<AppState>, Query(p): Query<PageParams>) -> ApiResult<Paginated<ArchivedOrder>> {
    let page = p.request();
    Ok(Paginated::new(s.store.list_archived(page).await?, page, None))
}

pub async fn restore_order(State(s): State<AppState>, Path(number): Path<String>) -> ApiResult<Success<Order>> {
    let _guard = s.locks.acquire(&order_lock(&number)).await.map_err(BackofficeError::from)?;
    let order = lifecycle::restore_order(s.store.as_ref(), s.publisher.as_ref(), &number).await?;
    Ok(Success::new(order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ArchiveDeliveredRequest {
    /// Archive delivered orders placed more than this many days ago.
    #[validate(range(min = 1, max = 3650))]
    pub older_than_days: i64,
}

pub async fn archive_delivered(
    State(s): State<AppState>,
    Json(request): Json<ArchiveDeliveredRequest>,
) -> ApiResult<Success<BulkArchiveReport>> {
    request.validate()?;
    let cutoff = Utc::now() - Duration::days(request.older_than_days);
    let report = lifecycle::archive_delivered_before(s.store.as_ref(), s.publisher.as_ref(), &s.locks, cutoff).await?;
    Ok(Success::new(report))
}
