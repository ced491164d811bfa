use axum::extract::State;

use crate::api::{ApiResult, AppState, Success};
use crate::sync::{ProductSyncReport, ReconcileReport, ReturnSyncReport};

pub async fn sync_orders(State(s): State<AppState>) -> ApiResult<Success<ReconcileReport>> {
    Ok(Success::new(s.jobs().orders().await?))
}

pub async fn sync_products(State(s): State<AppState>) -> ApiResult<Success<ProductSyncReport>> {
    Ok(Success::new(s.jobs().products().await?))
}

pub async fn sync_returns(State(s): State<AppState>) -> ApiResult<Success<ReturnSyncReport>> {
    Ok(Success::new(s.jobs().returns().await?))
}
