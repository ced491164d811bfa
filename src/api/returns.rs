use axum::extract::{Path, Query, State};

use crate::api::{ApiResult, AppState, PageParams, Paginated, Success};
use crate::domain::aggregates::ReturnOrder;
use crate::BackofficeError;

pub async fn list_returns(State(s): State<AppState>, Query(p): Query<PageParams>) -> ApiResult<Paginated<ReturnOrder>> {
    let page = p.request();
    Ok(Paginated::new(s.store.list_returns(page).await?, page, None))
}

pub async fn get_return(State(s): State<AppState>, Path(claim_id): Path<String>) -> ApiResult<Success<ReturnOrder>> {
    let ret = s.store.get_return(&claim_id).await?.ok_or(BackofficeError::ReturnNotFound(claim_id))?;
    Ok(Success::new(ret))
}
