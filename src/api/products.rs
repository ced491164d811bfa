use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

use crate::api::{ApiResult, AppState, PageParams, Paginated, Success};
use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::publisher::publish_all;
use crate::BackofficeError;

pub async fn list_products(State(s): State<AppState>, Query(p): Query<PageParams>) -> ApiResult<Paginated<Product>> {
    let page = p.request();
    Ok(Paginated::new(s.store.list_products(page).await?, page, None))
}

pub async fn get_product(State(s): State<AppState>, Path(barcode): Path<String>) -> ApiResult<Success<Product>> {
    let product = s.store.get_product(&barcode).await?.ok_or(BackofficeError::ProductNotFound(barcode))?;
    Ok(Success::new(product))
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() { return Err(ValidationError::new("negative_cost")); }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CostUpdate {
    #[validate(custom = "non_negative")]
    pub cost: Decimal,
}

pub async fn update_cost(
    State(s): State<AppState>,
    Path(barcode): Path<String>,
    Json(update): Json<CostUpdate>,
) -> ApiResult<Success<Product>> {
    update.validate()?;
    if !s.store.set_product_cost(&barcode, update.cost).await? {
        return Err(BackofficeError::ProductNotFound(barcode).into());
    }
    info!(%barcode, cost = %update.cost, "product cost updated");
    let event = ProductEvent::CostUpdated { barcode: barcode.clone(), cost: update.cost };
    publish_all(s.publisher.as_ref(), &[DomainEvent::from(event)]).await;

    let product = s.store.get_product(&barcode).await?.ok_or(BackofficeError::ProductNotFound(barcode))?;
    Ok(Success::new(product))
}
