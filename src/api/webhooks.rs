//! Webhook registration and the order webhook receiver.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::api::{ApiError, ApiResult, AppState, Success};
use crate::locks::order_lock;
use crate::marketplace::{ShipmentPackage, WebhookRegistered, WebhookRegistration};
use crate::sync::{apply_package, UpsertOutcome};
use crate::BackofficeError;

const DEFAULT_STATUSES: [&str; 7] = ["CREATED", "PICKING", "INVOICED", "SHIPPED", "CANCELLED", "DELIVERED", "UNDELIVERED"];

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(url)]
    pub url: String,
    #[validate(length(min = 1))]
    pub statuses: Option<Vec<String>>,
}

pub async fn register(State(s): State<AppState>, Json(request): Json<RegisterRequest>) -> ApiResult<Success<WebhookRegistered>> {
    request.validate()?;
    let secret = s.webhook.secret.clone()
        .ok_or_else(|| BackofficeError::Validation("no webhook secret configured".to_string()))?;
    let registration = WebhookRegistration {
        url: request.url,
        authentication_type: "API_KEY".to_string(),
        api_key: secret,
        subscribed_statuses: request.statuses
            .unwrap_or_else(|| DEFAULT_STATUSES.iter().map(|s| s.to_string()).collect()),
    };
    let registered = s.api.register_webhook(&registration).await?;
    info!(id = %registered.id, url = %registration.url, "webhook registered");
    Ok(Success::new(registered))
}

#[derive(Debug, Serialize)]
pub struct Received {
    pub order_number: String,
    pub outcome: UpsertOutcome,
}

/// Refused unless the configured header carries the shared secret.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(secret) = state.webhook.secret.as_deref() else {
        warn!("webhook delivery refused: no secret configured");
        return Err(ApiError::Unauthorized);
    };
    match headers.get(state.webhook.header.as_str()).and_then(|v| v.to_str().ok()) {
        Some(given) if given == secret => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

pub async fn receive_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Success<Received>> {
    authorize(&s, &headers)?;
    let package: ShipmentPackage = serde_json::from_slice(&body)
        .map_err(|e| BackofficeError::Validation(format!("unreadable shipment package: {e}")))?;
    let order_number = package.order_number.clone();
    let _guard = s.locks.acquire(&order_lock(&order_number)).await.map_err(BackofficeError::from)?;
    let outcome = apply_package(s.store.as_ref(), s.publisher.as_ref(), package).await?;
    info!(%order_number, ?outcome, "webhook package applied");
    Ok(Success::new(Received { order_number, outcome }))
}
