use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::marketplace::MarketplaceError;
use crate::storage::StorageError;
use crate::BackofficeError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Backoffice(#[from] BackofficeError),

    #[error("invalid request: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("webhook secret missing or wrong")]
    Unauthorized,
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self { Self::Backoffice(e.into()) }
}

impl From<MarketplaceError> for ApiError {
    fn from(e: MarketplaceError) -> Self { Self::Backoffice(e.into()) }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Backoffice(e) => match e {
                BackofficeError::OrderNotFound(_)
                | BackofficeError::ProductNotFound(_)
                | BackofficeError::ReturnNotFound(_)
                | BackofficeError::NotArchived(_) => StatusCode::NOT_FOUND,
                BackofficeError::AlreadyArchived(_) | BackofficeError::Busy(_) => StatusCode::CONFLICT,
                BackofficeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                BackofficeError::Marketplace(
                    MarketplaceError::UnsupportedStatus(_) | MarketplaceError::MissingInvoiceNumber | MarketplaceError::NoPackages,
                ) => StatusCode::UNPROCESSABLE_ENTITY,
                BackofficeError::Marketplace(_) => StatusCode::BAD_GATEWAY,
                BackofficeError::Storage(StorageError::Conflict(_)) => StatusCode::CONFLICT,
                BackofficeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}
