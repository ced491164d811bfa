//! Seller back-office for a marketplace storefront
//!
//! Keeps a local copy of the seller's orders, products and returns in step with the
//! marketplace API.
//!
//! ## Features
//! - Order reconciliation across status-keyed tables
//! - Order archive with restore
//! - Shipment status updates pushed to the marketplace
//! - Product catalogue sync with locally entered costs and profit figures
//! - Return (claim) sync
//! - Webhook receiver and registration
//! - Named locks serializing concurrent syncs

pub mod api;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod locks;
pub mod marketplace;
pub mod profit;
pub mod publisher;
pub mod storage;
pub mod sync;

use thiserror::Error;

use crate::locks::LockError;
use crate::marketplace::MarketplaceError;
use crate::storage::StorageError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BackofficeError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Return not found: {0}")]
    ReturnNotFound(String),

    #[error("Order {0} is already archived")]
    AlreadyArchived(String),

    #[error("Order {0} is not archived")]
    NotArchived(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Busy(#[from] LockError),

    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, BackofficeError>;
