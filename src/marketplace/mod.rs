//! Marketplace REST API: wire models, the HTTP client and the trait the sync jobs talk to.

pub mod client;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use client::MarketplaceClient;
pub use models::{
    Claim, DateWindow, LineQuantity, PackageStatusUpdate, Page, RemotePages, RemoteProduct,
    ShipmentPackage, WebhookRegistered, WebhookRegistration,
};

#[derive(Error, Debug)]
pub enum MarketplaceError {
    #[error("marketplace request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("marketplace returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unsupported status for a seller update: {0}")]
    UnsupportedStatus(String),

    #[error("invoice number required to mark a package invoiced")]
    MissingInvoiceNumber,

    #[error("order has no shipment packages")]
    NoPackages,
}

/// Operations the back-office needs from the marketplace.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Shipment packages modified inside `window`, every page.
    async fn fetch_orders(&self, window: DateWindow) -> Result<RemotePages<ShipmentPackage>, MarketplaceError>;

    async fn fetch_products(&self) -> Result<RemotePages<RemoteProduct>, MarketplaceError>;

    async fn fetch_claims(&self, window: DateWindow) -> Result<RemotePages<Claim>, MarketplaceError>;

    async fn update_package_status(&self, package_id: i64, update: &PackageStatusUpdate) -> Result<(), MarketplaceError>;

    async fn register_webhook(&self, registration: &WebhookRegistration) -> Result<WebhookRegistered, MarketplaceError>;
}
