//! Product catalogue sync.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::aggregates::Product;
use crate::domain::events::ProductEvent;
use crate::marketplace::MarketplaceApi;
use crate::publisher::{publish_all, EventPublisher};
use crate::storage::ProductStore;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductSyncReport {
    pub fetched: usize,
    pub stored: usize,
    /// Remote products whose barcode was rejected.
    pub invalid: Vec<String>,
    pub failed_chunks: usize,
    pub failed_pages: Vec<u32>,
}

/// Refresh every product from the marketplace. Locally entered costs are kept.
pub async fn sync_products<A, S, P>(api: &A, store: &S, publisher: &P, chunk_size: usize) -> Result<ProductSyncReport>
where
    A: MarketplaceApi + ?Sized,
    S: ProductStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let pages = api.fetch_products().await?;
    let mut report = ProductSyncReport {
        fetched: pages.items.len(),
        failed_pages: pages.failed_pages,
        ..Default::default()
    };

    let mut products: Vec<Product> = Vec::with_capacity(pages.items.len());
    for remote in pages.items {
        let barcode = remote.barcode.clone();
        match remote.into_product() {
            Ok(product) => products.push(product),
            Err(e) => {
                warn!(%barcode, error = %e, "skipping remote product");
                report.invalid.push(barcode);
            }
        }
    }

    for chunk in products.chunks(chunk_size.max(1)) {
        match store.upsert_products(chunk).await {
            Ok(()) => report.stored += chunk.len(),
            Err(e) => {
                warn!(count = chunk.len(), error = %e, "failed to store product chunk");
                report.failed_chunks += 1;
            }
        }
    }

    publish_all(publisher, &[ProductEvent::Synced { count: report.stored }.into()]).await;
    info!(fetched = report.fetched, stored = report.stored, invalid = report.invalid.len(), "product sync finished");
    Ok(report)
}
