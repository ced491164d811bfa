//! Return (claim) sync.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::aggregates::ReturnOrder;
use crate::domain::events::{DomainEvent, ReturnEvent};
use crate::marketplace::{DateWindow, MarketplaceApi};
use crate::publisher::{publish_all, EventPublisher};
use crate::storage::ReturnStore;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReturnSyncReport {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: Vec<String>,
    pub failed_pages: Vec<u32>,
}

pub async fn sync_returns<A, S, P>(api: &A, store: &S, publisher: &P, window: DateWindow) -> Result<ReturnSyncReport>
where
    A: MarketplaceApi + ?Sized,
    S: ReturnStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let pages = api.fetch_claims(window).await?;
    let mut report = ReturnSyncReport {
        fetched: pages.items.len(),
        failed_pages: pages.failed_pages,
        ..Default::default()
    };

    for claim in pages.items {
        let remote = claim.into_return_order();
        let claim_id = remote.claim_id.clone();
        match store_return(store, remote).await {
            Ok(Some(event)) => {
                match &event {
                    ReturnEvent::Received { .. } => report.inserted += 1,
                    ReturnEvent::Updated { .. } => report.updated += 1,
                }
                publish_all(publisher, &[DomainEvent::from(event)]).await;
            }
            Ok(None) => report.unchanged += 1,
            Err(e) => {
                warn!(%claim_id, error = %e, "failed to store claim");
                report.failed.push(claim_id);
            }
        }
    }

    info!(fetched = report.fetched, inserted = report.inserted, updated = report.updated, "return sync finished");
    Ok(report)
}

async fn store_return<S: ReturnStore + ?Sized>(store: &S, remote: ReturnOrder) -> Result<Option<ReturnEvent>> {
    match store.get_return(&remote.claim_id).await? {
        None => {
            store.upsert_return(&remote).await?;
            Ok(Some(ReturnEvent::Received { claim_id: remote.claim_id, order_number: remote.order_number }))
        }
        Some(mut local) => {
            if !local.apply_remote(remote) {
                return Ok(None);
            }
            store.upsert_return(&local).await?;
            Ok(Some(ReturnEvent::Updated { claim_id: local.claim_id, status: local.status }))
        }
    }
}
