//! Periodic background sync.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::SyncConfig;
use crate::locks::{LockManager, ORDERS_SYNC, PRODUCTS_SYNC, RETURNS_SYNC};
use crate::marketplace::{DateWindow, MarketplaceApi};
use crate::publisher::EventPublisher;
use crate::storage::Store;
use crate::sync::{reconcile_orders, sync_products, sync_returns, ProductSyncReport, ReconcileOptions, ReconcileReport, ReturnSyncReport};
use crate::Result;

/// The three sync jobs, each run under its named lock.
#[derive(Clone)]
pub struct SyncJobs {
    pub api: Arc<dyn MarketplaceApi>,
    pub store: Arc<dyn Store>,
    pub publisher: Arc<dyn EventPublisher>,
    pub locks: Arc<LockManager>,
    pub config: SyncConfig,
}

impl SyncJobs {
    pub async fn orders(&self) -> Result<ReconcileReport> {
        let _guard = self.locks.acquire(ORDERS_SYNC).await?;
        let options = ReconcileOptions::from_config(&self.config);
        reconcile_orders(self.api.as_ref(), self.store.as_ref(), self.publisher.as_ref(), &self.locks, &options).await
    }

    pub async fn products(&self) -> Result<ProductSyncReport> {
        let _guard = self.locks.acquire(PRODUCTS_SYNC).await?;
        sync_products(self.api.as_ref(), self.store.as_ref(), self.publisher.as_ref(), self.config.product_chunk_size).await
    }

    pub async fn returns(&self) -> Result<ReturnSyncReport> {
        let _guard = self.locks.acquire(RETURNS_SYNC).await?;
        let window = DateWindow::last_days(self.config.lookback_days);
        sync_returns(self.api.as_ref(), self.store.as_ref(), self.publisher.as_ref(), window).await
    }

    /// Run every job once. Failures are logged and do not stop the other jobs.
    pub async fn run_all(&self) {
        if let Err(e) = self.orders().await { error!(error = %e, "scheduled order sync failed"); }
        if let Err(e) = self.products().await { error!(error = %e, "scheduled product sync failed"); }
        if let Err(e) = self.returns().await { error!(error = %e, "scheduled return sync failed"); }
        let pruned = self.locks.prune_idle();
        if pruned > 0 { info!(pruned, "pruned idle locks"); }
    }
}

/// Start the periodic sync. Returns `None` when no interval is configured.
pub fn spawn_scheduler(jobs: SyncJobs) -> Option<JoinHandle<()>> {
    let period = jobs.config.interval?;
    info!(?period, "starting sync scheduler");
    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            jobs.run_all().await;
        }
    }))
}
