//! Order reconciliation.
//!
//! One run fetches every page of shipment packages for the lookback window, folds the
//! packages into orders, writes each order into the table of its status, and finally
//! removes local orders the marketplace no longer reports. Delivered orders are never
//! removed, and the removal phase is skipped outright when any remote page failed.
//!
//! Every write to an order happens under that order's named lock, the same lock the
//! webhook and the per-order routes take.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::domain::aggregates::{Order, OrderTable};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::locks::{order_lock, LockManager, NamedLockGuard};
use crate::marketplace::{DateWindow, MarketplaceApi, ShipmentPackage};
use crate::publisher::{publish_all, EventPublisher};
use crate::storage::{OrderKey, OrderStore};
use crate::Result;

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub window: DateWindow,
    pub delete_missing: bool,
    pub delete_chunk_size: usize,
}

impl ReconcileOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            window: DateWindow::last_days(config.lookback_days),
            delete_missing: config.delete_missing,
            delete_chunk_size: config.delete_chunk_size,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub run_id: Uuid,
    pub fetched_packages: usize,
    pub remote_orders: usize,
    pub inserted: usize,
    pub updated: usize,
    pub moved: usize,
    pub unchanged: usize,
    pub skipped_archived: usize,
    pub deleted: u64,
    pub failed: Vec<String>,
    pub failed_pages: Vec<u32>,
    pub deletion_skipped: bool,
}

impl ReconcileReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Moved => self.moved += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Archived => self.skipped_archived += 1,
        }
    }
}

/// What happened to one remote order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Moved,
    Unchanged,
    /// The order sits in the archive and was left there.
    Archived,
}

/// Fold packages into one order per order number.
pub fn group_packages(packages: Vec<ShipmentPackage>) -> BTreeMap<String, Order> {
    let mut orders: BTreeMap<String, Order> = BTreeMap::new();
    for package in packages {
        let order = package.into_order();
        match orders.get_mut(&order.order_number) {
            Some(existing) => { existing.absorb(order); }
            None => { orders.insert(order.order_number.clone(), order); }
        }
    }
    orders
}

pub async fn reconcile_orders<A, S, P>(
    api: &A,
    store: &S,
    publisher: &P,
    locks: &LockManager,
    options: &ReconcileOptions,
) -> Result<ReconcileReport>
where
    A: MarketplaceApi + ?Sized,
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let mut report = ReconcileReport { run_id: Uuid::now_v7(), ..Default::default() };
    let run_id = report.run_id;
    info!(%run_id, start = %options.window.start, end = %options.window.end, "reconciling orders");

    let pages = api.fetch_orders(options.window).await?;
    report.fetched_packages = pages.items.len();
    report.failed_pages = pages.failed_pages.clone();
    let complete = pages.is_complete();

    let local_keys = store.order_keys().await?;
    let remote = group_packages(pages.items);
    report.remote_orders = remote.len();
    let remote_numbers: HashSet<String> = remote.keys().cloned().collect();

    for (number, order) in remote {
        let _guard = match locks.acquire(&order_lock(&number)).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(%run_id, order_number = %number, error = %e, "order busy, skipped");
                report.failed.push(number);
                continue;
            }
        };
        match upsert_remote_order(store, order).await {
            Ok((outcome, events)) => {
                report.record(outcome);
                publish_all(publisher, &events).await;
            }
            Err(e) => {
                warn!(%run_id, order_number = %number, error = %e, "failed to store remote order");
                report.failed.push(number);
            }
        }
    }

    if !complete {
        warn!(%run_id, failed_pages = ?report.failed_pages, "remote listing incomplete, not deleting missing orders");
        report.deletion_skipped = true;
    } else if !options.delete_missing {
        report.deletion_skipped = true;
    } else {
        let stale = stale_keys(&local_keys, &remote_numbers, options.window.start);
        let chunk_size = options.delete_chunk_size.max(1);
        for (table, numbers) in stale {
            for chunk in numbers.chunks(chunk_size) {
                delete_chunk(store, publisher, locks, table, chunk, &mut report).await;
            }
        }
    }

    info!(
        %run_id,
        inserted = report.inserted,
        updated = report.updated,
        moved = report.moved,
        unchanged = report.unchanged,
        deleted = report.deleted,
        failed = report.failed.len(),
        "order reconciliation finished"
    );
    Ok(report)
}

/// Delete one chunk of stale orders from `table`. Orders whose lock is busy are left alone.
async fn delete_chunk<S, P>(store: &S, publisher: &P, locks: &LockManager, table: OrderTable, chunk: &[String], report: &mut ReconcileReport)
where
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let run_id = report.run_id;
    let mut guards: Vec<NamedLockGuard> = Vec::with_capacity(chunk.len());
    let mut numbers: Vec<String> = Vec::with_capacity(chunk.len());
    for number in chunk {
        match locks.acquire(&order_lock(number)).await {
            Ok(guard) => {
                guards.push(guard);
                numbers.push(number.clone());
            }
            Err(e) => {
                warn!(%run_id, order_number = %number, error = %e, "order busy, not deleted");
                report.failed.push(number.clone());
            }
        }
    }
    if numbers.is_empty() {
        return;
    }

    match store.delete_orders(table, &numbers).await {
        Ok(removed) => {
            report.deleted += removed.len() as u64;
            let events: Vec<DomainEvent> = removed.into_iter()
                .map(|order_number| OrderEvent::Removed { order_number, table }.into())
                .collect();
            publish_all(publisher, &events).await;
        }
        Err(e) => {
            warn!(%run_id, %table, count = numbers.len(), error = %e, "failed to delete stale orders");
            report.failed.extend(numbers);
        }
    }
}

/// Local orders inside the window that the marketplace did not report, grouped by table.
///
/// Delivered orders are kept whichever table they sit in.
fn stale_keys(local: &[OrderKey], remote: &HashSet<String>, since: DateTime<Utc>) -> BTreeMap<OrderTable, Vec<String>> {
    let mut stale: BTreeMap<OrderTable, Vec<String>> = BTreeMap::new();
    for key in local {
        if remote.contains(&key.order_number)
            || key.status.is_delivered()
            || key.table == OrderTable::Delivered
            || key.order_date < since
        {
            continue;
        }
        stale.entry(key.table).or_default().push(key.order_number.clone());
    }
    stale
}

/// Merge one remote order into the store.
pub async fn upsert_remote_order<S: OrderStore + ?Sized>(store: &S, remote: Order) -> Result<(UpsertOutcome, Vec<DomainEvent>)> {
    let number = remote.order_number.clone();
    let Some((table, mut local)) = store.find_order(&number).await? else {
        if store.get_archived(&number).await?.is_some() {
            return Ok((UpsertOutcome::Archived, vec![]));
        }
        let status = remote.status.clone();
        store.upsert_order(remote.table(), &remote).await?;
        return Ok((UpsertOutcome::Inserted, vec![OrderEvent::Imported { order_number: number, status }.into()]));
    };

    let from = local.status.clone();
    if !local.absorb(remote) {
        return Ok((UpsertOutcome::Unchanged, vec![]));
    }

    let mut events: Vec<DomainEvent> = vec![];
    if local.status != from {
        events.push(OrderEvent::StatusChanged { order_number: number.clone(), from, to: local.status.clone() }.into());
    }

    let target = local.table();
    if target != table {
        store.move_order(table, target, &local).await?;
        Ok((UpsertOutcome::Moved, events))
    } else {
        store.upsert_order(table, &local).await?;
        events.push(OrderEvent::Updated { order_number: number }.into());
        Ok((UpsertOutcome::Updated, events))
    }
}

/// Store a single package pushed by the marketplace webhook.
pub async fn apply_package<S, P>(store: &S, publisher: &P, package: ShipmentPackage) -> Result<UpsertOutcome>
where
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let (outcome, events) = upsert_remote_order(store, package.into_order()).await?;
    publish_all(publisher, &events).await;
    Ok(outcome)
}
