use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::aggregates::{ArchivedOrder, Order};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::locks::{order_lock, LockManager};
use crate::publisher::{publish_all, EventPublisher};
use crate::storage::{OrderStore, StorageError};
use crate::{BackofficeError, Result};

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkArchiveReport {
    pub archived: Vec<String>,
    pub failed: Vec<String>,
}

/// Move an order from its status table into the archive.
pub async fn archive_order<S, P>(store: &S, publisher: &P, order_number: &str, reason: Option<String>) -> Result<ArchivedOrder>
where
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let Some((table, order)) = store.find_order(order_number).await? else {
        if store.get_archived(order_number).await?.is_some() {
            return Err(BackofficeError::AlreadyArchived(order_number.to_string()));
        }
        return Err(BackofficeError::OrderNotFound(order_number.to_string()));
    };

    let archived = ArchivedOrder::new(order, table, reason);
    match store.archive_order(table, &archived).await {
        Ok(()) => {}
        Err(StorageError::Conflict(_)) if store.get_archived(order_number).await?.is_some() => {
            return Err(BackofficeError::AlreadyArchived(order_number.to_string()));
        }
        Err(e) => return Err(e.into()),
    }
    info!(%order_number, %table, "order archived");

    let event = OrderEvent::Archived { order_number: order_number.to_string(), source: table };
    publish_all(publisher, &[DomainEvent::from(event)]).await;
    Ok(archived)
}

/// Put an archived order back into the table of its status.
pub async fn restore_order<S, P>(store: &S, publisher: &P, order_number: &str) -> Result<Order>
where
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let archived = store.get_archived(order_number).await?
        .ok_or_else(|| BackofficeError::NotArchived(order_number.to_string()))?;

    let table = archived.order.table();
    store.restore_archived(&archived, table).await?;
    info!(%order_number, %table, "order restored from archive");

    let event = OrderEvent::Restored { order_number: order_number.to_string(), table };
    publish_all(publisher, &[DomainEvent::from(event)]).await;
    Ok(archived.order)
}

/// Archive every delivered order placed before `cutoff`, each under its order lock.
/// One failing or busy order does not stop the rest.
pub async fn archive_delivered_before<S, P>(store: &S, publisher: &P, locks: &LockManager, cutoff: DateTime<Utc>) -> Result<BulkArchiveReport>
where
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let mut report = BulkArchiveReport::default();
    for order in store.delivered_before(cutoff).await? {
        let number = order.order_number;
        let _guard = match locks.acquire(&order_lock(&number)).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(order_number = %number, error = %e, "order busy, not archived");
                report.failed.push(number);
                continue;
            }
        };
        match archive_order(store, publisher, &number, Some("delivered".to_string())).await {
            Ok(_) => report.archived.push(number),
            Err(e) => {
                warn!(order_number = %number, error = %e, "failed to archive delivered order");
                report.failed.push(number);
            }
        }
    }
    info!(%cutoff, archived = report.archived.len(), failed = report.failed.len(), "bulk archive finished");
    Ok(report)
}
