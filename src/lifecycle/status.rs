use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::marketplace::{LineQuantity, MarketplaceApi, MarketplaceError, PackageStatusUpdate};
use crate::publisher::{publish_all, EventPublisher};
use crate::storage::OrderStore;
use crate::{BackofficeError, Result};

/// Status update requested by the seller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatusChange {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: Option<String>,
}

/// Set the status of a stored order, moving it to the table of the new status.
pub async fn change_local_status<S, P>(store: &S, publisher: &P, order_number: &str, status: OrderStatus) -> Result<Order>
where
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let (table, mut order) = store.find_order(order_number).await?
        .ok_or_else(|| BackofficeError::OrderNotFound(order_number.to_string()))?;

    let from = order.status.clone();
    if !order.set_status(status) {
        return Ok(order);
    }

    let target = order.table();
    if target == table {
        store.upsert_order(table, &order).await?;
    } else {
        store.move_order(table, target, &order).await?;
    }
    info!(%order_number, %from, to = %order.status, %table, %target, "order status changed");

    let event = OrderEvent::StatusChanged { order_number: order_number.to_string(), from, to: order.status.clone() };
    publish_all(publisher, &[DomainEvent::from(event)]).await;
    Ok(order)
}

/// Send the status to the marketplace for every package of the order, then apply it locally.
///
/// Nothing is changed locally unless every package update was accepted.
pub async fn push_status<A, S, P>(api: &A, store: &S, publisher: &P, order_number: &str, change: &StatusChange) -> Result<Order>
where
    A: MarketplaceApi + ?Sized,
    S: OrderStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    let (_, order) = store.find_order(order_number).await?
        .ok_or_else(|| BackofficeError::OrderNotFound(order_number.to_string()))?;

    let packages = order.package_ids();
    if packages.is_empty() {
        return Err(MarketplaceError::NoPackages.into());
    }

    let mut status = None;
    for package_id in packages {
        let lines = order.details.iter()
            .filter(|l| l.package_id == package_id && l.line_id > 0)
            .map(|l| LineQuantity { line_id: l.line_id, quantity: l.quantity })
            .collect();
        let update = PackageStatusUpdate::new(&change.status, lines, change.invoice_number.as_deref())?;
        api.update_package_status(package_id, &update).await?;
        info!(%order_number, package_id, status = %update.status, "package status pushed");
        status = Some(update.local_status());
    }

    match status {
        Some(status) => change_local_status(store, publisher, order_number, status).await,
        None => Err(MarketplaceError::NoPackages.into()),
    }
}
