//! Domain events
use crate::domain::aggregates::{OrderStatus, OrderTable};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Product(ProductEvent),
    Return(ReturnEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Imported { order_number: String, status: OrderStatus },
    Updated { order_number: String },
    StatusChanged { order_number: String, from: OrderStatus, to: OrderStatus },
    Removed { order_number: String, table: OrderTable },
    Archived { order_number: String, source: OrderTable },
    Restored { order_number: String, table: OrderTable },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Synced { count: usize },
    CostUpdated { barcode: String, cost: Decimal },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReturnEvent {
    Received { claim_id: String, order_number: String },
    Updated { claim_id: String, status: String },
}

impl DomainEvent {
    /// Subject suffix, e.g. `orders.status_changed`.
    pub fn subject(&self) -> String {
        let (kind, name) = match self {
            Self::Order(e) => ("orders", match e {
                OrderEvent::Imported { .. } => "imported",
                OrderEvent::Updated { .. } => "updated",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::Removed { .. } => "removed",
                OrderEvent::Archived { .. } => "archived",
                OrderEvent::Restored { .. } => "restored",
            }),
            Self::Product(e) => ("products", match e {
                ProductEvent::Synced { .. } => "synced",
                ProductEvent::CostUpdated { .. } => "cost_updated",
            }),
            Self::Return(e) => ("returns", match e {
                ReturnEvent::Received { .. } => "received",
                ReturnEvent::Updated { .. } => "updated",
            }),
        };
        format!("{kind}.{name}")
    }
}

impl From<OrderEvent> for DomainEvent {
    fn from(e: OrderEvent) -> Self { Self::Order(e) }
}

impl From<ProductEvent> for DomainEvent {
    fn from(e: ProductEvent) -> Self { Self::Product(e) }
}

impl From<ReturnEvent> for DomainEvent {
    fn from(e: ReturnEvent) -> Self { Self::Return(e) }
}
