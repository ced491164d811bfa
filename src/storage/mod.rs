//! Persistence of orders, products and returns.
//!
//! Orders live in one table per status group (see [`OrderTable`]) plus the archive.
//! Every operation that touches two tables runs in one transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{ArchivedOrder, Order, OrderStatus, OrderTable, Product, ReturnOrder};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Page selection for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE) }
    }
    pub fn limit(&self) -> i64 { self.per_page as i64 }
    pub fn offset(&self) -> i64 { ((self.page - 1) * self.per_page) as i64 }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(None, None) }
}

/// Where a locally stored order lives, and its status there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub order_number: String,
    pub table: OrderTable,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look the order up in every status table.
    async fn find_order(&self, order_number: &str) -> Result<Option<(OrderTable, Order)>>;

    async fn list_orders(&self, table: OrderTable, page: PageRequest) -> Result<Vec<Order>>;

    async fn count_orders(&self, table: OrderTable) -> Result<i64>;

    /// Keys of every order across the status tables (archive excluded).
    async fn order_keys(&self) -> Result<Vec<OrderKey>>;

    async fn upsert_order(&self, table: OrderTable, order: &Order) -> Result<()>;

    /// Write `order` into `to` and remove it from `from`, atomically.
    /// Fails with [`StorageError::Conflict`] when the order is no longer in `from`.
    async fn move_order(&self, from: OrderTable, to: OrderTable, order: &Order) -> Result<()>;

    /// Delete the given order numbers from one table. Delivered orders are never deleted.
    /// Returns the numbers that were actually removed.
    async fn delete_orders(&self, table: OrderTable, order_numbers: &[String]) -> Result<Vec<String>>;

    /// Insert the archive row and remove the order from `from`, atomically.
    /// Fails with [`StorageError::Conflict`] when the order is already archived or is not in `from`.
    async fn archive_order(&self, from: OrderTable, archived: &ArchivedOrder) -> Result<()>;

    async fn get_archived(&self, order_number: &str) -> Result<Option<ArchivedOrder>>;

    async fn list_archived(&self, page: PageRequest) -> Result<Vec<ArchivedOrder>>;

    /// Put an archived order back into `to` and drop the archive row, atomically.
    /// Fails with [`StorageError::Conflict`] when the archive row is gone.
    async fn restore_archived(&self, archived: &ArchivedOrder, to: OrderTable) -> Result<()>;

    /// Delivered orders placed before `cutoff`.
    async fn delivered_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, barcode: &str) -> Result<Option<Product>>;

    async fn list_products(&self, page: PageRequest) -> Result<Vec<Product>>;

    /// Insert or refresh products. Stored costs are never overwritten.
    async fn upsert_products(&self, products: &[Product]) -> Result<()>;

    /// Returns false when no product has that barcode.
    async fn set_product_cost(&self, barcode: &str, cost: Decimal) -> Result<bool>;

    async fn product_costs(&self, barcodes: &[String]) -> Result<HashMap<String, Decimal>>;
}

#[async_trait]
pub trait ReturnStore: Send + Sync {
    async fn get_return(&self, claim_id: &str) -> Result<Option<ReturnOrder>>;

    async fn list_returns(&self, page: PageRequest) -> Result<Vec<ReturnOrder>>;

    async fn upsert_return(&self, ret: &ReturnOrder) -> Result<()>;
}

/// Everything the service persists.
pub trait Store: OrderStore + ProductStore + ReturnStore {}

impl<T: OrderStore + ProductStore + ReturnStore> Store for T {}
