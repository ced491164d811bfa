//! In-memory store for tests and local runs without a database.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::aggregates::{ArchivedOrder, Order, OrderTable, Product, ReturnOrder};
use crate::storage::{OrderKey, OrderStore, PageRequest, ProductStore, Result, ReturnStore, StorageError};

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderTable, BTreeMap<String, Order>>,
    archive: BTreeMap<String, ArchivedOrder>,
    products: BTreeMap<String, Product>,
    returns: BTreeMap<String, ReturnOrder>,
}

impl Tables {
    fn table(&mut self, table: OrderTable) -> &mut BTreeMap<String, Order> {
        self.orders.entry(table).or_default()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing_orders: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write of `order_number` fail.
    pub async fn fail_writes_for(&self, order_number: &str) {
        self.failing_orders.write().await.insert(order_number.to_string());
    }

    /// Order numbers stored in one table, sorted.
    pub async fn order_numbers(&self, table: OrderTable) -> Vec<String> {
        self.tables.read().await.orders.get(&table).map(|t| t.keys().cloned().collect()).unwrap_or_default()
    }

    pub async fn archive_len(&self) -> usize {
        self.tables.read().await.archive.len()
    }

    async fn check_writable(&self, order_number: &str) -> Result<()> {
        if self.failing_orders.read().await.contains(order_number) {
            return Err(StorageError::Unavailable(format!("writes to order {order_number} are failing")));
        }
        Ok(())
    }
}

fn page_of<T: Clone>(items: impl Iterator<Item = T>, page: PageRequest) -> Vec<T> {
    items.skip(page.offset() as usize).take(page.limit() as usize).collect()
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_order(&self, order_number: &str) -> Result<Option<(OrderTable, Order)>> {
        let tables = self.tables.read().await;
        Ok(OrderTable::ALL.into_iter().find_map(|table| {
            tables.orders.get(&table).and_then(|t| t.get(order_number)).map(|o| (table, o.clone()))
        }))
    }

    async fn list_orders(&self, table: OrderTable, page: PageRequest) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables.orders.get(&table).map(|t| t.values().cloned().collect()).unwrap_or_default();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(page_of(orders.into_iter(), page))
    }

    async fn count_orders(&self, table: OrderTable) -> Result<i64> {
        Ok(self.tables.read().await.orders.get(&table).map(|t| t.len() as i64).unwrap_or(0))
    }

    async fn order_keys(&self) -> Result<Vec<OrderKey>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().flat_map(|(table, rows)| rows.values().map(move |o| OrderKey {
            order_number: o.order_number.clone(),
            table: *table,
            status: o.status.clone(),
            order_date: o.order_date,
        })).collect())
    }

    async fn upsert_order(&self, table: OrderTable, order: &Order) -> Result<()> {
        self.check_writable(&order.order_number).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.table(table);
        let mut row = order.clone();
        if let Some(existing) = rows.get(&order.order_number) { row.created_at = existing.created_at; }
        rows.insert(order.order_number.clone(), row);
        Ok(())
    }

    async fn move_order(&self, from: OrderTable, to: OrderTable, order: &Order) -> Result<()> {
        self.check_writable(&order.order_number).await?;
        let mut tables = self.tables.write().await;
        if from != to && tables.table(from).remove(&order.order_number).is_none() {
            return Err(StorageError::Conflict(format!("order {} is not in {from}", order.order_number)));
        }
        tables.table(to).insert(order.order_number.clone(), order.clone());
        Ok(())
    }

    async fn delete_orders(&self, table: OrderTable, order_numbers: &[String]) -> Result<Vec<String>> {
        for number in order_numbers {
            self.check_writable(number).await?;
        }
        let mut tables = self.tables.write().await;
        let rows = tables.table(table);
        let mut removed = Vec::new();
        for number in order_numbers {
            if rows.get(number).is_some_and(|o| !o.status.is_delivered()) {
                rows.remove(number);
                removed.push(number.clone());
            }
        }
        Ok(removed)
    }

    async fn archive_order(&self, from: OrderTable, archived: &ArchivedOrder) -> Result<()> {
        let number = &archived.order.order_number;
        self.check_writable(number).await?;
        let mut tables = self.tables.write().await;
        if tables.archive.contains_key(number) {
            return Err(StorageError::Conflict(format!("order {number} is already archived")));
        }
        if tables.table(from).remove(number).is_none() {
            return Err(StorageError::Conflict(format!("order {number} is not in {from}")));
        }
        tables.archive.insert(number.clone(), archived.clone());
        Ok(())
    }

    async fn get_archived(&self, order_number: &str) -> Result<Option<ArchivedOrder>> {
        Ok(self.tables.read().await.archive.get(order_number).cloned())
    }

    async fn list_archived(&self, page: PageRequest) -> Result<Vec<ArchivedOrder>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ArchivedOrder> = tables.archive.values().cloned().collect();
        rows.sort_by(|a, b| b.archived_at.cmp(&a.archived_at));
        Ok(page_of(rows.into_iter(), page))
    }

    async fn restore_archived(&self, archived: &ArchivedOrder, to: OrderTable) -> Result<()> {
        let number = &archived.order.order_number;
        self.check_writable(number).await?;
        let mut tables = self.tables.write().await;
        if tables.archive.remove(number).is_none() {
            return Err(StorageError::Conflict(format!("order {number} is not archived")));
        }
        tables.table(to).insert(number.clone(), archived.order.clone());
        Ok(())
    }

    async fn delivered_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&OrderTable::Delivered)
            .map(|t| t.values().filter(|o| o.order_date < cutoff).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get_product(&self, barcode: &str) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(barcode).cloned())
    }

    async fn list_products(&self, page: PageRequest) -> Result<Vec<Product>> {
        Ok(page_of(self.tables.read().await.products.values().cloned(), page))
    }

    async fn upsert_products(&self, products: &[Product]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for product in products {
            match tables.products.get_mut(product.barcode.as_str()) {
                Some(existing) => existing.apply_remote(product.clone()),
                None => { tables.products.insert(product.barcode.to_string(), product.clone()); }
            }
        }
        Ok(())
    }

    async fn set_product_cost(&self, barcode: &str, cost: Decimal) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.products.get_mut(barcode) {
            Some(product) => {
                product.set_cost(cost).map_err(|e| StorageError::Conflict(e.to_string()))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn product_costs(&self, barcodes: &[String]) -> Result<HashMap<String, Decimal>> {
        let tables = self.tables.read().await;
        Ok(barcodes.iter()
            .filter_map(|b| tables.products.get(b).and_then(|p| p.cost).map(|c| (b.clone(), c)))
            .collect())
    }
}

#[async_trait]
impl ReturnStore for MemoryStore {
    async fn get_return(&self, claim_id: &str) -> Result<Option<ReturnOrder>> {
        Ok(self.tables.read().await.returns.get(claim_id).cloned())
    }

    async fn list_returns(&self, page: PageRequest) -> Result<Vec<ReturnOrder>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ReturnOrder> = tables.returns.values().cloned().collect();
        rows.sort_by(|a, b| b.claim_date.cmp(&a.claim_date));
        Ok(page_of(rows.into_iter(), page))
    }

    async fn upsert_return(&self, ret: &ReturnOrder) -> Result<()> {
        self.tables.write().await.returns.insert(ret.claim_id.clone(), ret.clone());
        Ok(())
    }
}
