//! PostgreSQL store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres};

use crate::domain::aggregates::{ArchivedOrder, Order, OrderLine, OrderStatus, OrderTable, Product, ReturnOrder, ReturnProduct};
use crate::domain::value_objects::Barcode;
use crate::storage::{OrderKey, OrderStore, PageRequest, ProductStore, Result, ReturnStore, StorageError};

const ORDER_COLUMNS: &str = "order_number, status, order_date, customer_name, cargo_tracking_number, cargo_provider, \
    amount, remote_modified_at, merchant_skus, product_barcodes, product_names, product_colors, product_sizes, \
    quantities, details, created_at, updated_at";

const ORDER_PLACEHOLDERS: &str = "$1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17";

const ORDER_UPDATES: &str = "status = EXCLUDED.status, order_date = EXCLUDED.order_date, \
    customer_name = EXCLUDED.customer_name, cargo_tracking_number = EXCLUDED.cargo_tracking_number, \
    cargo_provider = EXCLUDED.cargo_provider, amount = EXCLUDED.amount, remote_modified_at = EXCLUDED.remote_modified_at, \
    merchant_skus = EXCLUDED.merchant_skus, product_barcodes = EXCLUDED.product_barcodes, \
    product_names = EXCLUDED.product_names, product_colors = EXCLUDED.product_colors, \
    product_sizes = EXCLUDED.product_sizes, quantities = EXCLUDED.quantities, details = EXCLUDED.details, \
    updated_at = EXCLUDED.updated_at";

const PRODUCT_COLUMNS: &str = "barcode, title, stock_code, brand, category, quantity, sale_price, list_price, vat_rate, on_sale, cost, updated_at";

const RETURN_COLUMNS: &str = "claim_id, order_number, status, claim_date, customer_name, product_barcodes, reasons, details, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    order_number: String,
    status: String,
    order_date: DateTime<Utc>,
    customer_name: String,
    cargo_tracking_number: Option<String>,
    cargo_provider: Option<String>,
    amount: Decimal,
    remote_modified_at: Option<DateTime<Utc>>,
    merchant_skus: String,
    product_barcodes: String,
    product_names: String,
    product_colors: String,
    product_sizes: String,
    quantities: String,
    details: Json<Vec<OrderLine>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        let mut order = Order {
            order_number: row.order_number, status: OrderStatus::parse(&row.status), order_date: row.order_date,
            customer_name: row.customer_name, cargo_tracking_number: row.cargo_tracking_number,
            cargo_provider: row.cargo_provider, amount: row.amount, remote_modified_at: row.remote_modified_at,
            merchant_skus: row.merchant_skus, product_barcodes: row.product_barcodes, product_names: row.product_names,
            product_colors: row.product_colors, product_sizes: row.product_sizes, quantities: row.quantities,
            details: row.details.0, created_at: row.created_at, updated_at: row.updated_at,
        };
        order.ensure_details();
        order
    }
}

#[derive(Debug, FromRow)]
struct ArchiveRow {
    #[sqlx(flatten)]
    order: OrderRow,
    source_table: String,
    archive_reason: Option<String>,
    archived_at: DateTime<Utc>,
}

impl TryFrom<ArchiveRow> for ArchivedOrder {
    type Error = StorageError;
    fn try_from(row: ArchiveRow) -> Result<Self> {
        let source_table = OrderTable::from_table_name(&row.source_table)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown source table {:?}", row.source_table)))?;
        Ok(ArchivedOrder { order: row.order.into(), source_table, reason: row.archive_reason, archived_at: row.archived_at })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    barcode: String,
    title: String,
    stock_code: String,
    brand: Option<String>,
    category: Option<String>,
    quantity: i32,
    sale_price: Decimal,
    list_price: Decimal,
    vat_rate: Decimal,
    on_sale: bool,
    cost: Option<Decimal>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StorageError;
    fn try_from(row: ProductRow) -> Result<Self> {
        let barcode = Barcode::new(row.barcode).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        Ok(Product {
            barcode, title: row.title, stock_code: row.stock_code, brand: row.brand, category: row.category,
            quantity: row.quantity, sale_price: row.sale_price, list_price: row.list_price, vat_rate: row.vat_rate,
            on_sale: row.on_sale, cost: row.cost, updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReturnRow {
    claim_id: String,
    order_number: String,
    status: String,
    claim_date: DateTime<Utc>,
    customer_name: String,
    product_barcodes: String,
    reasons: String,
    details: Json<Vec<ReturnProduct>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReturnRow> for ReturnOrder {
    fn from(row: ReturnRow) -> Self {
        ReturnOrder {
            claim_id: row.claim_id, order_number: row.order_number, status: row.status, claim_date: row.claim_date,
            customer_name: row.customer_name, product_barcodes: row.product_barcodes, reasons: row.reasons,
            details: row.details.0, created_at: row.created_at, updated_at: row.updated_at,
        }
    }
}

fn bind_order<'q>(query: Query<'q, Postgres, PgArguments>, order: &'q Order) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&order.order_number).bind(order.status.as_str()).bind(order.order_date).bind(&order.customer_name)
        .bind(&order.cargo_tracking_number).bind(&order.cargo_provider).bind(order.amount).bind(order.remote_modified_at)
        .bind(&order.merchant_skus).bind(&order.product_barcodes).bind(&order.product_names)
        .bind(&order.product_colors).bind(&order.product_sizes).bind(&order.quantities)
        .bind(Json(&order.details)).bind(order.created_at).bind(order.updated_at)
}

fn upsert_order_sql(table: OrderTable) -> String {
    format!(
        "INSERT INTO {} ({ORDER_COLUMNS}) VALUES ({ORDER_PLACEHOLDERS}) ON CONFLICT (order_number) DO UPDATE SET {ORDER_UPDATES}",
        table.table_name()
    )
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_order(&self, order_number: &str) -> Result<Option<(OrderTable, Order)>> {
        for table in OrderTable::ALL {
            let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM {} WHERE order_number = $1", table.table_name()))
                .bind(order_number).fetch_optional(&self.pool).await?;
            if let Some(row) = row { return Ok(Some((table, row.into()))); }
        }
        Ok(None)
    }

    async fn list_orders(&self, table: OrderTable, page: PageRequest) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM {} ORDER BY order_date DESC LIMIT $1 OFFSET $2", table.table_name()
        )).bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn count_orders(&self, table: OrderTable) -> Result<i64> {
        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table.table_name())).fetch_one(&self.pool).await?;
        Ok(total.0)
    }

    async fn order_keys(&self) -> Result<Vec<OrderKey>> {
        let mut keys = Vec::new();
        for table in OrderTable::ALL {
            let rows: Vec<(String, String, DateTime<Utc>)> = sqlx::query_as(&format!(
                "SELECT order_number, status, order_date FROM {}", table.table_name()
            )).fetch_all(&self.pool).await?;
            keys.extend(rows.into_iter().map(|(order_number, status, order_date)| OrderKey {
                order_number, table, status: OrderStatus::parse(&status), order_date,
            }));
        }
        Ok(keys)
    }

    async fn upsert_order(&self, table: OrderTable, order: &Order) -> Result<()> {
        let sql = upsert_order_sql(table);
        bind_order(sqlx::query(&sql), order).execute(&self.pool).await?;
        Ok(())
    }

    async fn move_order(&self, from: OrderTable, to: OrderTable, order: &Order) -> Result<()> {
        let sql = upsert_order_sql(to);
        let mut tx = self.pool.begin().await?;
        bind_order(sqlx::query(&sql), order).execute(&mut *tx).await?;
        if from != to {
            let removed = sqlx::query(&format!("DELETE FROM {} WHERE order_number = $1", from.table_name()))
                .bind(&order.order_number).execute(&mut *tx).await?.rows_affected();
            if removed != 1 {
                tx.rollback().await?;
                return Err(StorageError::Conflict(format!("order {} is not in {from}", order.order_number)));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_orders(&self, table: OrderTable, order_numbers: &[String]) -> Result<Vec<String>> {
        if order_numbers.is_empty() { return Ok(vec![]); }
        let removed: Vec<(String,)> = sqlx::query_as(&format!(
            "DELETE FROM {} WHERE order_number = ANY($1) AND status <> $2 RETURNING order_number", table.table_name()
        )).bind(order_numbers).bind(OrderStatus::Delivered.as_str()).fetch_all(&self.pool).await?;
        Ok(removed.into_iter().map(|(number,)| number).collect())
    }

    async fn archive_order(&self, from: OrderTable, archived: &ArchivedOrder) -> Result<()> {
        let sql = format!(
            "INSERT INTO archive ({ORDER_COLUMNS}, source_table, archive_reason, archived_at) \
             VALUES ({ORDER_PLACEHOLDERS}, $18, $19, $20) ON CONFLICT (order_number) DO NOTHING"
        );
        let number = &archived.order.order_number;
        let mut tx = self.pool.begin().await?;
        let inserted = bind_order(sqlx::query(&sql), &archived.order)
            .bind(archived.source_table.table_name()).bind(&archived.reason).bind(archived.archived_at)
            .execute(&mut *tx).await?.rows_affected();
        if inserted == 0 {
            tx.rollback().await?;
            return Err(StorageError::Conflict(format!("order {number} is already archived")));
        }
        let removed = sqlx::query(&format!("DELETE FROM {} WHERE order_number = $1", from.table_name()))
            .bind(number).execute(&mut *tx).await?.rows_affected();
        if removed != 1 {
            tx.rollback().await?;
            return Err(StorageError::Conflict(format!("order {number} is not in {from}")));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_archived(&self, order_number: &str) -> Result<Option<ArchivedOrder>> {
        sqlx::query_as::<_, ArchiveRow>(&format!(
            "SELECT {ORDER_COLUMNS}, source_table, archive_reason, archived_at FROM archive WHERE order_number = $1"
        )).bind(order_number).fetch_optional(&self.pool).await?.map(ArchivedOrder::try_from).transpose()
    }

    async fn list_archived(&self, page: PageRequest) -> Result<Vec<ArchivedOrder>> {
        let rows = sqlx::query_as::<_, ArchiveRow>(&format!(
            "SELECT {ORDER_COLUMNS}, source_table, archive_reason, archived_at FROM archive ORDER BY archived_at DESC LIMIT $1 OFFSET $2"
        )).bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        rows.into_iter().map(ArchivedOrder::try_from).collect()
    }

    async fn restore_archived(&self, archived: &ArchivedOrder, to: OrderTable) -> Result<()> {
        let sql = upsert_order_sql(to);
        let mut tx = self.pool.begin().await?;
        bind_order(sqlx::query(&sql), &archived.order).execute(&mut *tx).await?;
        let removed = sqlx::query("DELETE FROM archive WHERE order_number = $1")
            .bind(&archived.order.order_number).execute(&mut *tx).await?.rows_affected();
        if removed != 1 {
            tx.rollback().await?;
            return Err(StorageError::Conflict(format!("order {} is not archived", archived.order.order_number)));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delivered_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM {} WHERE order_date < $1 ORDER BY order_date", OrderTable::Delivered.table_name()
        )).bind(cutoff).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn get_product(&self, barcode: &str) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = $1"))
            .bind(barcode).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn list_products(&self, page: PageRequest) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY title LIMIT $1 OFFSET $2"))
            .bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn upsert_products(&self, products: &[Product]) -> Result<()> {
        let sql = format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NULL, NOW()) \
             ON CONFLICT (barcode) DO UPDATE SET title = EXCLUDED.title, stock_code = EXCLUDED.stock_code, \
             brand = EXCLUDED.brand, category = EXCLUDED.category, quantity = EXCLUDED.quantity, \
             sale_price = EXCLUDED.sale_price, list_price = EXCLUDED.list_price, vat_rate = EXCLUDED.vat_rate, \
             on_sale = EXCLUDED.on_sale, updated_at = NOW()"
        );
        let mut tx = self.pool.begin().await?;
        for p in products {
            sqlx::query(&sql)
                .bind(p.barcode.as_str()).bind(&p.title).bind(&p.stock_code).bind(&p.brand).bind(&p.category)
                .bind(p.quantity).bind(p.sale_price).bind(p.list_price).bind(p.vat_rate).bind(p.on_sale)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_product_cost(&self, barcode: &str, cost: Decimal) -> Result<bool> {
        let done = sqlx::query("UPDATE products SET cost = $2, updated_at = NOW() WHERE barcode = $1")
            .bind(barcode).bind(cost).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn product_costs(&self, barcodes: &[String]) -> Result<HashMap<String, Decimal>> {
        let rows: Vec<(String, Decimal)> = sqlx::query_as("SELECT barcode, cost FROM products WHERE barcode = ANY($1) AND cost IS NOT NULL")
            .bind(barcodes).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl ReturnStore for PgStore {
    async fn get_return(&self, claim_id: &str) -> Result<Option<ReturnOrder>> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!("SELECT {RETURN_COLUMNS} FROM return_orders WHERE claim_id = $1"))
            .bind(claim_id).fetch_optional(&self.pool).await?;
        Ok(row.map(ReturnOrder::from))
    }

    async fn list_returns(&self, page: PageRequest) -> Result<Vec<ReturnOrder>> {
        let rows = sqlx::query_as::<_, ReturnRow>(&format!("SELECT {RETURN_COLUMNS} FROM return_orders ORDER BY claim_date DESC LIMIT $1 OFFSET $2"))
            .bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ReturnOrder::from).collect())
    }

    async fn upsert_return(&self, ret: &ReturnOrder) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO return_orders ({RETURN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (claim_id) DO UPDATE SET status = EXCLUDED.status, claim_date = EXCLUDED.claim_date, \
             customer_name = EXCLUDED.customer_name, product_barcodes = EXCLUDED.product_barcodes, \
             reasons = EXCLUDED.reasons, details = EXCLUDED.details, updated_at = EXCLUDED.updated_at"
        ))
        .bind(&ret.claim_id).bind(&ret.order_number).bind(&ret.status).bind(ret.claim_date).bind(&ret.customer_name)
        .bind(&ret.product_barcodes).bind(&ret.reasons).bind(Json(&ret.details)).bind(ret.created_at).bind(ret.updated_at)
        .execute(&self.pool).await?;
        Ok(())
    }
}
