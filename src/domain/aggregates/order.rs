//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::domain::value_objects::{join_values, split_values};

/// Shipment status as reported by the marketplace.
///
/// The remote side sends free text, partly localized. Anything unrecognized is kept verbatim in `Other`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    Created,
    Picking,
    Invoiced,
    Shipped,
    Delivered,
    UnDelivered,
    Cancelled,
    Returned,
    Other(String),
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "created" | "awaiting" | "yeni" | "oluşturuldu" => Self::Created,
            "picking" | "hazırlanıyor" | "toplanıyor" => Self::Picking,
            "invoiced" | "faturalandı" => Self::Invoiced,
            "shipped" | "atcollectionpoint" | "kargoyaverildi" | "kargoda" => Self::Shipped,
            "delivered" | "teslimedildi" => Self::Delivered,
            "undelivered" | "teslimedilemedi" => Self::UnDelivered,
            "cancelled" | "canceled" | "unsupplied" | "iptaledildi" | "iptal" => Self::Cancelled,
            "returned" | "iadeedildi" => Self::Returned,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "Created",
            Self::Picking => "Picking",
            Self::Invoiced => "Invoiced",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::UnDelivered => "UnDelivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_delivered(&self) -> bool { matches!(self, Self::Delivered) }

    /// Table that holds orders in this status.
    pub fn table(&self) -> OrderTable {
        match self {
            Self::Created | Self::Other(_) => OrderTable::Created,
            Self::Picking | Self::Invoiced => OrderTable::Picking,
            Self::Shipped | Self::UnDelivered => OrderTable::Shipped,
            Self::Delivered => OrderTable::Delivered,
            Self::Cancelled | Self::Returned => OrderTable::Cancelled,
        }
    }
}

// Lowercase, drop whitespace and the combining dot left behind by lowercasing 'İ'.
fn normalize(raw: &str) -> String {
    raw.to_lowercase().chars().filter(|c| !c.is_whitespace() && *c != '\u{307}').collect()
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self { Self::parse(&raw) }
}

impl From<&str> for OrderStatus {
    fn from(raw: &str) -> Self { Self::parse(raw) }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self { status.as_str().to_string() }
}

/// Status-keyed tables sharing the order row shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderTable { Created, Picking, Shipped, Delivered, Cancelled }

impl OrderTable {
    pub const ALL: [OrderTable; 5] = [Self::Created, Self::Picking, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Created => "orders",
            Self::Picking => "orders_picking",
            Self::Shipped => "orders_shipped",
            Self::Delivered => "orders_delivered",
            Self::Cancelled => "orders_cancelled",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.table_name() == name)
    }
}

impl fmt::Display for OrderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.table_name()) }
}

/// One line of a shipment package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Remote line id. Zero or negative for lines rebuilt from joined columns.
    pub line_id: i64,
    pub package_id: i64,
    pub barcode: String,
    pub merchant_sku: String,
    pub product_name: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub amount: Decimal,
    /// Commission rate in percent.
    pub commission_rate: Option<Decimal>,
    pub line_status: Option<String>,
}

impl OrderLine {
    fn is_synthetic(&self) -> bool { self.line_id <= 0 }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_number: String,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub customer_name: String,
    pub cargo_tracking_number: Option<String>,
    pub cargo_provider: Option<String>,
    pub amount: Decimal,
    pub remote_modified_at: Option<DateTime<Utc>>,
    pub merchant_skus: String,
    pub product_barcodes: String,
    pub product_names: String,
    pub product_colors: String,
    pub product_sizes: String,
    pub quantities: String,
    pub details: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(order_number: impl Into<String>, status: OrderStatus, order_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            order_number: order_number.into(), status, order_date, customer_name: String::new(),
            cargo_tracking_number: None, cargo_provider: None, amount: Decimal::ZERO, remote_modified_at: None,
            merchant_skus: String::new(), product_barcodes: String::new(), product_names: String::new(),
            product_colors: String::new(), product_sizes: String::new(), quantities: String::new(),
            details: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn with_line(mut self, line: OrderLine) -> Self {
        self.details.push(line);
        self.recalculate();
        self
    }

    pub fn table(&self) -> OrderTable { self.status.table() }

    /// Regenerate the joined columns from `details`.
    pub fn refresh_joined_fields(&mut self) {
        self.merchant_skus = join_values(self.details.iter().map(|l| l.merchant_sku.as_str()));
        self.product_barcodes = join_values(self.details.iter().map(|l| l.barcode.as_str()));
        self.product_names = join_values(self.details.iter().map(|l| l.product_name.as_str()));
        self.product_colors = join_values(self.details.iter().map(|l| l.color.as_deref().unwrap_or_default()));
        self.product_sizes = join_values(self.details.iter().map(|l| l.size.as_deref().unwrap_or_default()));
        self.quantities = join_values(self.details.iter().map(|l| l.quantity.to_string()));
    }

    /// Joined columns plus the order amount.
    pub fn recalculate(&mut self) {
        self.refresh_joined_fields();
        self.amount = self.details.iter().map(|l| l.amount).sum();
    }

    /// Merge a newer view of the same order into this one. Returns whether anything changed.
    ///
    /// Lines are matched by remote line id; rebuilt lines are matched by barcode instead.
    /// Status and cargo data follow whichever side was modified remotely last.
    pub fn absorb(&mut self, other: Order) -> bool {
        let before = self.clone();
        let other_is_newer = match (self.remote_modified_at, other.remote_modified_at) {
            (Some(mine), Some(theirs)) => theirs >= mine,
            (Some(_), None) => false,
            (None, _) => true,
        };

        for line in other.details {
            let slot = self.details.iter().position(|l| l.line_id == line.line_id)
                .or_else(|| self.details.iter().position(|l| l.is_synthetic() && l.barcode == line.barcode));
            match slot {
                Some(i) => self.details[i] = line,
                None => self.details.push(line),
            }
        }

        if other_is_newer {
            self.status = other.status;
            self.remote_modified_at = other.remote_modified_at;
            if other.cargo_tracking_number.is_some() { self.cargo_tracking_number = other.cargo_tracking_number; }
            if other.cargo_provider.is_some() { self.cargo_provider = other.cargo_provider; }
            if !other.customer_name.is_empty() { self.customer_name = other.customer_name; }
        }
        self.order_date = self.order_date.min(other.order_date);
        self.recalculate();

        let changed = !self.same_content(&before);
        if changed { self.touch(); }
        changed
    }

    /// Rebuild lines from the joined columns of a row written without `details`.
    ///
    /// The whole order amount is attributed to the first line since per-line amounts were never stored.
    pub fn lines_from_joined(&self) -> Vec<OrderLine> {
        let barcodes = split_values(&self.product_barcodes);
        let skus = split_values(&self.merchant_skus);
        let names = split_values(&self.product_names);
        let colors = split_values(&self.product_colors);
        let sizes = split_values(&self.product_sizes);
        let quantities = split_values(&self.quantities);
        let slot = |values: &[String], i: usize| values.get(i).filter(|v| !v.is_empty()).cloned();

        barcodes.iter().enumerate().map(|(i, barcode)| OrderLine {
            line_id: -(i as i64),
            package_id: 0,
            barcode: barcode.clone(),
            merchant_sku: slot(&skus, i).unwrap_or_default(),
            product_name: slot(&names, i).unwrap_or_default(),
            color: slot(&colors, i),
            size: slot(&sizes, i),
            quantity: slot(&quantities, i).and_then(|q| q.parse().ok()).unwrap_or(1),
            price: Decimal::ZERO,
            amount: if i == 0 { self.amount } else { Decimal::ZERO },
            commission_rate: None,
            line_status: None,
        }).collect()
    }

    /// Fill `details` from the joined columns when it is empty.
    pub fn ensure_details(&mut self) {
        if self.details.is_empty() { self.details = self.lines_from_joined(); }
    }

    /// Distinct shipment packages referenced by the lines.
    pub fn package_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.details.iter().map(|l| l.package_id).filter(|id| *id > 0).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn set_status(&mut self, status: OrderStatus) -> bool {
        if self.status == status { return false; }
        self.status = status;
        self.touch();
        true
    }

    fn same_content(&self, other: &Order) -> bool {
        let mut probe = self.clone();
        probe.created_at = other.created_at;
        probe.updated_at = other.updated_at;
        probe == *other
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// An order moved out of its status table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedOrder {
    pub order: Order,
    pub source_table: OrderTable,
    pub reason: Option<String>,
    pub archived_at: DateTime<Utc>,
}

impl ArchivedOrder {
    pub fn new(order: Order, source_table: OrderTable, reason: Option<String>) -> Self {
        Self { order, source_table, reason, archived_at: Utc::now() }
    }
}
