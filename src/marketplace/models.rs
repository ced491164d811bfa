//! Wire models of the marketplace REST API and their mapping onto the domain.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::aggregates::{Order, OrderLine, OrderStatus, Product, ReturnOrder, ReturnProduct};
use crate::domain::value_objects::{Barcode, BarcodeError};
use crate::marketplace::MarketplaceError;

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
}

/// Everything a paginated fetch collected.
#[derive(Debug, Clone)]
pub struct RemotePages<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
    /// Pages that could not be fetched after retries.
    pub failed_pages: Vec<u32>,
}

impl<T> RemotePages<T> {
    pub fn complete(items: Vec<T>) -> Self { Self { items, total_pages: 1, failed_pages: vec![] } }
    pub fn is_complete(&self) -> bool { self.failed_pages.is_empty() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentPackage {
    pub id: i64,
    pub order_number: String,
    /// Epoch milliseconds.
    pub order_date: i64,
    #[serde(alias = "shipmentPackageStatus")]
    pub status: String,
    #[serde(default)]
    pub customer_first_name: Option<String>,
    #[serde(default)]
    pub customer_last_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub cargo_tracking_number: Option<String>,
    #[serde(default)]
    pub cargo_provider_name: Option<String>,
    #[serde(default)]
    pub last_modified_date: Option<i64>,
    #[serde(default)]
    pub lines: Vec<PackageLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageLine {
    pub id: i64,
    pub barcode: String,
    #[serde(default)]
    pub merchant_sku: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_color: Option<String>,
    #[serde(default)]
    pub product_size: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub commission: Option<Decimal>,
    #[serde(default)]
    pub order_line_item_status_name: Option<String>,
}

impl ShipmentPackage {
    pub fn customer_name(&self) -> String {
        [self.customer_first_name.as_deref(), self.customer_last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn into_order(self) -> Order {
        let order_date = millis(self.order_date).unwrap_or_else(Utc::now);
        let mut order = Order::new(self.order_number.clone(), OrderStatus::parse(&self.status), order_date);
        order.customer_name = self.customer_name();
        order.remote_modified_at = self.last_modified_date.and_then(millis);
        order.cargo_tracking_number = self.cargo_tracking_number;
        order.cargo_provider = self.cargo_provider_name;
        let package_id = self.id;
        order.details = self.lines.into_iter().map(|l| OrderLine {
            line_id: l.id,
            package_id,
            barcode: l.barcode,
            merchant_sku: l.merchant_sku.unwrap_or_default(),
            product_name: l.product_name.unwrap_or_default(),
            color: l.product_color,
            size: l.product_size,
            quantity: l.quantity,
            price: l.price,
            amount: if l.amount.is_zero() { l.price * Decimal::from(l.quantity) } else { l.amount },
            commission_rate: l.commission,
            line_status: l.order_line_item_status_name,
        }).collect();
        order.recalculate();
        order
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProduct {
    pub barcode: String,
    pub title: String,
    #[serde(default)]
    pub stock_code: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub sale_price: Decimal,
    #[serde(default)]
    pub list_price: Decimal,
    #[serde(default)]
    pub vat_rate: Decimal,
    #[serde(default)]
    pub on_sale: bool,
}

impl RemoteProduct {
    pub fn into_product(self) -> Result<Product, BarcodeError> {
        let mut product = Product::new(Barcode::new(self.barcode)?, self.title, self.sale_price);
        product.stock_code = self.stock_code.unwrap_or_default();
        product.brand = self.brand;
        product.category = self.category_name;
        product.quantity = self.quantity;
        product.list_price = self.list_price;
        product.vat_rate = self.vat_rate;
        product.on_sale = self.on_sale;
        Ok(product)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub order_number: String,
    /// Epoch milliseconds.
    pub claim_date: i64,
    #[serde(default)]
    pub customer_first_name: Option<String>,
    #[serde(default)]
    pub customer_last_name: Option<String>,
    #[serde(default)]
    pub items: Vec<ClaimItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimItem {
    pub id: String,
    pub barcode: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Claim {
    /// Claim status is the status shared by its items, or `Mixed`.
    pub fn status(&self) -> String {
        let mut statuses = self.items.iter().filter_map(|i| i.status.as_deref());
        let Some(first) = statuses.next() else { return "Created".to_string() };
        if statuses.all(|s| s == first) { first.to_string() } else { "Mixed".to_string() }
    }

    pub fn into_return_order(self) -> ReturnOrder {
        let status = self.status();
        let claim_date = millis(self.claim_date).unwrap_or_else(Utc::now);
        let mut ret = ReturnOrder::new(self.id, self.order_number, claim_date);
        ret.status = status;
        ret.customer_name = [self.customer_first_name, self.customer_last_name]
            .into_iter().flatten().filter(|s| !s.trim().is_empty()).collect::<Vec<_>>().join(" ");
        ret.details = self.items.into_iter().map(|i| ReturnProduct {
            claim_item_id: i.id,
            barcode: i.barcode,
            product_name: i.product_name.unwrap_or_default(),
            reason: i.reason,
            status: i.status.unwrap_or_else(|| "Created".to_string()),
        }).collect();
        ret.refresh_joined_fields();
        ret
    }
}

/// Body of a shipment package status update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageStatusUpdate {
    pub lines: Vec<LineQuantity>,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineQuantity {
    pub line_id: i64,
    pub quantity: u32,
}

impl PackageStatusUpdate {
    /// Build the update for the statuses a seller may set: Picking, Invoiced (needs an invoice number) and UnSupplied.
    pub fn new(status: &str, lines: Vec<LineQuantity>, invoice_number: Option<&str>) -> Result<Self, MarketplaceError> {
        let mut params = serde_json::Map::new();
        let status = match status.trim().to_lowercase().as_str() {
            "picking" => "Picking",
            "invoiced" => {
                let invoice = invoice_number.map(str::trim).filter(|s| !s.is_empty()).ok_or(MarketplaceError::MissingInvoiceNumber)?;
                params.insert("invoiceNumber".to_string(), serde_json::Value::String(invoice.to_string()));
                "Invoiced"
            }
            "unsupplied" => "UnSupplied",
            _ => return Err(MarketplaceError::UnsupportedStatus(status.to_string())),
        };
        Ok(Self { lines, params, status: status.to_string() })
    }

    /// Local status the order takes once the update is accepted.
    pub fn local_status(&self) -> OrderStatus { OrderStatus::parse(&self.status) }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    pub url: String,
    pub authentication_type: String,
    pub api_key: String,
    pub subscribed_statuses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRegistered {
    pub id: String,
}

/// Date window for order and claim listings.
#[derive(Debug, Clone, Copy)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self { start: end - chrono::Duration::days(days), end }
    }
}

fn millis(ms: i64) -> Option<DateTime<Utc>> { DateTime::from_timestamp_millis(ms) }

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
