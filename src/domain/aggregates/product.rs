//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::Barcode;

/// A listed product, keyed by barcode.
///
/// Everything except `cost` is owned by the marketplace and overwritten on every sync.
/// `cost` is entered by hand and survives syncs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub barcode: Barcode,
    pub title: String,
    pub stock_code: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub quantity: i32,
    pub sale_price: Decimal,
    pub list_price: Decimal,
    pub vat_rate: Decimal,
    pub on_sale: bool,
    pub cost: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(barcode: Barcode, title: impl Into<String>, sale_price: Decimal) -> Self {
        Self {
            barcode, title: title.into(), stock_code: String::new(), brand: None, category: None,
            quantity: 0, sale_price, list_price: sale_price, vat_rate: Decimal::ZERO, on_sale: false,
            cost: None, updated_at: Utc::now(),
        }
    }

    pub fn is_in_stock(&self) -> bool { self.quantity > 0 }

    /// Take the remote-owned fields from `remote`, keeping the local cost.
    pub fn apply_remote(&mut self, remote: Product) {
        let cost = self.cost;
        *self = Product { cost, updated_at: Utc::now(), ..remote };
    }

    pub fn set_cost(&mut self, cost: Decimal) -> Result<(), ProductError> {
        if cost.is_sign_negative() { return Err(ProductError::NegativeCost); }
        self.cost = Some(cost);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Sale price minus cost, when a cost is known.
    pub fn unit_margin(&self) -> Option<Decimal> { self.cost.map(|c| self.sale_price - c) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { NegativeCost }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::NegativeCost => write!(f, "Cost cannot be negative") }
    }
}
