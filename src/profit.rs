//! Per-order profit from locally entered product costs.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::Order;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderProfit {
    pub order_number: String,
    pub revenue: Decimal,
    pub product_cost: Decimal,
    pub commission: Decimal,
    pub profit: Decimal,
    /// Barcodes without a cost. Their cost counts as zero.
    pub missing_costs: Vec<String>,
}

/// `costs` maps barcode to unit cost.
pub fn order_profit(order: &Order, costs: &HashMap<String, Decimal>) -> OrderProfit {
    let hundred = Decimal::ONE_HUNDRED;
    let mut product_cost = Decimal::ZERO;
    let mut commission = Decimal::ZERO;
    let mut missing_costs: Vec<String> = vec![];

    for line in &order.details {
        match costs.get(&line.barcode) {
            Some(cost) => product_cost += *cost * Decimal::from(line.quantity),
            None => {
                if !missing_costs.contains(&line.barcode) { missing_costs.push(line.barcode.clone()); }
            }
        }
        if let Some(rate) = line.commission_rate {
            commission += line.amount * rate / hundred;
        }
    }

    let revenue = order.amount;
    OrderProfit {
        order_number: order.order_number.clone(),
        revenue,
        product_cost,
        commission: commission.round_dp(2),
        profit: (revenue - product_cost - commission).round_dp(2),
        missing_costs,
    }
}
