//! Return (claim) Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::join_values;

/// One returned item of a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnProduct {
    pub claim_item_id: String,
    pub barcode: String,
    pub product_name: String,
    pub reason: Option<String>,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnOrder {
    pub claim_id: String,
    pub order_number: String,
    pub status: String,
    pub claim_date: DateTime<Utc>,
    pub customer_name: String,
    pub product_barcodes: String,
    pub reasons: String,
    pub details: Vec<ReturnProduct>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReturnOrder {
    pub fn new(claim_id: impl Into<String>, order_number: impl Into<String>, claim_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            claim_id: claim_id.into(), order_number: order_number.into(), status: String::new(), claim_date,
            customer_name: String::new(), product_barcodes: String::new(), reasons: String::new(),
            details: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn with_item(mut self, item: ReturnProduct) -> Self {
        self.details.push(item);
        self.refresh_joined_fields();
        self
    }

    pub fn refresh_joined_fields(&mut self) {
        self.product_barcodes = join_values(self.details.iter().map(|i| i.barcode.as_str()));
        self.reasons = join_values(self.details.iter().map(|i| i.reason.as_deref().unwrap_or_default()));
    }

    /// Replace the remote-owned fields with `remote`'s. Returns whether anything changed.
    pub fn apply_remote(&mut self, remote: ReturnOrder) -> bool {
        let changed = self.status != remote.status
            || self.details != remote.details
            || self.customer_name != remote.customer_name
            || self.claim_date != remote.claim_date;
        if changed {
            let created_at = self.created_at;
            *self = ReturnOrder { created_at, updated_at: Utc::now(), ..remote };
            self.refresh_joined_fields();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, reason: Option<&str>) -> ReturnProduct {
        ReturnProduct { claim_item_id: id.into(), barcode: format!("B{id}"), product_name: "Mug".into(), reason: reason.map(Into::into), status: "Created".into() }
    }

    #[test]
    fn test_joined_reasons() {
        let r = ReturnOrder::new("C1", "1001", Utc::now()).with_item(item("1", Some("Damaged"))).with_item(item("2", None));
        assert_eq!(r.product_barcodes, "B1, B2");
        assert_eq!(r.reasons, "Damaged, -");
    }

    #[test]
    fn test_apply_remote_detects_change() {
        let date = Utc::now();
        let mut local = ReturnOrder::new("C1", "1001", date).with_item(item("1", None));
        let same = local.clone();
        assert!(!local.apply_remote(same));
        let mut accepted = local.clone();
        accepted.status = "Accepted".into();
        assert!(local.apply_remote(accepted));
        assert_eq!(local.status, "Accepted");
    }
}
