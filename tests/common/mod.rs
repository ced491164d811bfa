#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use seller_backoffice::marketplace::{
    Claim, DateWindow, MarketplaceApi, MarketplaceError, PackageStatusUpdate, RemotePages, RemoteProduct,
    ShipmentPackage, WebhookRegistered, WebhookRegistration,
};

/// In-process stand-in for the marketplace.
#[derive(Default)]
pub struct FakeMarketplace {
    pub packages: Mutex<Vec<ShipmentPackage>>,
    pub products: Mutex<Vec<RemoteProduct>>,
    pub claims: Mutex<Vec<Claim>>,
    pub failed_pages: Mutex<Vec<u32>>,
    pub unreachable: Mutex<bool>,
    pub pushed: Mutex<Vec<(i64, String)>>,
    pub registrations: Mutex<Vec<WebhookRegistration>>,
}

impl FakeMarketplace {
    pub fn with_packages(packages: Vec<ShipmentPackage>) -> Self {
        Self { packages: Mutex::new(packages), ..Default::default() }
    }

    async fn check(&self) -> Result<(), MarketplaceError> {
        if *self.unreachable.lock().await {
            return Err(MarketplaceError::Status { status: 503, body: "maintenance".into() });
        }
        Ok(())
    }
}

#[async_trait]
impl MarketplaceApi for FakeMarketplace {
    async fn fetch_orders(&self, _window: DateWindow) -> Result<RemotePages<ShipmentPackage>, MarketplaceError> {
        self.check().await?;
        Ok(RemotePages {
            items: self.packages.lock().await.clone(),
            total_pages: 1,
            failed_pages: self.failed_pages.lock().await.clone(),
        })
    }

    async fn fetch_products(&self) -> Result<RemotePages<RemoteProduct>, MarketplaceError> {
        self.check().await?;
        Ok(RemotePages::complete(self.products.lock().await.clone()))
    }

    async fn fetch_claims(&self, _window: DateWindow) -> Result<RemotePages<Claim>, MarketplaceError> {
        self.check().await?;
        Ok(RemotePages::complete(self.claims.lock().await.clone()))
    }

    async fn update_package_status(&self, package_id: i64, update: &PackageStatusUpdate) -> Result<(), MarketplaceError> {
        self.check().await?;
        self.pushed.lock().await.push((package_id, update.status.clone()));
        Ok(())
    }

    async fn register_webhook(&self, registration: &WebhookRegistration) -> Result<WebhookRegistered, MarketplaceError> {
        self.check().await?;
        self.registrations.lock().await.push(registration.clone());
        Ok(WebhookRegistered { id: "wh-1".into() })
    }
}

/// A one-line package placed two days ago and last modified `modified_hours` ago.
pub fn package(id: i64, order_number: &str, status: &str, barcode: &str, modified_hours: i64) -> ShipmentPackage {
    let placed = Utc::now() - Duration::hours(48);
    let modified = Utc::now() - Duration::hours(modified_hours);
    serde_json::from_value(json!({
        "id": id,
        "orderNumber": order_number,
        "orderDate": placed.timestamp_millis(),
        "status": status,
        "customerFirstName": "Deniz",
        "customerLastName": "Yılmaz",
        "lastModifiedDate": modified.timestamp_millis(),
        "lines": [
            { "id": id * 10, "barcode": barcode, "merchantSku": format!("SKU-{barcode}"), "productName": "Mug",
              "quantity": 1, "price": "120.00", "amount": "120.00", "commission": "20" }
        ]
    }))
    .expect("valid package")
}

pub fn product(barcode: &str, title: &str, price: &str) -> RemoteProduct {
    serde_json::from_value(json!({
        "barcode": barcode, "title": title, "stockCode": format!("SC-{barcode}"),
        "quantity": 5, "salePrice": price, "listPrice": price, "vatRate": "20", "onSale": true
    }))
    .expect("valid product")
}

pub fn claim(id: &str, order_number: &str, status: &str) -> Claim {
    serde_json::from_value(json!({
        "id": id, "orderNumber": order_number, "claimDate": Utc::now().timestamp_millis(),
        "items": [ { "id": format!("{id}-1"), "barcode": "B1", "productName": "Mug", "reason": "Damaged", "status": status } ]
    }))
    .expect("valid claim")
}
