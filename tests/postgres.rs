//! Runs against a real database: `DATABASE_URL=... cargo test -- --ignored`.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;

use seller_backoffice::domain::aggregates::{ArchivedOrder, Order, OrderLine, OrderStatus, OrderTable, Product};
use seller_backoffice::domain::value_objects::Barcode;
use seller_backoffice::storage::{OrderStore, PgStore, ProductStore, StorageError};

async fn store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    PgStore::new(pool)
}

fn order(number: &str, status: OrderStatus) -> Order {
    Order::new(number, status, Utc::now()).with_line(OrderLine {
        line_id: 1, package_id: 77, barcode: "PG-B1".into(), merchant_sku: "S1".into(), product_name: "Mug".into(),
        color: Some("RED".into()), size: None, quantity: 1, price: Decimal::new(5000, 2), amount: Decimal::new(5000, 2),
        commission_rate: None, line_status: None,
    })
}

#[tokio::test]
#[ignore]
async fn test_move_archive_restore_roundtrip() {
    let store = store().await;
    let number = format!("pg-{}", uuid::Uuid::now_v7());
    let created = order(&number, OrderStatus::Created);
    store.upsert_order(OrderTable::Created, &created).await.unwrap();

    let mut picking = created.clone();
    picking.status = OrderStatus::Picking;
    store.move_order(OrderTable::Created, OrderTable::Picking, &picking).await.unwrap();
    let (table, found) = store.find_order(&number).await.unwrap().unwrap();
    assert_eq!(table, OrderTable::Picking);
    assert_eq!(found.details, picking.details);

    let archived = ArchivedOrder::new(found, OrderTable::Picking, Some("test".into()));
    store.archive_order(OrderTable::Picking, &archived).await.unwrap();
    assert!(matches!(store.archive_order(OrderTable::Picking, &archived).await, Err(StorageError::Conflict(_))));
    assert!(store.find_order(&number).await.unwrap().is_none());

    store.restore_archived(&archived, OrderTable::Picking).await.unwrap();
    assert!(store.get_archived(&number).await.unwrap().is_none());
    assert!(matches!(store.restore_archived(&archived, OrderTable::Picking).await, Err(StorageError::Conflict(_))));
    assert_eq!(store.delete_orders(OrderTable::Picking, &[number.clone()]).await.unwrap(), vec![number.clone()]);
}

#[tokio::test]
#[ignore]
async fn test_stale_source_table_and_delivered_guard() {
    let store = store().await;
    let number = format!("pg-{}", uuid::Uuid::now_v7());
    let created = order(&number, OrderStatus::Created);
    store.upsert_order(OrderTable::Created, &created).await.unwrap();
    store.move_order(OrderTable::Created, OrderTable::Picking, &created).await.unwrap();

    let archived = ArchivedOrder::new(created.clone(), OrderTable::Created, None);
    assert!(matches!(store.archive_order(OrderTable::Created, &archived).await, Err(StorageError::Conflict(_))));
    assert!(store.get_archived(&number).await.unwrap().is_none());
    assert_eq!(store.find_order(&number).await.unwrap().unwrap().0, OrderTable::Picking);

    let mut delivered = created.clone();
    delivered.status = OrderStatus::Delivered;
    store.upsert_order(OrderTable::Picking, &delivered).await.unwrap();
    assert!(store.delete_orders(OrderTable::Picking, &[number.clone()]).await.unwrap().is_empty());
    store.move_order(OrderTable::Picking, OrderTable::Delivered, &delivered).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_product_upsert_keeps_cost() {
    let store = store().await;
    let barcode = format!("PG-{}", &uuid::Uuid::now_v7().simple().to_string()[20..]);
    let product = Product::new(Barcode::new(barcode.clone()).unwrap(), "Mug", Decimal::new(100, 0));
    store.upsert_products(&[product.clone()]).await.unwrap();
    assert!(store.set_product_cost(&barcode, Decimal::new(40, 0)).await.unwrap());

    let renamed = Product { title: "Mug XL".into(), ..product };
    store.upsert_products(&[renamed]).await.unwrap();
    let stored = store.get_product(&barcode).await.unwrap().unwrap();
    assert_eq!(stored.title, "Mug XL");
    assert_eq!(stored.cost, Some(Decimal::new(40, 0)));
}
