//! Aggregates module
pub mod product;
pub mod order;
pub mod return_order;

pub use product::{Product, ProductError};
pub use order::{ArchivedOrder, Order, OrderLine, OrderStatus, OrderTable};
pub use return_order::{ReturnOrder, ReturnProduct};
