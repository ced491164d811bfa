//! Synchronization of local state with the marketplace.

pub mod orders;
pub mod products;
pub mod returns;
pub mod scheduler;

pub use orders::{apply_package, reconcile_orders, ReconcileOptions, ReconcileReport, UpsertOutcome};
pub use products::{sync_products, ProductSyncReport};
pub use returns::{sync_returns, ReturnSyncReport};
pub use scheduler::{spawn_scheduler, SyncJobs};
