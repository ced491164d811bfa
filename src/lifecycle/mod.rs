//! Order lifecycle: status changes and the archive.

pub mod archive;
pub mod status;

pub use archive::{archive_delivered_before, archive_order, restore_order, BulkArchiveReport};
pub use status::{change_local_status, push_status, StatusChange};
