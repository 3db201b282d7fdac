//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Values and rows
//! - Tables with per-table row locks
//! - The table store (catalog)
//! - Snapshot persistence

pub mod row;
pub mod snapshot;
pub mod store;
pub mod table;

pub use row::{Row, Value};
pub use snapshot::{SnapshotStore, TableSnapshot};
pub use store::TableStore;
pub use table::{Column, Table};
