//! Table Store for MiniSQL
//!
//! The store is the catalog of all tables. The catalog lock is only held
//! long enough to look up or install a table; row mutation happens under
//! each table's own lock, and every mutation is written to its snapshot
//! before the call returns.

use super::row::Row;
use super::snapshot::{is_valid_table_name, SnapshotStore};
use super::table::{validate_columns, Column, Table};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info};

/// Catalog of tables backed by snapshot files
#[derive(Debug)]
pub struct TableStore {
    /// Tables by name
    tables: RwLock<HashMap<String, Arc<Table>>>,
    /// Durable snapshots
    snapshots: SnapshotStore,
}

impl TableStore {
    /// Open a store over a data directory, loading every snapshot in it
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let snapshots = SnapshotStore::open(data_dir)?;
        let mut tables = HashMap::new();

        for snapshot in snapshots.load_all()? {
            let table = Table::with_rows(snapshot.name, snapshot.columns, snapshot.rows);
            info!(
                table = table.name(),
                rows = table.row_count(),
                "loaded table snapshot"
            );
            tables.insert(table.name().to_string(), Arc::new(table));
        }

        Ok(Self {
            tables: RwLock::new(tables),
            snapshots,
        })
    }

    /// Create a new table
    pub fn create_table(&self, name: &str, columns: Vec<Column>) -> Result<()> {
        if !is_valid_table_name(name) {
            return Err(Error::InvalidTableName(name.to_string()));
        }
        validate_columns(name, &columns)?;

        let table = Arc::new(Table::new(name, columns));
        // Take the row lock before publishing the table so no insert can be
        // persisted ahead of the initial snapshot.
        let rows = table.write_rows();
        {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            if tables.contains_key(name) {
                return Err(Error::TableAlreadyExists(name.to_string()));
            }
            tables.insert(name.to_string(), table.clone());
        }

        self.persist(&table, &rows)?;
        info!(table = name, columns = table.columns().len(), "table created");
        Ok(())
    }

    /// Append a row to a table
    pub fn insert(&self, table_name: &str, row: Row) -> Result<()> {
        let table = self.get_table(table_name)?;
        table.check_row(&row)?;

        let mut rows = table.write_rows();
        rows.push(row);
        self.persist(&table, &rows)
    }

    /// Column list and a copy of the rows of a table
    pub fn select_all(&self, table_name: &str) -> Result<(Vec<Column>, Vec<Row>)> {
        let table = self.get_table(table_name)?;
        let rows = table.scan();
        Ok((table.columns().to_vec(), rows))
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Result<Arc<Table>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// List all table names, sorted
    pub fn list_tables(&self) -> Vec<String> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    // A failed write keeps the in-memory mutation; the caller reports the
    // error instead of acknowledging the statement.
    fn persist(&self, table: &Table, rows: &[Row]) -> Result<()> {
        self.snapshots
            .save(table.name(), table.columns(), rows)
            .map_err(|e| {
                error!(table = table.name(), error = %e, "snapshot write failed");
                e
            })
    }
}
