//! Table storage for MiniSQL
//!
//! A table is an immutable column list plus an append-only sequence of rows
//! guarded by its own lock, so that writers to different tables never
//! contend with each other.

use super::row::Row;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type, kept as written (upper-cased by the parser)
    pub type_tag: String,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }

    /// Whether the declared type names an integer type
    pub fn is_integer(&self) -> bool {
        let base = self
            .type_tag
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();
        matches!(
            base.as_str(),
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT"
        )
    }
}

/// Check that a column list is usable for a new table
pub fn validate_columns(table: &str, columns: &[Column]) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::NoColumns(table.to_string()));
    }
    let mut seen = HashSet::new();
    for col in columns {
        if !seen.insert(col.name.as_str()) {
            return Err(Error::DuplicateColumn(col.name.clone(), table.to_string()));
        }
    }
    Ok(())
}

/// A table: name, columns and rows
#[derive(Debug)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: RwLock<Vec<Row>>,
}

impl Table {
    /// Create a new empty table
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self::with_rows(name, columns, Vec::new())
    }

    /// Create a table that already holds rows (used when loading snapshots)
    pub fn with_rows(name: impl Into<String>, columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: RwLock::new(rows),
        }
    }

    /// Get table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the column list
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of rows currently stored
    pub fn row_count(&self) -> usize {
        self.read_rows().len()
    }

    /// Copy of the current rows; later inserts are not visible through it
    pub fn scan(&self) -> Vec<Row> {
        self.read_rows().clone()
    }

    /// Check a row against the table's arity
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::SchemaMismatch {
                table: self.name.clone(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        Ok(())
    }

    // Rows are append-only, so a guard recovered from a poisoned lock never
    // exposes a partially written row.
    pub(crate) fn read_rows(&self) -> RwLockReadGuard<'_, Vec<Row>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_rows(&self) -> RwLockWriteGuard<'_, Vec<Row>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    fn users() -> Table {
        Table::new(
            "users",
            vec![Column::new("id", "INT"), Column::new("name", "TEXT")],
        )
    }

    #[test]
    fn test_integer_type_detection() {
        assert!(Column::new("id", "INT").is_integer());
        assert!(Column::new("id", "bigint").is_integer());
        assert!(Column::new("id", "INT(11)").is_integer());
        assert!(!Column::new("name", "VARCHAR(100)").is_integer());
        assert!(!Column::new("name", "TEXT").is_integer());
    }

    #[test]
    fn test_validate_columns() {
        assert!(validate_columns("t", &[Column::new("a", "INT")]).is_ok());
        assert!(matches!(
            validate_columns("t", &[]),
            Err(Error::NoColumns(_))
        ));
        let dup = vec![Column::new("a", "INT"), Column::new("a", "TEXT")];
        assert!(matches!(
            validate_columns("t", &dup),
            Err(Error::DuplicateColumn(_, _))
        ));
    }

    #[test]
    fn test_check_row_arity() {
        let table = users();
        let ok = Row::new(vec![Value::Integer(1), "Alice".into()]);
        let short = Row::new(vec![Value::Integer(1)]);

        assert!(table.check_row(&ok).is_ok());
        assert!(matches!(
            table.check_row(&short),
            Err(Error::SchemaMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_scan_is_a_copy() {
        let table = users();
        table
            .write_rows()
            .push(Row::new(vec![Value::Integer(1), "Alice".into()]));

        let copy = table.scan();
        table
            .write_rows()
            .push(Row::new(vec![Value::Integer(2), "Bob".into()]));

        assert_eq!(copy.len(), 1);
        assert_eq!(table.row_count(), 2);
    }
}
