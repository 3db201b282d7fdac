//! Query Executor for MiniSQL
//!
//! This module runs parsed statements against the table store.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::sql::{self, Statement};
use crate::storage::{Column, Row, TableStore};

/// Query result
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// A write statement completed
    Done,
    /// Rows read from a table
    Rows {
        /// Source table
        table: String,
        /// Column definitions
        columns: Vec<Column>,
        /// Result rows
        rows: Vec<Row>,
    },
}

impl QueryResult {
    /// Number of rows returned (0 for writes)
    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Done => 0,
            QueryResult::Rows { rows, .. } => rows.len(),
        }
    }
}

/// Execution Engine
///
/// Cheap to clone; every clone runs against the same store.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    store: Arc<TableStore>,
}

impl ExecutionEngine {
    /// Create a new execution engine
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }

    /// The store statements run against
    pub fn store(&self) -> &Arc<TableStore> {
        &self.store
    }

    /// Parse and execute one SQL statement
    pub fn execute_sql(&self, sql: &str) -> Result<QueryResult> {
        let stmt = sql::parse(sql)?;
        self.execute(stmt)
    }

    /// Execute a parsed statement
    pub fn execute(&self, stmt: Statement) -> Result<QueryResult> {
        match stmt {
            Statement::CreateTable(create) => {
                debug!(table = %create.table_name, columns = create.columns.len(), "create table");
                self.store.create_table(&create.table_name, create.columns)?;
                Ok(QueryResult::Done)
            }
            Statement::Insert(insert) => {
                let row = Row::from(insert.values);
                debug!(table = %insert.table_name, row = %row, "insert");
                self.store.insert(&insert.table_name, row)?;
                Ok(QueryResult::Done)
            }
            Statement::Select(select) => {
                let (columns, rows) = self.store.select_all(&select.table_name)?;
                debug!(table = %select.table_name, rows = rows.len(), "select");
                Ok(QueryResult::Rows {
                    table: select.table_name,
                    columns,
                    rows,
                })
            }
        }
    }
}

/// Parse and execute one SQL statement against a store
pub fn execute(store: &Arc<TableStore>, sql: &str) -> Result<QueryResult> {
    ExecutionEngine::new(Arc::clone(store)).execute_sql(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::Value;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ExecutionEngine) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TableStore::open(dir.path()).unwrap());
        (dir, ExecutionEngine::new(store))
    }

    #[test]
    fn test_create_insert_select() {
        let (_dir, engine) = setup();

        assert_eq!(
            engine
                .execute_sql("CREATE TABLE users (id INT, name TEXT)")
                .unwrap(),
            QueryResult::Done
        );
        engine
            .execute_sql("INSERT INTO users VALUES (1, 'Alice')")
            .unwrap();
        engine
            .execute_sql("INSERT INTO users VALUES (2, NULL)")
            .unwrap();

        let result = engine.execute_sql("SELECT * FROM users").unwrap();
        assert_eq!(result.row_count(), 2);
        match result {
            QueryResult::Rows {
                table,
                columns,
                rows,
            } => {
                assert_eq!(table, "users");
                assert_eq!(
                    columns,
                    vec![Column::new("id", "INT"), Column::new("name", "TEXT")]
                );
                assert_eq!(rows[0].values(), &[Value::Integer(1), Value::from("Alice")]);
                assert_eq!(rows[1].values(), &[Value::Integer(2), Value::Null]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_select_empty_table() {
        let (_dir, engine) = setup();
        engine.execute_sql("CREATE TABLE t (a INT)").unwrap();

        let result = engine.execute_sql("SELECT * FROM t").unwrap();
        assert!(matches!(result, QueryResult::Rows { ref rows, .. } if rows.is_empty()));
    }

    #[test]
    fn test_statement_errors() {
        let (dir, engine) = setup();

        assert!(matches!(
            execute(engine.store(), "SELECT * FROM missing"),
            Err(Error::TableNotFound(_))
        ));

        engine.execute_sql("CREATE TABLE t (a INT)").unwrap();
        assert!(matches!(
            engine.execute_sql("CREATE TABLE t (b INT)"),
            Err(Error::TableAlreadyExists(_))
        ));
        assert!(matches!(
            engine.execute_sql("INSERT INTO t VALUES (1, 2)"),
            Err(Error::SchemaMismatch { .. })
        ));
        assert!(matches!(
            engine.execute_sql("CREATE TABLE u (a INT, a TEXT)"),
            Err(Error::DuplicateColumn(_, _))
        ));
        assert!(matches!(
            engine.execute_sql("DELETE FROM t"),
            Err(Error::UnsupportedStatement(_))
        ));

        // Failed statements leave no snapshot behind.
        assert!(!dir.path().join("u.json").exists());
    }
}
