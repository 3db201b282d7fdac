//! SQL Abstract Syntax Tree (AST)
//!
//! This module defines the AST nodes for SQL statements.

use crate::storage::{Column, Value};

/// A SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE TABLE statement
    CreateTable(CreateTableStatement),
    /// INSERT statement
    Insert(InsertStatement),
    /// SELECT * statement
    Select(SelectStatement),
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    /// Table name
    pub table_name: String,
    /// Column definitions, type tags upper-cased
    pub columns: Vec<Column>,
}

/// INSERT statement (one row)
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// Target table
    pub table_name: String,
    /// Literal values, in column order
    pub values: Vec<Value>,
}

/// SELECT * FROM statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Source table
    pub table_name: String,
}

impl Statement {
    /// Name of the table the statement touches
    pub fn table_name(&self) -> &str {
        match self {
            Statement::CreateTable(stmt) => &stmt.table_name,
            Statement::Insert(stmt) => &stmt.table_name,
            Statement::Select(stmt) => &stmt.table_name,
        }
    }
}
