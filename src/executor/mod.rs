//! Query execution module
//!
//! This module runs parsed statements against the table store.

pub mod executor;

pub use executor::{execute, ExecutionEngine, QueryResult};
