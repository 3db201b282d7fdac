//! MiniSQL - A minimal MySQL-compatible database server written in Rust
//!
//! This library provides the components of the server:
//! - MySQL wire protocol (framing, handshake, commands, result sets)
//! - SQL parsing (lexer, parser, AST) and execution
//! - Table store with durable JSON snapshots
//! - TCP server, configuration and a protocol client

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod server;
pub mod sql;
pub mod storage;

pub use error::{Error, Result};
