//! SQL module
//!
//! This module contains the lexer, the parser and the statement AST.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{CreateTableStatement, InsertStatement, SelectStatement, Statement};
pub use lexer::Lexer;
pub use parser::{parse, Parser};
pub use token::Token;
