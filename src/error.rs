//! Error types for MiniSQL
//!
//! This module defines all error types used throughout the server, the
//! storage engine and the protocol client.

use thiserror::Error;

/// Error code sent for rejected logins
pub const ER_ACCESS_DENIED: u16 = 1045;

/// Error code sent for every other failure
pub const ER_SYNTAX_ERROR: u16 = 1064;

/// The main error type for MiniSQL
#[derive(Error, Debug)]
pub enum Error {
    // ========== Protocol Errors ==========
    #[error("Protocol error: malformed packet - {0}")]
    MalformedPacket(String),

    #[error("Protocol error: packets out of order (expected {expected}, got {found})")]
    PacketOutOfOrder { expected: u8, found: u8 },

    #[error("unsupported command")]
    UnsupportedCommand(u8),

    // ========== Authentication Errors ==========
    #[error("Access denied for user '{0}'")]
    AccessDenied(String),

    // ========== Lexer Errors ==========
    #[error("Lexer error: unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Lexer error: unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Lexer error: invalid number format at position {0}")]
    InvalidNumber(usize),

    // ========== Parser Errors ==========
    #[error("Parse error: unexpected token '{found}' at position {position}, expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("Parse error: unsupported statement '{0}'")]
    UnsupportedStatement(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Catalog error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Catalog error: column '{0}' specified twice in table '{1}'")]
    DuplicateColumn(String, String),

    #[error("Catalog error: invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("Catalog error: table '{0}' must have at least one column")]
    NoColumns(String),

    #[error("Schema error: table '{table}' has {expected} column(s) but {found} value(s) were given")]
    SchemaMismatch {
        table: String,
        expected: usize,
        found: usize,
    },

    // ========== Persistence Errors ==========
    #[error("Storage error: failed to persist table '{table}': {source}")]
    PersistFailed {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: corrupt snapshot '{path}': {reason}")]
    CorruptSnapshot { path: String, reason: String },

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ========== Client Errors ==========
    #[error("ERROR {code} ({sql_state}): {message}")]
    ServerError {
        code: u16,
        sql_state: String,
        message: String,
    },

    // ========== Configuration Errors ==========
    #[error("Config error: {0}")]
    Config(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The error code reported to the client in an ERR packet
    pub fn error_code(&self) -> u16 {
        match self {
            Error::AccessDenied(_) => ER_ACCESS_DENIED,
            Error::ServerError { code, .. } => *code,
            _ => ER_SYNTAX_ERROR,
        }
    }

    /// Errors that leave the connection usable after an ERR reply
    pub fn is_statement_error(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedCharacter(_, _)
                | Error::UnterminatedString(_)
                | Error::InvalidNumber(_)
                | Error::UnexpectedToken { .. }
                | Error::UnsupportedStatement(_)
                | Error::ParseError(_)
                | Error::TableNotFound(_)
                | Error::TableAlreadyExists(_)
                | Error::DuplicateColumn(_, _)
                | Error::InvalidTableName(_)
                | Error::NoColumns(_)
                | Error::SchemaMismatch { .. }
        )
    }

    /// True when the peer closed the stream between packets
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::IoError(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Result type alias for MiniSQL operations
pub type Result<T> = std::result::Result<T, Error>;
