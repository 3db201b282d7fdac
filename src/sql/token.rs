//! SQL Token definitions
//!
//! The statement language is small: three statement shapes, literals and a
//! handful of delimiters. Keywords are matched case-insensitively; any other
//! word becomes an identifier.

use std::fmt;

/// SQL Token types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    // ========== Keywords ==========
    Create,
    Table,
    Insert,
    Into,
    Values,
    Select,
    From,
    Null,

    // ========== Literals ==========
    /// Integer literal
    IntegerLiteral(i64),
    /// String literal (single-quoted)
    StringLiteral(String),
    /// Identifier (bare or backtick-quoted)
    Identifier(String),

    // ========== Delimiters ==========
    /// (
    LParen,
    /// )
    RParen,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// *
    Asterisk,

    // ========== Special ==========
    /// End of input
    Eof,
}

impl Token {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::Create
                | Token::Table
                | Token::Insert
                | Token::Into
                | Token::Values
                | Token::Select
                | Token::From
                | Token::Null
        )
    }

    /// Look up a keyword (case-insensitive)
    pub fn from_keyword(s: &str) -> Option<Token> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Some(Token::Create),
            "TABLE" => Some(Token::Table),
            "INSERT" => Some(Token::Insert),
            "INTO" => Some(Token::Into),
            "VALUES" => Some(Token::Values),
            "SELECT" => Some(Token::Select),
            "FROM" => Some(Token::From),
            "NULL" => Some(Token::Null),
            _ => None,
        }
    }

    /// The source word for a keyword or identifier token
    ///
    /// Column types are plain words, so `TEXT` or `INT` reach the parser
    /// either as identifiers or, for words that double as keywords, as
    /// keyword tokens.
    pub fn word(&self) -> Option<String> {
        match self {
            Token::Identifier(name) => Some(name.clone()),
            t if t.is_keyword() => Some(t.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Create => write!(f, "CREATE"),
            Token::Table => write!(f, "TABLE"),
            Token::Insert => write!(f, "INSERT"),
            Token::Into => write!(f, "INTO"),
            Token::Values => write!(f, "VALUES"),
            Token::Select => write!(f, "SELECT"),
            Token::From => write!(f, "FROM"),
            Token::Null => write!(f, "NULL"),
            Token::IntegerLiteral(n) => write!(f, "{}", n),
            Token::StringLiteral(s) => write!(f, "'{}'", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Asterisk => write!(f, "*"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}
