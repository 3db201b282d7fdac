//! SQL Parser
//!
//! This module parses SQL tokens into an AST. Three statement shapes are
//! understood:
//!
//! ```text
//! CREATE TABLE <name> (<column> <type>[, ...])
//! INSERT INTO <name> VALUES (<literal>[, ...])
//! SELECT * FROM <name>
//! ```

use super::ast::*;
use super::lexer::Lexer;
use super::token::Token;
use crate::error::{Error, Result};
use crate::storage::{Column, Value};

/// SQL Parser
pub struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a SQL string
    pub fn new(sql: &str) -> Result<Self> {
        // Name the statement before lexing the rest so that unsupported
        // statements are reported as such, whatever characters follow.
        if let Token::Identifier(word) = Lexer::new(sql).next_token()? {
            return Err(Error::UnsupportedStatement(word.to_ascii_uppercase()));
        }

        let tokens = Lexer::new(sql).tokenize_spanned()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse a single SQL statement
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = self.parse_statement()?;

        // Consume optional semicolon
        if self.check(&Token::Semicolon) {
            self.advance();
        }

        if !self.is_at_end() {
            return Err(self.unexpected("end of statement"));
        }

        Ok(stmt)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.current().clone() {
            Token::Create => self.parse_create_table().map(Statement::CreateTable),
            Token::Insert => self.parse_insert().map(Statement::Insert),
            Token::Select => self.parse_select().map(Statement::Select),
            Token::Eof => Err(Error::ParseError("empty statement".to_string())),
            other if other.is_keyword() => {
                Err(Error::UnsupportedStatement(other.to_string()))
            }
            _ => Err(self.unexpected("CREATE, INSERT or SELECT")),
        }
    }

    // ========== CREATE TABLE Statement ==========

    fn parse_create_table(&mut self) -> Result<CreateTableStatement> {
        self.expect(&Token::Create)?;
        self.expect(&Token::Table)?;

        let table_name = self.expect_identifier()?;

        self.expect(&Token::LParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&Token::RParen)?;

        Ok(CreateTableStatement {
            table_name,
            columns,
        })
    }

    fn parse_column_def(&mut self) -> Result<Column> {
        let name = self.expect_identifier()?;
        let type_tag = self.parse_type_tag()?;
        Ok(Column::new(name, type_tag))
    }

    /// A type word with an optional argument list, e.g. `DECIMAL(10,2)`
    fn parse_type_tag(&mut self) -> Result<String> {
        let mut tag = match self.current().word() {
            Some(word) => word.to_ascii_uppercase(),
            None => return Err(self.unexpected("column type")),
        };
        self.advance();

        if self.check(&Token::LParen) {
            self.advance();
            let mut args = Vec::new();
            loop {
                match self.current().clone() {
                    arg @ (Token::IntegerLiteral(_)
                    | Token::StringLiteral(_)
                    | Token::Identifier(_)) => {
                        args.push(arg.to_string());
                        self.advance();
                    }
                    _ => return Err(self.unexpected("type argument")),
                }

                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(&Token::RParen)?;
            tag = format!("{}({})", tag, args.join(","));
        }

        Ok(tag)
    }

    // ========== INSERT Statement ==========

    fn parse_insert(&mut self) -> Result<InsertStatement> {
        self.expect(&Token::Insert)?;
        self.expect(&Token::Into)?;

        let table_name = self.expect_identifier()?;

        self.expect(&Token::Values)?;
        self.expect(&Token::LParen)?;

        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&Token::RParen)?;

        Ok(InsertStatement { table_name, values })
    }

    fn parse_literal(&mut self) -> Result<Value> {
        let value = match self.current() {
            Token::Null => Value::Null,
            Token::IntegerLiteral(n) => Value::Integer(*n),
            Token::StringLiteral(s) => Value::Text(s.clone()),
            _ => return Err(self.unexpected("literal")),
        };
        self.advance();
        Ok(value)
    }

    // ========== SELECT Statement ==========

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect(&Token::Select)?;
        self.expect(&Token::Asterisk)?;
        self.expect(&Token::From)?;

        let table_name = self.expect_identifier()?;

        Ok(SelectStatement { table_name })
    }

    // ========== Helpers ==========

    fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|(token, _)| token)
            .unwrap_or(&Token::Eof)
    }

    fn current_position(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|(_, pos)| *pos)
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current().to_string(),
            position: self.current_position(),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }
}

/// Parse one statement
pub fn parse(sql: &str) -> Result<Statement> {
    Parser::new(sql)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_table() {
        let stmt = parse("CREATE TABLE users (id INT, name varchar(100), price decimal(10, 2));")
            .unwrap();

        assert_eq!(
            stmt,
            Statement::CreateTable(CreateTableStatement {
                table_name: "users".to_string(),
                columns: vec![
                    Column::new("id", "INT"),
                    Column::new("name", "VARCHAR(100)"),
                    Column::new("price", "DECIMAL(10,2)"),
                ],
            })
        );
    }

    #[test]
    fn test_parse_insert() {
        let stmt = parse("insert into users values (-1, 'O''Brien', NULL)").unwrap();

        assert_eq!(
            stmt,
            Statement::Insert(InsertStatement {
                table_name: "users".to_string(),
                values: vec![
                    Value::Integer(-1),
                    Value::Text("O'Brien".to_string()),
                    Value::Null,
                ],
            })
        );
    }

    #[test]
    fn test_parse_select() {
        let stmt = parse("  select * FROM `Users` ;  ").unwrap();
        assert_eq!(
            stmt,
            Statement::Select(SelectStatement {
                table_name: "Users".to_string()
            })
        );
        assert_eq!(stmt.table_name(), "Users");
    }

    #[test]
    fn test_keywords_as_column_types() {
        let stmt = parse("CREATE TABLE t (a TEXT, b null)").unwrap();
        match stmt {
            Statement::CreateTable(create) => {
                assert_eq!(create.columns[0].type_tag, "TEXT");
                assert_eq!(create.columns[1].type_tag, "NULL");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_statements() {
        assert!(matches!(
            parse("UPDATE users SET id = 2"),
            Err(Error::UnsupportedStatement(word)) if word == "UPDATE"
        ));
        assert!(matches!(
            parse("drop table users"),
            Err(Error::UnsupportedStatement(word)) if word == "DROP"
        ));
        assert!(matches!(
            parse("FROM users"),
            Err(Error::UnsupportedStatement(word)) if word == "FROM"
        ));
    }

    #[test]
    fn test_syntax_errors_name_position() {
        match parse("SELECT id FROM users") {
            Err(Error::UnexpectedToken {
                found, position, ..
            }) => {
                assert_eq!(found, "id");
                assert_eq!(position, 7);
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse("INSERT INTO t VALUES (1, 2") {
            Err(Error::UnexpectedToken { found, position, .. }) => {
                assert_eq!(found, "end of input");
                assert_eq!(position, 26);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_statements() {
        assert!(parse("").is_err());
        assert!(parse("CREATE TABLE t ()").is_err());
        assert!(parse("CREATE TABLE t (id)").is_err());
        assert!(parse("INSERT INTO t VALUES ()").is_err());
        assert!(parse("INSERT INTO t VALUES (abc)").is_err());
        assert!(parse("SELECT * FROM t extra").is_err());
        assert!(parse("SELECT * FROM t; SELECT * FROM t").is_err());
        assert!(matches!(
            parse("INSERT INTO t VALUES (99999999999999999999)"),
            Err(Error::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_parse_errors_are_statement_errors() {
        for sql in ["", "SELECT", "DELETE FROM t", "SELECT * FROM 'x'"] {
            let err = parse(sql).unwrap_err();
            assert!(err.is_statement_error(), "{}: {:?}", sql, err);
        }
    }
}
