//! SQL Lexer (Tokenizer)
//!
//! This module converts SQL strings into a stream of tokens.

use super::token::Token;
use crate::error::{Error, Result};

/// SQL Lexer
pub struct Lexer {
    /// Input characters
    input: Vec<char>,
    /// Current position in input
    position: usize,
    /// Start of the last token returned
    token_start: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    /// Tokenize the entire input
    #[cfg(test)]
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        Ok(self
            .tokenize_spanned()?
            .into_iter()
            .map(|(token, _)| token)
            .collect())
    }

    /// Tokenize the entire input, keeping each token's start position
    pub fn tokenize_spanned(&mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push((token, self.token_start));
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        self.token_start = self.position;

        if self.is_at_end() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();
        let single = match ch {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '*' => Some(Token::Asterisk),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match ch {
            '\'' => self.read_string(),
            '`' => self.read_quoted_identifier(),
            '-' | '+' => {
                let start_pos = self.position;
                self.advance();
                if !self.is_at_end() && self.current_char().is_ascii_digit() {
                    self.read_number(start_pos, ch == '-')
                } else {
                    Err(Error::UnexpectedCharacter(ch, start_pos))
                }
            }
            c if c.is_ascii_digit() => self.read_number(self.position, false),
            c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(),
            c => Err(Error::UnexpectedCharacter(c, self.position)),
        }
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get the current character
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    /// Peek at the next character
    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Read a string literal (single-quoted, `''` escapes a quote)
    fn read_string(&mut self) -> Result<Token> {
        let start_pos = self.position;
        self.advance(); // skip opening quote

        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();

            if ch == '\'' {
                if self.peek_char() == Some('\'') {
                    value.push('\'');
                    self.advance();
                    self.advance();
                } else {
                    self.advance(); // skip closing quote
                    return Ok(Token::StringLiteral(value));
                }
            } else {
                value.push(ch);
                self.advance();
            }
        }

        Err(Error::UnterminatedString(start_pos))
    }

    /// Read a backtick-quoted identifier
    fn read_quoted_identifier(&mut self) -> Result<Token> {
        let start_pos = self.position;
        self.advance(); // skip opening backtick

        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();
            self.advance();

            if ch == '`' {
                return if is_identifier(&value) {
                    Ok(Token::Identifier(value))
                } else {
                    Err(Error::ParseError(format!(
                        "invalid quoted identifier at position {}",
                        start_pos
                    )))
                };
            }
            value.push(ch);
        }

        Err(Error::UnterminatedString(start_pos))
    }

    /// Read an integer, with its sign already consumed
    fn read_number(&mut self, start_pos: usize, negative: bool) -> Result<Token> {
        let mut value = String::new();
        if negative {
            value.push('-');
        }

        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            value.push(self.current_char());
            self.advance();
        }

        // A number running straight into a word is not a number.
        if !self.is_at_end() && is_identifier_char(self.current_char()) {
            return Err(Error::InvalidNumber(start_pos));
        }

        value
            .parse::<i64>()
            .map(Token::IntegerLiteral)
            .map_err(|_| Error::InvalidNumber(start_pos))
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Result<Token> {
        let mut value = String::new();

        while !self.is_at_end() && is_identifier_char(self.current_char()) {
            value.push(self.current_char());
            self.advance();
        }

        Ok(Token::from_keyword(&value).unwrap_or(Token::Identifier(value)))
    }
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// Whether `s` is a valid identifier: `[A-Za-z_][A-Za-z0-9_$]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(is_identifier_char),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_select() {
        let mut lexer = Lexer::new("SELECT * FROM users");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Asterisk,
                Token::From,
                Token::Identifier("users".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_create_table() {
        let mut lexer = Lexer::new("create table users (id INT, name VARCHAR(100));");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0], Token::Create);
        assert_eq!(tokens[1], Token::Table);
        assert_eq!(tokens[2], Token::Identifier("users".to_string()));
        assert_eq!(tokens[3], Token::LParen);
        assert_eq!(tokens[8], Token::Identifier("VARCHAR".to_string()));
        assert_eq!(tokens[10], Token::IntegerLiteral(100));
        assert_eq!(tokens[12], Token::RParen);
        assert_eq!(tokens[13], Token::Semicolon);
    }

    #[test]
    fn test_token_positions() {
        let mut lexer = Lexer::new("SELECT  *\nFROM t");
        let positions: Vec<usize> = lexer
            .tokenize_spanned()
            .unwrap()
            .into_iter()
            .map(|(_, pos)| pos)
            .collect();
        assert_eq!(positions, vec![0, 8, 10, 15, 16]);
    }

    #[test]
    fn test_escaped_string() {
        let mut lexer = Lexer::new("'it''s a test'");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0], Token::StringLiteral("it's a test".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("VALUES ('abc");
        assert!(matches!(
            lexer.tokenize(),
            Err(Error::UnterminatedString(8))
        ));
    }

    #[test]
    fn test_signed_integers() {
        let mut lexer = Lexer::new("(-42, +7, 0)");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[1], Token::IntegerLiteral(-42));
        assert_eq!(tokens[3], Token::IntegerLiteral(7));
        assert_eq!(tokens[5], Token::IntegerLiteral(0));
    }

    #[test]
    fn test_integer_bounds() {
        let mut lexer = Lexer::new("-9223372036854775808");
        assert_eq!(lexer.tokenize().unwrap()[0], Token::IntegerLiteral(i64::MIN));

        let mut lexer = Lexer::new("9223372036854775808");
        assert!(matches!(lexer.tokenize(), Err(Error::InvalidNumber(0))));

        let mut lexer = Lexer::new("12abc");
        assert!(matches!(lexer.tokenize(), Err(Error::InvalidNumber(0))));
    }

    #[test]
    fn test_quoted_identifier() {
        let mut lexer = Lexer::new("`select`");
        assert_eq!(
            lexer.tokenize().unwrap()[0],
            Token::Identifier("select".to_string())
        );

        let mut lexer = Lexer::new("`bad name`");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("SELECT * FROM t WHERE a = 1");
        assert!(matches!(
            lexer.tokenize(),
            Err(Error::UnexpectedCharacter('=', 24))
        ));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("users"));
        assert!(is_identifier("_tmp$1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
