//! Client commands
//!
//! The first byte of every packet a client sends after the handshake is a
//! command code. Only `COM_QUIT` and `COM_QUERY` are served.

use crate::error::{Error, Result};

/// COM_QUIT
pub const COM_QUIT: u8 = 0x01;

/// COM_QUERY
pub const COM_QUERY: u8 = 0x03;

/// A decoded client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Close the connection, no reply
    Quit,
    /// Run one SQL statement
    Query(String),
}

impl Command {
    /// Decode a command packet
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (&code, body) = payload
            .split_first()
            .ok_or_else(|| Error::MalformedPacket("empty command packet".to_string()))?;

        match code {
            COM_QUIT => Ok(Command::Quit),
            COM_QUERY => {
                let sql = std::str::from_utf8(body).map_err(|_| {
                    Error::MalformedPacket("query is not valid UTF-8".to_string())
                })?;
                Ok(Command::Query(sql.to_string()))
            }
            other => Err(Error::UnsupportedCommand(other)),
        }
    }

    /// Encode a command packet
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Quit => vec![COM_QUIT],
            Command::Query(sql) => {
                let mut payload = Vec::with_capacity(1 + sql.len());
                payload.push(COM_QUERY);
                payload.extend_from_slice(sql.as_bytes());
                payload
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&[0x01]).unwrap(), Command::Quit);
        assert_eq!(
            Command::parse(b"\x03SELECT * FROM users").unwrap(),
            Command::Query("SELECT * FROM users".to_string())
        );
        assert_eq!(
            Command::parse(&[0x03]).unwrap(),
            Command::Query(String::new())
        );
    }

    #[test]
    fn test_unsupported_command() {
        // COM_PING
        let err = Command::parse(&[0x0e]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCommand(0x0e)));
        assert_eq!(err.to_string(), "unsupported command");
    }

    #[test]
    fn test_malformed_commands() {
        assert!(matches!(
            Command::parse(&[]),
            Err(Error::MalformedPacket(_))
        ));
        assert!(matches!(
            Command::parse(&[0x03, 0xff, 0xfe]),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_encode() {
        assert_eq!(Command::Quit.encode(), vec![0x01]);
        assert_eq!(Command::Query("SELECT".into()).encode(), b"\x03SELECT");
    }
}
