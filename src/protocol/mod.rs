//! MySQL-compatible wire protocol
//!
//! This module contains the protocol engine components:
//! - Packet framing and sequence numbers
//! - Length-encoded codec
//! - Challenge-response authentication and the connection handshake
//! - Command decoding
//! - OK / ERR / EOF packets and text result sets

pub mod auth;
pub mod codec;
pub mod command;
pub mod handshake;
pub mod packet;
pub mod response;

pub use auth::{Credentials, Scramble};
pub use command::Command;
pub use handshake::{Greeting, Handshake, HandshakeResponse};
pub use packet::PacketChannel;

/// Capability flags understood by this server
pub mod capabilities {
    pub const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;
    pub const CLIENT_LONG_FLAG: u32 = 0x0000_0004;
    pub const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;
    pub const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
    pub const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;
    pub const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
    pub const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;
    pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;

    /// Everything advertised in the greeting
    pub const SERVER_CAPABILITIES: u32 = CLIENT_LONG_PASSWORD
        | CLIENT_LONG_FLAG
        | CLIENT_CONNECT_WITH_DB
        | CLIENT_PROTOCOL_41
        | CLIENT_TRANSACTIONS
        | CLIENT_SECURE_CONNECTION
        | CLIENT_PLUGIN_AUTH
        | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA;
}

/// Protocol version sent in the greeting
pub const PROTOCOL_VERSION: u8 = 10;

/// Server version string sent in the greeting
pub const SERVER_VERSION: &str = concat!("5.7.0-minisql-", env!("CARGO_PKG_VERSION"));

/// utf8_general_ci
pub const CHARSET_UTF8: u8 = 33;

/// binary
pub const CHARSET_BINARY: u8 = 63;

/// SQL state sent with every ERR packet
pub const SQL_STATE: &str = "HY000";
