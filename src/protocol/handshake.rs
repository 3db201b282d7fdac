//! Connection handshake
//!
//! 1. The server sends a [`Greeting`] carrying a fresh 20-byte scramble,
//!    split into an 8-byte and a 12-byte fragment.
//! 2. The client replies with a [`HandshakeResponse`]: its capabilities, its
//!    username and the scrambled password.
//! 3. The server verifies the response and sends OK, or ERR 1045 and drops
//!    the connection.

use super::auth::{Credentials, Scramble, AUTH_PLUGIN_NAME, SCRAMBLE_LEN, SCRAMBLE_PART1_LEN};
use super::capabilities::*;
use super::codec::{
    put_lenenc_str, put_null_terminated, read_bytes, read_lenenc_bytes, read_null_terminated,
    read_null_terminated_str,
};
use super::packet::PacketChannel;
use super::response::{write_error, write_ok};
use super::{CHARSET_UTF8, PROTOCOL_VERSION, SERVER_VERSION};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Auth data length advertised in the greeting (scramble plus NUL)
const AUTH_DATA_LEN: u8 = SCRAMBLE_LEN as u8 + 1;

/// Reserved bytes in the greeting
const GREETING_RESERVED_LEN: usize = 10;

/// Reserved bytes in the handshake response
const RESPONSE_RESERVED_LEN: usize = 23;

/// Default max packet size announced by the client
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// Largest login packet read from an unauthenticated peer
pub const MAX_LOGIN_PACKET_SIZE: usize = 64 * 1024;

fn truncated(what: &'static str) -> impl Fn(std::io::Error) -> Error {
    move |_| Error::MalformedPacket(format!("truncated {}", what))
}

/// The server's initial handshake packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub scramble: Scramble,
    pub capabilities: u32,
    pub charset: u8,
    pub status: u16,
    pub auth_plugin: String,
}

impl Greeting {
    /// Greeting for a new connection
    pub fn new(connection_id: u32, scramble: Scramble) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            server_version: SERVER_VERSION.to_string(),
            connection_id,
            scramble,
            capabilities: SERVER_CAPABILITIES,
            charset: CHARSET_UTF8,
            status: 0,
            auth_plugin: AUTH_PLUGIN_NAME.to_string(),
        }
    }

    /// Encode the greeting payload
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_u8(self.protocol_version);
        put_null_terminated(&mut buf, self.server_version.as_bytes());
        buf.put_u32_le(self.connection_id);
        buf.put_slice(self.scramble.part1());
        buf.put_u8(0); // filler
        buf.put_u16_le((self.capabilities & 0xffff) as u16);
        buf.put_u8(self.charset);
        buf.put_u16_le(self.status);
        buf.put_u16_le((self.capabilities >> 16) as u16);
        buf.put_u8(AUTH_DATA_LEN);
        buf.put_slice(&[0u8; GREETING_RESERVED_LEN]);
        buf.put_slice(self.scramble.part2());
        buf.put_u8(0); // filler
        put_null_terminated(&mut buf, self.auth_plugin.as_bytes());
        buf
    }

    /// Decode a greeting payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut input = payload;
        let protocol_version = input.read_u8().map_err(truncated("greeting"))?;
        if protocol_version != PROTOCOL_VERSION {
            return Err(Error::MalformedPacket(format!(
                "unsupported protocol version {}",
                protocol_version
            )));
        }
        let server_version = read_null_terminated_str(&mut input)?;
        let connection_id = input
            .read_u32::<LittleEndian>()
            .map_err(truncated("greeting"))?;

        let mut scramble = [0u8; SCRAMBLE_LEN];
        scramble[..SCRAMBLE_PART1_LEN].copy_from_slice(read_bytes(&mut input, SCRAMBLE_PART1_LEN)?);
        read_bytes(&mut input, 1)?; // filler

        let cap_low = input
            .read_u16::<LittleEndian>()
            .map_err(truncated("greeting"))?;
        let charset = input.read_u8().map_err(truncated("greeting"))?;
        let status = input
            .read_u16::<LittleEndian>()
            .map_err(truncated("greeting"))?;
        let cap_high = input
            .read_u16::<LittleEndian>()
            .map_err(truncated("greeting"))?;
        let capabilities = u32::from(cap_low) | (u32::from(cap_high) << 16);
        let auth_data_len = input.read_u8().map_err(truncated("greeting"))?;
        read_bytes(&mut input, GREETING_RESERVED_LEN)?;

        // The second fragment is at least 13 bytes including its NUL.
        let part2_len = usize::max(13, usize::from(auth_data_len).saturating_sub(SCRAMBLE_PART1_LEN));
        let part2 = read_bytes(&mut input, part2_len)?;
        let part2 = &part2[..SCRAMBLE_LEN - SCRAMBLE_PART1_LEN];
        scramble[SCRAMBLE_PART1_LEN..].copy_from_slice(part2);

        let auth_plugin = if capabilities & CLIENT_PLUGIN_AUTH != 0 && !input.is_empty() {
            match read_null_terminated(&mut input) {
                Ok(name) => String::from_utf8_lossy(name).into_owned(),
                Err(_) => String::from_utf8_lossy(input).into_owned(),
            }
        } else {
            AUTH_PLUGIN_NAME.to_string()
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            scramble: Scramble::from_bytes(scramble),
            capabilities,
            charset,
            status,
            auth_plugin,
        })
    }
}

/// The client's reply to the greeting (protocol 4.1 layout)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub capabilities: u32,
    pub max_packet_size: u32,
    pub charset: u8,
    pub username: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub auth_plugin: Option<String>,
}

impl HandshakeResponse {
    /// Login for `username` answering the given greeting
    pub fn new(greeting: &Greeting, username: &str, password: &str) -> Self {
        let wanted = CLIENT_LONG_PASSWORD
            | CLIENT_LONG_FLAG
            | CLIENT_PROTOCOL_41
            | CLIENT_TRANSACTIONS
            | CLIENT_SECURE_CONNECTION
            | CLIENT_PLUGIN_AUTH
            | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA;
        Self {
            capabilities: wanted & greeting.capabilities,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            charset: CHARSET_UTF8,
            username: username.to_string(),
            auth_response: super::auth::scramble_password(&greeting.scramble, password),
            database: None,
            auth_plugin: Some(AUTH_PLUGIN_NAME.to_string()),
        }
    }

    /// Encode the response payload
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64 + self.username.len());
        buf.put_u32_le(self.capabilities);
        buf.put_u32_le(self.max_packet_size);
        buf.put_u8(self.charset);
        buf.put_slice(&[0u8; RESPONSE_RESERVED_LEN]);
        put_null_terminated(&mut buf, self.username.as_bytes());

        if self.capabilities & CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
            put_lenenc_str(&mut buf, &self.auth_response);
        } else if self.capabilities & CLIENT_SECURE_CONNECTION != 0 {
            buf.put_u8(self.auth_response.len() as u8);
            buf.put_slice(&self.auth_response);
        } else {
            put_null_terminated(&mut buf, &self.auth_response);
        }

        if self.capabilities & CLIENT_CONNECT_WITH_DB != 0 {
            put_null_terminated(&mut buf, self.database.as_deref().unwrap_or("").as_bytes());
        }
        if self.capabilities & CLIENT_PLUGIN_AUTH != 0 {
            let plugin = self.auth_plugin.as_deref().unwrap_or(AUTH_PLUGIN_NAME);
            put_null_terminated(&mut buf, plugin.as_bytes());
        }
        buf
    }

    /// Decode a response payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut input = payload;
        let capabilities = input
            .read_u32::<LittleEndian>()
            .map_err(truncated("handshake response"))?;
        if capabilities & CLIENT_PROTOCOL_41 == 0 {
            return Err(Error::MalformedPacket(
                "client does not support protocol 4.1".to_string(),
            ));
        }
        let max_packet_size = input
            .read_u32::<LittleEndian>()
            .map_err(truncated("handshake response"))?;
        let charset = input.read_u8().map_err(truncated("handshake response"))?;
        read_bytes(&mut input, RESPONSE_RESERVED_LEN)?;

        let username = read_null_terminated_str(&mut input)?;

        let auth_response = if capabilities & CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
            read_lenenc_bytes(&mut input)?.to_vec()
        } else if capabilities & CLIENT_SECURE_CONNECTION != 0 {
            let len = input.read_u8().map_err(truncated("handshake response"))?;
            read_bytes(&mut input, usize::from(len))?.to_vec()
        } else {
            read_null_terminated(&mut input)?.to_vec()
        };

        let database = if capabilities & CLIENT_CONNECT_WITH_DB != 0 && !input.is_empty() {
            Some(read_null_terminated_str(&mut input)?)
        } else {
            None
        };
        let auth_plugin = if capabilities & CLIENT_PLUGIN_AUTH != 0 && !input.is_empty() {
            Some(read_null_terminated_str(&mut input)?)
        } else {
            None
        };

        Ok(Self {
            capabilities,
            max_packet_size,
            charset,
            username,
            auth_response,
            database,
            auth_plugin,
        })
    }
}

/// Server side of the handshake for one connection
///
/// Running it consumes it: a handshake either authenticates a user or fails,
/// and is never resumed.
#[derive(Debug)]
pub struct Handshake {
    connection_id: u32,
    scramble: Scramble,
}

impl Handshake {
    /// Start a handshake with a fresh scramble
    pub fn new(connection_id: u32) -> Self {
        Self::with_scramble(connection_id, Scramble::generate())
    }

    /// Start a handshake with a known scramble
    pub fn with_scramble(connection_id: u32, scramble: Scramble) -> Self {
        Self {
            connection_id,
            scramble,
        }
    }

    /// The greeting this handshake sends
    pub fn greeting(&self) -> Greeting {
        Greeting::new(self.connection_id, self.scramble)
    }

    /// Greet the client and verify its login, returning the username
    pub async fn run<S>(self, channel: &mut PacketChannel<S>, credentials: &Credentials) -> Result<String>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        channel.reset_sequence();
        channel.write_packet(&self.greeting().encode()).await?;
        channel.flush().await?;

        let limit = channel.max_packet_size();
        channel.set_max_packet_size(limit.min(MAX_LOGIN_PACKET_SIZE));
        let payload = channel.read_packet().await;
        channel.set_max_packet_size(limit);

        let login = match HandshakeResponse::decode(&payload?) {
            Ok(login) => login,
            Err(e) => {
                warn!(connection_id = self.connection_id, error = %e, "malformed login packet");
                write_error(channel, e.error_code(), &e.to_string()).await?;
                return Err(e);
            }
        };

        if credentials.verify(&login.username, &self.scramble, &login.auth_response) {
            debug!(
                connection_id = self.connection_id,
                user = %login.username,
                "login accepted"
            );
            write_ok(channel).await?;
            Ok(login.username)
        } else {
            let err = Error::AccessDenied(login.username);
            warn!(connection_id = self.connection_id, error = %err, "login rejected");
            write_error(channel, err.error_code(), &err.to_string()).await?;
            Err(err)
        }
    }
}
