//! MySQL-protocol client
//!
//! Enough of the client side of the protocol to log in with
//! `mysql_native_password` and run text queries. Used by the CLI and by
//! the integration tests.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::protocol::codec::read_lenenc_int;
use crate::protocol::handshake::{Greeting, HandshakeResponse};
use crate::protocol::response::{
    is_eof_packet, parse_column_name, parse_err, parse_ok, parse_row, ERR_HEADER, OK_HEADER,
};
use crate::protocol::{Command, PacketChannel};

/// Server reply to a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Statement completed
    Ok,
    /// Rows in text form, `None` for NULL
    ResultSet {
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    },
}

/// An authenticated client session
pub struct Client<S> {
    channel: PacketChannel<S>,
    connection_id: u32,
    server_version: String,
}

impl Client<TcpStream> {
    /// Connect over TCP and log in
    pub async fn connect(addr: impl ToSocketAddrs, user: &str, password: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::handshake(stream, user, password).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Log in over an already connected stream
    pub async fn handshake(stream: S, user: &str, password: &str) -> Result<Self> {
        let mut channel = PacketChannel::new(stream);

        let greeting = Greeting::decode(&channel.read_packet().await?)?;
        let login = HandshakeResponse::new(&greeting, user, password);
        channel.write_packet(&login.encode()).await?;
        channel.flush().await?;

        let reply = channel.read_packet().await?;
        match reply.first() {
            Some(&OK_HEADER) => {}
            Some(&ERR_HEADER) => return Err(parse_err(&reply)),
            _ => {
                return Err(Error::MalformedPacket(
                    "unexpected reply to login".to_string(),
                ))
            }
        }

        Ok(Self {
            channel,
            connection_id: greeting.connection_id,
            server_version: greeting.server_version,
        })
    }

    /// Connection id assigned by the server
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Version string from the greeting
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Run one statement
    pub async fn query(&mut self, sql: &str) -> Result<Response> {
        self.send(&Command::Query(sql.to_string())).await?;

        let first = self.channel.read_packet().await?;
        match first.first() {
            Some(&OK_HEADER) => {
                parse_ok(&first)?;
                Ok(Response::Ok)
            }
            Some(&ERR_HEADER) => Err(parse_err(&first)),
            Some(_) => self.read_result_set(&first).await,
            None => Err(Error::MalformedPacket("empty reply".to_string())),
        }
    }

    async fn read_result_set(&mut self, first: &[u8]) -> Result<Response> {
        let mut input = first;
        let count = read_lenenc_int(&mut input)? as usize;

        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            columns.push(parse_column_name(&self.channel.read_packet().await?)?);
        }
        if !is_eof_packet(&self.channel.read_packet().await?) {
            return Err(Error::MalformedPacket(
                "missing EOF after column definitions".to_string(),
            ));
        }

        let mut rows = Vec::new();
        loop {
            let packet = self.channel.read_packet().await?;
            if is_eof_packet(&packet) {
                break;
            }
            if packet.first() == Some(&ERR_HEADER) {
                return Err(parse_err(&packet));
            }
            rows.push(parse_row(&packet, count)?);
        }

        Ok(Response::ResultSet { columns, rows })
    }

    /// Say goodbye and close the stream
    pub async fn quit(mut self) -> Result<()> {
        self.send(&Command::Quit).await?;
        self.channel.shutdown().await
    }

    async fn send(&mut self, command: &Command) -> Result<()> {
        self.channel.reset_sequence();
        self.channel.write_packet(&command.encode()).await?;
        self.channel.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionEngine;
    use crate::protocol::Credentials;
    use crate::server::Connection;
    use crate::storage::TableStore;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::duplex;

    fn spawn_session(dir: &TempDir) -> tokio::io::DuplexStream {
        let store = Arc::new(TableStore::open(dir.path()).unwrap());
        let credentials = Arc::new(Credentials::default().with_user("root", "secret"));
        let (a, b) = duplex(64 * 1024);
        tokio::spawn(Connection::new(7, "test", a, ExecutionEngine::new(store), credentials).run());
        b
    }

    #[tokio::test]
    async fn test_client_session() {
        let dir = TempDir::new().unwrap();
        let mut client = Client::handshake(spawn_session(&dir), "root", "secret")
            .await
            .unwrap();
        assert_eq!(client.connection_id(), 7);
        assert!(client.server_version().contains("minisql"));

        assert_eq!(
            client.query("CREATE TABLE kv (k TEXT, v BIGINT)").await.unwrap(),
            Response::Ok
        );
        client.query("INSERT INTO kv VALUES ('a', 1)").await.unwrap();
        client.query("INSERT INTO kv VALUES ('b', NULL)").await.unwrap();

        assert_eq!(
            client.query("SELECT * FROM kv").await.unwrap(),
            Response::ResultSet {
                columns: vec!["k".to_string(), "v".to_string()],
                rows: vec![
                    vec![Some("a".to_string()), Some("1".to_string())],
                    vec![Some("b".to_string()), None],
                ],
            }
        );

        match client.query("SELECT * FROM nope").await {
            Err(Error::ServerError { code, .. }) => assert_eq!(code, 1064),
            other => panic!("unexpected {:?}", other),
        }

        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_client_rejected_login() {
        let dir = TempDir::new().unwrap();
        match Client::handshake(spawn_session(&dir), "root", "wrong").await {
            Err(Error::ServerError { code, message, .. }) => {
                assert_eq!(code, 1045);
                assert!(message.contains("root"));
            }
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("login should fail"),
        }
    }
}
