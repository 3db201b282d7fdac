//! Per-connection session
//!
//! A session authenticates the client, then serves one command per packet
//! until the client quits, disconnects, or breaks the framing.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{Error, Result};
use crate::executor::{ExecutionEngine, QueryResult};
use crate::protocol::response::{write_error, write_ok, write_result_set};
use crate::protocol::{Command, Credentials, Handshake, PacketChannel};

/// One client session
pub struct Connection<S> {
    id: u32,
    peer: String,
    channel: PacketChannel<S>,
    engine: ExecutionEngine,
    credentials: Arc<Credentials>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an accepted stream
    pub fn new(
        id: u32,
        peer: impl Into<String>,
        stream: S,
        engine: ExecutionEngine,
        credentials: Arc<Credentials>,
    ) -> Self {
        Self {
            id,
            peer: peer.into(),
            channel: PacketChannel::new(stream),
            engine,
            credentials,
        }
    }

    /// Limit the size of packets read from the client
    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.channel.set_max_packet_size(max_packet_size);
        self
    }

    /// Serve the session to completion and close the stream
    pub async fn run(mut self) {
        let span = info_span!("connection", id = self.id, peer = %self.peer);
        async move {
            info!("client connected");
            match self.serve().await {
                Ok(()) => info!("client disconnected"),
                Err(e) if e.is_disconnect() => info!("client disconnected"),
                // Already logged by the handshake.
                Err(Error::AccessDenied(_)) => {}
                Err(e) => warn!(error = %e, "closing connection"),
            }
            if let Err(e) = self.channel.shutdown().await {
                debug!(error = %e, "shutdown failed");
            }
        }
        .instrument(span)
        .await
    }

    async fn serve(&mut self) -> Result<()> {
        let user = Handshake::new(self.id)
            .run(&mut self.channel, &self.credentials)
            .await?;
        info!(user = %user, "authenticated");

        loop {
            self.channel.reset_sequence();
            let payload = match self.channel.read_packet().await {
                Ok(payload) => payload,
                Err(e) if e.is_disconnect() => return Ok(()),
                Err(e) => return Err(e),
            };

            match Command::parse(&payload) {
                Ok(Command::Quit) => {
                    debug!("quit");
                    return Ok(());
                }
                Ok(Command::Query(sql)) => self.handle_query(sql).await?,
                Err(e) => {
                    warn!(error = %e, "rejected command");
                    write_error(&mut self.channel, e.error_code(), &e.to_string()).await?;
                }
            }
        }
    }

    async fn handle_query(&mut self, sql: String) -> Result<()> {
        debug!(sql = %sql, "query");

        // The store does synchronous file I/O.
        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || engine.execute_sql(&sql))
            .await
            .unwrap_or_else(|e| Err(Error::Internal(format!("query task failed: {}", e))));

        match result {
            Ok(QueryResult::Done) => write_ok(&mut self.channel).await,
            Ok(QueryResult::Rows {
                table,
                columns,
                rows,
            }) => write_result_set(&mut self.channel, &table, &columns, &rows).await,
            Err(e) if e.is_statement_error() => {
                debug!(error = %e, "statement failed");
                write_error(&mut self.channel, e.error_code(), &e.to_string()).await
            }
            Err(e) => {
                warn!(error = %e, "statement failed");
                write_error(&mut self.channel, e.error_code(), &e.to_string()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::handshake::{Greeting, HandshakeResponse};
    use crate::protocol::response::{is_eof_packet, parse_column_name, parse_err, parse_ok, parse_row};
    use crate::storage::TableStore;
    use tempfile::TempDir;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    struct Session {
        dir: TempDir,
        client: PacketChannel<DuplexStream>,
        server: JoinHandle<()>,
    }

    async fn connect() -> Session {
        connect_with_limit(crate::protocol::packet::DEFAULT_MAX_PACKET_SIZE).await
    }

    async fn connect_with_limit(max_packet_size: usize) -> Session {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TableStore::open(dir.path()).unwrap());
        let credentials = Arc::new(Credentials::default().with_user("root", "pw"));
        let (a, b) = duplex(64 * 1024);

        let conn = Connection::new(1, "test", a, ExecutionEngine::new(store), credentials)
            .with_max_packet_size(max_packet_size);
        let server = tokio::spawn(conn.run());

        let mut client = PacketChannel::new(b);
        let greeting = Greeting::decode(&client.read_packet().await.unwrap()).unwrap();
        let login = HandshakeResponse::new(&greeting, "root", "pw");
        client.write_packet(&login.encode()).await.unwrap();
        client.flush().await.unwrap();
        parse_ok(&client.read_packet().await.unwrap()).unwrap();

        Session {
            dir,
            client,
            server,
        }
    }

    async fn send(client: &mut PacketChannel<DuplexStream>, payload: &[u8]) -> Vec<u8> {
        client.reset_sequence();
        client.write_packet(payload).await.unwrap();
        client.flush().await.unwrap();
        client.read_packet().await.unwrap()
    }

    async fn query(client: &mut PacketChannel<DuplexStream>, sql: &str) -> Vec<u8> {
        send(client, &Command::Query(sql.to_string()).encode()).await
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let mut s = connect().await;

        let reply = query(&mut s.client, "CREATE TABLE users (id INT, name TEXT)").await;
        assert!(parse_ok(&reply).is_ok());
        let reply = query(&mut s.client, "INSERT INTO users VALUES (1, 'Alice')").await;
        assert!(parse_ok(&reply).is_ok());
        let reply = query(&mut s.client, "INSERT INTO users VALUES (2, NULL)").await;
        assert!(parse_ok(&reply).is_ok());

        let count = query(&mut s.client, "SELECT * FROM users").await;
        assert_eq!(count, vec![2]);
        let id = s.client.read_packet().await.unwrap();
        let name = s.client.read_packet().await.unwrap();
        assert_eq!(parse_column_name(&id).unwrap(), "id");
        assert_eq!(parse_column_name(&name).unwrap(), "name");
        assert!(is_eof_packet(&s.client.read_packet().await.unwrap()));

        let row1 = s.client.read_packet().await.unwrap();
        let row2 = s.client.read_packet().await.unwrap();
        assert_eq!(
            parse_row(&row1, 2).unwrap(),
            vec![Some("1".to_string()), Some("Alice".to_string())]
        );
        assert_eq!(parse_row(&row2, 2).unwrap(), vec![Some("2".to_string()), None]);
        assert!(is_eof_packet(&s.client.read_packet().await.unwrap()));
        // count, 2 defs, EOF, 2 rows, EOF follow the request.
        assert_eq!(s.client.sequence(), 8);

        send_quit(s).await;
    }

    async fn send_quit(mut s: Session) {
        s.client.reset_sequence();
        s.client.write_packet(&Command::Quit.encode()).await.unwrap();
        s.client.flush().await.unwrap();
        s.server.await.unwrap();
        // The server closed its side without replying.
        assert!(s.client.read_packet().await.unwrap_err().is_disconnect());
    }

    #[tokio::test]
    async fn test_statement_errors_keep_connection_open() {
        let mut s = connect().await;

        let reply = query(&mut s.client, "SELECT * FROM missing").await;
        match parse_err(&reply) {
            Error::ServerError { code, message, .. } => {
                assert_eq!(code, 1064);
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let reply = query(&mut s.client, "CREATE TABLE t (a INT)").await;
        assert!(parse_ok(&reply).is_ok());
        send_quit(s).await;
    }

    #[tokio::test]
    async fn test_unsupported_and_malformed_commands() {
        let mut s = connect().await;

        // COM_PING
        let reply = send(&mut s.client, &[0x0e]).await;
        match parse_err(&reply) {
            Error::ServerError { code, message, .. } => {
                assert_eq!(code, 1064);
                assert_eq!(message, "unsupported command");
            }
            other => panic!("unexpected {:?}", other),
        }

        let reply = send(&mut s.client, &[]).await;
        assert_eq!(parse_err(&reply).error_code(), 1064);

        let reply = send(&mut s.client, &[0x03, 0xc3, 0x28]).await;
        assert_eq!(parse_err(&reply).error_code(), 1064);

        let reply = query(&mut s.client, "CREATE TABLE t (a INT)").await;
        assert!(parse_ok(&reply).is_ok());
        send_quit(s).await;
    }

    #[tokio::test]
    async fn test_out_of_order_packet_closes_connection() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TableStore::open(dir.path()).unwrap());
        let credentials = Arc::new(Credentials::default().with_user("root", ""));
        let (a, b) = duplex(4096);
        let server = tokio::spawn(
            Connection::new(2, "test", a, ExecutionEngine::new(store), credentials).run(),
        );

        let mut client = PacketChannel::new(b);
        let greeting = Greeting::decode(&client.read_packet().await.unwrap()).unwrap();

        // The login should carry sequence 1.
        client.reset_sequence();
        let login = HandshakeResponse::new(&greeting, "root", "");
        client.write_packet(&login.encode()).await.unwrap();
        client.flush().await.unwrap();

        server.await.unwrap();
        assert!(client.read_packet().await.unwrap_err().is_disconnect());
    }

    #[tokio::test]
    async fn test_client_disconnect_ends_session() {
        let s = connect().await;
        drop(s.client);
        s.server.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_is_reported() {
        let mut s = connect().await;
        let reply = query(&mut s.client, "CREATE TABLE users (id INT)").await;
        assert!(parse_ok(&reply).is_ok());

        // A directory squatting on the temp path makes the snapshot write fail.
        std::fs::create_dir(s.dir.path().join("users.json.tmp")).unwrap();
        let reply = query(&mut s.client, "INSERT INTO users VALUES (1)").await;
        match parse_err(&reply) {
            Error::ServerError { code, message, .. } => {
                assert_eq!(code, 1064);
                assert!(message.contains("failed to persist table 'users'"));
            }
            other => panic!("unexpected {:?}", other),
        }

        // The session survives and the row stays in memory.
        let count = query(&mut s.client, "SELECT * FROM users").await;
        assert_eq!(count, vec![1]);
        s.client.read_packet().await.unwrap();
        assert!(is_eof_packet(&s.client.read_packet().await.unwrap()));
        let row = s.client.read_packet().await.unwrap();
        assert_eq!(parse_row(&row, 1).unwrap(), vec![Some("1".to_string())]);
        assert!(is_eof_packet(&s.client.read_packet().await.unwrap()));

        send_quit(s).await;
    }

    #[tokio::test]
    async fn test_oversized_command_closes_connection() {
        let mut s = connect_with_limit(1024).await;

        let sql = format!("SELECT * FROM {}", "t".repeat(2000));
        s.client.reset_sequence();
        s.client
            .write_packet(&Command::Query(sql).encode())
            .await
            .unwrap();
        s.client.flush().await.unwrap();

        s.server.await.unwrap();
        assert!(s.client.read_packet().await.unwrap_err().is_disconnect());
    }
}
