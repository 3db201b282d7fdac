//! TCP Server for MiniSQL
//!
//! This module accepts MySQL-protocol clients and runs one task per
//! connection against a shared table store.

pub mod connection;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::executor::ExecutionEngine;
use crate::protocol::Credentials;
use crate::storage::TableStore;

pub use connection::Connection;

/// MiniSQL TCP Server
pub struct Server {
    config: Config,
    engine: ExecutionEngine,
    credentials: Arc<Credentials>,
    next_connection_id: AtomicU32,
}

impl Server {
    /// Load the data directory and credentials named by `config`
    ///
    /// Fails if any snapshot in the data directory cannot be loaded.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let store = TableStore::open(&config.server.data_path)?;
        info!(
            data_path = %config.server.data_path.display(),
            tables = store.list_tables().len(),
            "opened data directory"
        );
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Create a server over an existing store
    pub fn new(config: Config, store: Arc<TableStore>) -> Self {
        let credentials = Credentials::new(config.users.clone());
        Self {
            config,
            engine: ExecutionEngine::new(store),
            credentials: Arc::new(credentials),
            next_connection_id: AtomicU32::new(1),
        }
    }

    /// The configuration the server was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared table store
    pub fn store(&self) -> &Arc<TableStore> {
        self.engine.store()
    }

    /// Bind the configured address and serve forever
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, users = self.credentials.len(), "listening");

        loop {
            let (socket, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };
            if let Err(e) = socket.set_nodelay(true) {
                error!(error = %e, %peer, "failed to set TCP_NODELAY");
            }

            let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
            let conn = Connection::new(
                id,
                peer.to_string(),
                socket,
                self.engine.clone(),
                Arc::clone(&self.credentials),
            )
            .with_max_packet_size(self.config.server.max_packet_size);
            tokio::spawn(conn.run());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_open_loads_store() {
        let dir = TempDir::new().unwrap();
        {
            let store = TableStore::open(dir.path()).unwrap();
            store
                .create_table("t", vec![crate::storage::Column::new("a", "INT")])
                .unwrap();
        }

        let server = Server::open(Config::new().data_path(dir.path())).unwrap();
        assert_eq!(server.store().list_tables(), vec!["t".to_string()]);
        assert_eq!(server.config().server.port, 3306);
    }

    #[test]
    fn test_open_rejects_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("t.json"), "{ not json").unwrap();

        let err = Server::open(Config::new().data_path(dir.path())).err().unwrap();
        assert!(matches!(err, Error::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        assert!(Server::open(Config::new().data_path(dir.path()).port(0)).is_err());
    }
}
