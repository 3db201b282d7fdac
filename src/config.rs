//! Server configuration
//!
//! Settings are read from a TOML file. Every section is optional and falls
//! back to its defaults; the `[users]` table lists login names and their
//! passwords in file order.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3306
//! data_path = "data"
//! max_packet_size = 16777216
//!
//! [logging]
//! level = "info"
//!
//! [users]
//! root = "secret"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::packet::DEFAULT_MAX_PACKET_SIZE;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "settings/minisql.toml";

/// Default server port
pub const DEFAULT_PORT: u16 = 3306;

/// Log levels accepted in `[logging] level`
const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Username to password
    pub users: IndexMap<String, String>,
}

/// Listener and storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding table snapshots
    pub data_path: PathBuf,
    /// Largest client packet accepted, in bytes
    pub max_packet_size: usize,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            data_path: PathBuf::from("data"),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut users = IndexMap::new();
        users.insert("root".to_string(), String::new());
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            users,
        }
    }
}

impl Config {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server port cannot be 0".to_string()));
        }

        if self.server.data_path.as_os_str().is_empty() {
            return Err(Error::Config("data_path cannot be empty".to_string()));
        }

        if self.server.max_packet_size == 0 {
            return Err(Error::Config("max_packet_size cannot be 0".to_string()));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "invalid log level '{}', must be one of: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.users.is_empty() {
            return Err(Error::Config("at least one user must be configured".to_string()));
        }

        Ok(())
    }

    /// Set the host address
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Set the snapshot directory
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.server.data_path = path.into();
        self
    }

    /// Set the largest client packet accepted
    pub fn max_packet_size(mut self, bytes: usize) -> Self {
        self.server.max_packet_size = bytes;
        self
    }

    /// Add or replace a user
    pub fn user(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(name.into(), password.into());
        self
    }

    /// Get the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
