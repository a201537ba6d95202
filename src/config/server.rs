//! Server configuration
//!
//! Loads bridge settings from an optional TOML file. Command-line flags are
//! applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default listen port
pub const DEFAULT_PORT: u16 = 4040;
/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Default WebSocket endpoint path
pub const DEFAULT_PATH: &str = "/session";
/// Default maximum size of one inbound WebSocket message (16MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for the WebSocket server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Request path clients must upgrade on
    pub path: String,
    /// Largest inbound message accepted, `None` for no limit
    pub max_message_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration with default path and limits
    pub fn new(bind: impl Into<String>, port: u16) -> Self {
        Self {
            bind: bind.into(),
            port,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    ///
    /// Keys missing from the file keep their defaults. `path` gets the same
    /// normalization as [`ServerConfig::with_path`], and `max_message_size = 0`
    /// disables the limit.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        let endpoint = config.path.clone();
        let max = config.max_message_size;
        Ok(config.with_path(endpoint).with_max_message_size(max))
    }

    /// Set the endpoint path, adding a leading slash if missing
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Set the maximum inbound message size. `Some(0)` means no limit.
    pub fn with_max_message_size(mut self, max: Option<usize>) -> Self {
        self.max_message_size = max.filter(|&size| size > 0);
        self
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_server_config() {
        let config = ServerConfig::new("127.0.0.1", 9000);
        assert_eq!(config.socket_addr(), "127.0.0.1:9000");
        assert_eq!(config.path, DEFAULT_PATH);
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr(), "127.0.0.1:4040");
        assert_eq!(config.max_message_size, Some(DEFAULT_MAX_MESSAGE_SIZE));
    }

    #[test]
    fn test_with_path_adds_slash() {
        let config = ServerConfig::default().with_path("stream");
        assert_eq!(config.path, "/stream");

        let config = ServerConfig::default().with_path("/ws");
        assert_eq!(config.path, "/ws");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = 9100").unwrap();
        writeln!(file, "path = \"/media\"").unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.path, "/media");
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.max_message_size, Some(DEFAULT_MAX_MESSAGE_SIZE));
    }

    #[test]
    fn test_load_normalizes_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "path = \"media\"").unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.path, "/media");
    }

    #[test]
    fn test_load_zero_max_message_size_disables_limit() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_message_size = 0").unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.max_message_size, None);
    }

    #[test]
    fn test_with_max_message_size() {
        let config = ServerConfig::default().with_max_message_size(Some(1024));
        assert_eq!(config.max_message_size, Some(1024));

        let config = ServerConfig::default().with_max_message_size(Some(0));
        assert_eq!(config.max_message_size, None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServerConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let result = ServerConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
