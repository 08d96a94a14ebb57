//! Relay configuration
//!
//! Server and client settings with defaults for the fixed well-known port.
//! The server config can be read from a JSON file.

use std::path::Path;

use serde::Deserialize;

use crate::error::ChatError;

/// Well-known TCP port for both listening and connecting
pub const DEFAULT_PORT: u16 = 1234;

/// Server configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listening socket binds to
    pub listen_addr: String,
    /// Shared login password
    pub password: String,
    /// Refuse new connections beyond this many (None = unlimited)
    pub max_clients: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            password: String::new(),
            max_clients: None,
        }
    }
}

impl ServerConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ChatError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let json = std::fs::read_to_string(path).map_err(ChatError::Io)?;
        Self::from_json(&json)
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

/// Outbound client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay address to connect to
    pub server_addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
        }
    }
}

impl ClientConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
        }
    }
}
