//! Basic type definitions for the chat relay
//!
//! - `ClientId`: UUID-based unique connection identifier
//! - `Admission`: registry answer to a newly accepted socket
//! - `ClientState`: lifecycle of the outbound client

use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe identification of one accepted socket.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of registering a freshly accepted socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Handler may start
    Admitted,
    /// `max_clients` reached
    ServerFull,
    /// Registry has already shut down
    ShuttingDown,
}

/// Lifecycle of an outbound [`Client`](crate::client::Client)
///
/// Moves strictly forward; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// `run` has not been called yet
    NotStarted,
    /// Opening the TCP connection
    Connecting,
    /// Connected, waiting for `LOGIN_SUCCESS` / `LOGIN_FAILED`
    AwaitingLoginResult,
    /// Logged in and receiving chat lines
    Active,
    Stopped,
}
