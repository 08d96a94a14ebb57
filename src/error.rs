//! Error types for the chat relay
//!
//! Defines connection-level errors and outbox send errors.
//! Uses thiserror for ergonomic error definitions.

use std::io;

use thiserror::Error;

/// Relay-level errors
///
/// Login and peer errors end a single connection; `Bind` is the only
/// error that is fatal to the server as a whole.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad login grammar or wrong password
    #[error("Login rejected")]
    LoginRejected,

    /// Peer closed or reset the connection
    #[error("Peer disconnected")]
    PeerDisconnected,

    /// Any other read/write fault
    #[error("IO error: {0}")]
    Io(io::Error),

    /// Listening socket could not be created (fatal)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Registry actor is gone
    #[error("Channel send error")]
    ChannelSend,

    /// Server refused the connection because it is full
    #[error("Server is full")]
    ServerFull,

    /// Username breaks the login rules
    #[error("Invalid username")]
    InvalidUsername,

    /// Password is empty or cannot be carried by the login line
    #[error("Invalid password")]
    InvalidPassword,

    /// Outgoing text cannot be sent as a single line
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// No open connection to send on
    #[error("Not connected")]
    NotConnected,

    /// Config file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ChatError {
    /// True for errors that only mean the other side went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ChatError::PeerDisconnected)
    }
}

/// Resets and EOFs are a normal way for a chat peer to leave.
impl From<io::Error> for ChatError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => ChatError::PeerDisconnected,
            _ => ChatError::Io(err),
        }
    }
}

/// Outbox send errors
///
/// Occurs when a connection's writer task is gone or has fallen behind.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the outbox has been closed
    #[error("Outbox closed")]
    OutboxClosed,

    /// The outbox is full and the message was dropped
    #[error("Outbox full")]
    OutboxFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_peer_disconnect() {
        let err: ChatError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(err.is_disconnect());

        let err: ChatError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_other_io_is_io_failure() {
        let err: ChatError = io::Error::from(io::ErrorKind::InvalidData).into();
        assert!(matches!(err, ChatError::Io(_)));
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_bind_error_display() {
        let err = ChatError::Bind {
            addr: "0.0.0.0:1234".to_string(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("Failed to bind 0.0.0.0:1234"));
    }
}
