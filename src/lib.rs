//! Single-room TCP Chat Relay Library
//!
//! A password-gated, line-oriented chat relay built on tokio. Every line a
//! logged-in participant sends is rebroadcast to all logged-in
//! participants, the sender included.
//!
//! # Protocol
//! - First client line: `LOGIN:<username>:<password>`
//! - First server block: `LOGIN_SUCCESS`, `LOGIN_FAILED` or `SERVER_FULL`
//! - Afterwards: chat lines `<nickname>: <text>`, plus the notices
//!   `<nickname> disconnected` and `Server is shutting down`
//! - Every server message is one or more lines of at most 90 characters
//!   followed by a blank line
//!
//! # Architecture
//! - `Registry` is an actor owning the participant set; commands are
//!   processed one at a time, so broadcasts never interleave
//! - Each connection has a reading `handler` task and a writer task that
//!   drains the connection's outbox
//! - `Client` is the outbound counterpart for front-ends
//!
//! # Example
//! ```ignore
//! use chat_relay::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::ChatError> {
//!     let config = ServerConfig {
//!         password: "secret".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let server = Server::bind(config).await?;
//!     server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod participant;
pub mod registry;
pub mod segment;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, ErrorListener, MessageListener};
pub use config::{ClientConfig, ServerConfig, DEFAULT_PORT};
pub use connection::{LineReader, LineWriter};
pub use error::{ChatError, SendError};
pub use handler::handle_connection;
pub use message::{LoginRequest, Reply};
pub use participant::Participant;
pub use registry::{Registry, RegistryCommand, RegistryHandle};
pub use segment::{segment, Reassembler, MAX_LINE_LEN};
pub use server::Server;
pub use types::{Admission, ClientId, ClientState};
