//! Outbound chat client
//!
//! The peer-facing side used by a front-end. `run` owns the connection and
//! the receive loop and is meant to be spawned on its own task; `login`,
//! `send_message` and `stop` may be called concurrently from anywhere.
//!
//! ```ignore
//! let client = Arc::new(Client::new(ClientConfig::default(), on_message, on_error));
//! tokio::spawn({
//!     let client = Arc::clone(&client);
//!     async move { client.run().await }
//! });
//! client.login("Alice", "secret").await?;
//! client.send_chat("Alice", "hello").await?;
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{LineReader, LineWriter};
use crate::error::ChatError;
use crate::message::{self, LoginRequest, Reply};
use crate::segment::Reassembler;
use crate::types::ClientState;

/// Called once per fully reassembled inbound message
pub type MessageListener = Arc<dyn Fn(String) + Send + Sync>;

/// Called at most once, when the connection fails
pub type ErrorListener = Arc<dyn Fn(&ChatError) + Send + Sync>;

/// Outbound connection to a chat relay
pub struct Client {
    config: ClientConfig,
    /// Lifecycle; `Stopped` is the only trigger for teardown
    state: watch::Sender<ClientState>,
    writer: Mutex<Option<LineWriter<OwnedWriteHalf>>>,
    on_message: RwLock<MessageListener>,
    on_error: ErrorListener,
}

impl Client {
    pub fn new(config: ClientConfig, on_message: MessageListener, on_error: ErrorListener) -> Self {
        let (state, _) = watch::channel(ClientState::NotStarted);
        Self {
            config,
            state,
            writer: Mutex::new(None),
            on_message: RwLock::new(on_message),
            on_error,
        }
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Redirect future messages to a new listener
    pub fn set_message_listener(&self, listener: MessageListener) {
        *self
            .on_message
            .write()
            .unwrap_or_else(PoisonError::into_inner) = listener;
    }

    /// Connect and deliver messages until stopped or the connection fails
    ///
    /// Only the first call does anything.
    pub async fn run(&self) {
        if !self.advance(ClientState::NotStarted, ClientState::Connecting) {
            warn!("Client already started");
            return;
        }

        match self.receive().await {
            Ok(()) => self.terminate(None).await,
            Err(e) => self.terminate(Some(&e)).await,
        }
        info!("Client terminated");
    }

    async fn receive(&self) -> Result<(), ChatError> {
        let stream = TcpStream::connect(&self.config.server_addr).await?;
        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(LineWriter::new(write_half));
        debug!("Connected to {}", self.config.server_addr);

        if !self.advance(ClientState::Connecting, ClientState::AwaitingLoginResult) {
            // Stopped while connecting; terminate may have missed the writer
            if let Some(mut writer) = self.writer.lock().await.take() {
                let _ = writer.close().await;
            }
            return Ok(());
        }

        let mut reader = LineReader::new(read_half);
        let mut reassembler = Reassembler::default();
        let mut state = self.state.subscribe();

        loop {
            let line = tokio::select! {
                line = reader.read_line() => line?,
                _ = state.wait_for(|s| *s == ClientState::Stopped) => return Ok(()),
            };

            match line {
                Some(line) => {
                    if let Some(message) = reassembler.push(line) {
                        self.dispatch(message)?;
                    }
                }
                None => {
                    if let Some(message) = reassembler.finish() {
                        self.dispatch(message)?;
                    }
                    return Err(ChatError::PeerDisconnected);
                }
            }
        }
    }

    /// Track the handshake, then hand the message to the listener
    fn dispatch(&self, message: String) -> Result<(), ChatError> {
        let reply = if self.state() == ClientState::AwaitingLoginResult {
            Reply::parse(&message)
        } else {
            None
        };

        if reply == Some(Reply::LoginSuccess) {
            self.advance(ClientState::AwaitingLoginResult, ClientState::Active);
        }

        let listener = Arc::clone(
            &self
                .on_message
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );
        listener(message);

        match reply {
            Some(Reply::LoginFailed) => Err(ChatError::LoginRejected),
            Some(Reply::ServerFull) => Err(ChatError::ServerFull),
            _ => Ok(()),
        }
    }

    /// Send the login line once the connection is open
    ///
    /// Waits for `run` to connect. Fails with `NotConnected` if the
    /// client stopped first or has already passed the handshake.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ChatError> {
        let request = LoginRequest::new(username, password)?;

        let mut state = self.state.subscribe();
        let current = *state
            .wait_for(|s| !matches!(s, ClientState::NotStarted | ClientState::Connecting))
            .await
            .map_err(|_| ChatError::NotConnected)?;
        if current != ClientState::AwaitingLoginResult {
            return Err(ChatError::NotConnected);
        }

        self.send_message(&request.to_string()).await
    }

    /// Send `"<nickname>: <text>"`; blank text is ignored
    pub async fn send_chat(&self, nickname: &str, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.send_message(&message::chat_line(nickname, text)).await
    }

    /// Write one line and flush it
    ///
    /// A write failure stops the client like a read failure would.
    pub async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        if text.contains(['\n', '\r']) {
            return Err(ChatError::InvalidMessage(
                "message must be a single line".to_string(),
            ));
        }

        let result = {
            let mut writer = self.writer.lock().await;
            match writer.as_mut() {
                Some(writer) => writer.send_line(text).await,
                None => return Err(ChatError::NotConnected),
            }
        };

        if let Err(e) = result {
            let err = ChatError::from(e);
            warn!("Error while sending message: {}", err);
            self.terminate(Some(&err)).await;
            return Err(err);
        }
        Ok(())
    }

    /// Stop the client and close the connection
    pub async fn stop(&self) {
        self.terminate(None).await;
    }

    /// Move to `Stopped` first, report `error` if this is the first stop,
    /// then close the connection. Later calls do nothing.
    async fn terminate(&self, error: Option<&ChatError>) {
        if self.state.send_replace(ClientState::Stopped) == ClientState::Stopped {
            return;
        }

        if let Some(e) = error {
            debug!("Client stopping on error: {}", e);
            (self.on_error)(e);
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!("Error while closing connection: {}", e);
            }
        }
    }

    /// Compare-and-set on the state; never leaves `Stopped`
    fn advance(&self, from: ClientState, to: ClientState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}
