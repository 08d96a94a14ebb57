//! Connection handler
//!
//! Drives one accepted connection: login handshake, then every inbound line
//! is handed to the registry for broadcast. Outbound traffic never goes
//! through this task directly; a writer task drains the connection's
//! outbox so that each message lands on the wire as one flushed block.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::connection::{LineReader, LineWriter};
use crate::error::ChatError;
use crate::message::{LoginRequest, Reply};
use crate::registry::RegistryHandle;
use crate::segment::{self, MAX_LINE_LEN};
use crate::types::ClientId;

/// Outbox buffer size per connection
pub const OUTBOX_CAPACITY: usize = 32;

/// Writes whole messages: segmented lines, then the blank terminator.
#[derive(Debug)]
pub struct MessageWriter<W> {
    lines: LineWriter<W>,
    /// Scratch space for the current message only
    pending: Vec<String>,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            lines: LineWriter::new(inner),
            pending: Vec::new(),
        }
    }

    /// Write `message` as one flushed block
    pub async fn send(&mut self, message: &str) -> std::io::Result<()> {
        segment::segment_into(message, MAX_LINE_LEN, &mut self.pending);
        if self.pending.len() > 1 {
            debug!("Message cut up into {} pieces", self.pending.len());
        }

        let result = self.write_pending().await;
        self.pending.clear();
        result
    }

    async fn write_pending(&mut self) -> std::io::Result<()> {
        for line in &self.pending {
            self.lines.write_line(line).await?;
        }
        self.lines.write_line("").await?;
        self.lines.flush().await
    }

    pub async fn close(&mut self) -> std::io::Result<()> {
        self.lines.close().await
    }
}

/// Handle one registered connection until it terminates
///
/// The connection must already be registered under `client_id`, with
/// `outbox` being the receiving end of the sender given to the registry.
/// Peer disconnects and rejected logins are logged here and return `Ok`.
pub async fn handle_connection<S>(
    stream: S,
    client_id: ClientId,
    outbox: mpsc::Receiver<Arc<str>>,
    registry: RegistryHandle,
) -> Result<(), ChatError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = LineReader::new(read_half);

    // Spawn write task (outbox -> socket)
    let mut write_task = tokio::spawn(write_outbox(
        client_id,
        MessageWriter::new(write_half),
        outbox,
    ));

    // Wait for either side to finish
    let outcome = tokio::select! {
        result = session(client_id, &mut reader, &registry) => Some(result),
        _ = &mut write_task => None,
    };

    // Terminated: leave the registry, then let the writer drain and close
    if let Err(e) = registry.remove_client(client_id).await {
        warn!("Could not deregister client {}: {}", client_id, e);
    }
    if outcome.is_some() {
        let _ = write_task.await;
    }

    match outcome {
        None => {
            debug!("Outbox of client {} closed", client_id);
            Ok(())
        }
        Some(Ok(())) => {
            info!("Client {} closed the connection", client_id);
            Ok(())
        }
        Some(Err(ChatError::LoginRejected)) => Ok(()),
        Some(Err(e)) if e.is_disconnect() => {
            info!("Client {} disconnected unexpectedly", client_id);
            Ok(())
        }
        Some(Err(e)) => Err(e),
    }
}

/// Login handshake followed by the receive-and-broadcast loop
async fn session<R>(
    client_id: ClientId,
    reader: &mut LineReader<R>,
    registry: &RegistryHandle,
) -> Result<(), ChatError>
where
    R: AsyncRead + Unpin,
{
    // Awaiting login
    let Some(line) = reader.read_line().await? else {
        return Err(ChatError::PeerDisconnected);
    };

    let nickname = match line.parse::<LoginRequest>() {
        Ok(request) if registry.password_valid(&request.password) => request.username,
        _ => {
            warn!("Client {} failed to log in", client_id);
            registry.reject(client_id).await?;
            return Err(ChatError::LoginRejected);
        }
    };

    registry.join(client_id, nickname).await?;

    // Active
    while let Some(line) = reader.read_line().await? {
        debug!("Received from {}: {}", client_id, line);
        registry.broadcast(client_id, line).await?;
    }

    Ok(())
}

/// Drain the outbox onto the socket until the registry drops it
async fn write_outbox<W>(
    client_id: ClientId,
    mut writer: MessageWriter<W>,
    mut outbox: mpsc::Receiver<Arc<str>>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbox.recv().await {
        if let Err(e) = writer.send(&message).await {
            debug!("Write to client {} failed: {}", client_id, e);
            break;
        }
    }

    if let Err(e) = writer.close().await {
        debug!("Closing client {} failed: {}", client_id, e);
    }
    debug!("Write task ended for {}", client_id);
}

/// Answer a connection that will not get a handler, then close it
pub async fn refuse_connection<S>(stream: S, reply: Reply)
where
    S: AsyncWrite + Unpin,
{
    let mut writer = MessageWriter::new(stream);
    if let Err(e) = writer.send(reply.as_str()).await {
        error!("Failed to send {}: {}", reply, e);
    }
    let _ = writer.close().await;
}
