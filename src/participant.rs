//! Participant struct definition
//!
//! The registry's record of one accepted connection.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::ClientId;

/// Registered connection information
///
/// Holds the connection's ID, its nickname once login succeeded, and the
/// sending end of its outbox.
#[derive(Debug)]
pub struct Participant {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Nickname (None until login succeeds)
    pub nickname: Option<String>,
    /// Registry → writer task outbox
    pub outbox: mpsc::Sender<Arc<str>>,
}

impl Participant {
    /// Create a participant that has not logged in yet
    pub fn new(id: ClientId, outbox: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id,
            nickname: None,
            outbox,
        }
    }

    /// Queue a message without waiting
    ///
    /// Fails with `OutboxFull` rather than waiting for a slow reader.
    pub fn notify(&self, message: Arc<str>) -> Result<(), SendError> {
        self.outbox.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::OutboxFull,
            mpsc::error::TrySendError::Closed(_) => SendError::OutboxClosed,
        })
    }

    /// Nickname for log lines
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or("<pending>")
    }

    /// Logged in and part of the broadcast set
    pub fn has_joined(&self) -> bool {
        self.nickname.is_some()
    }

    /// Bind the nickname chosen at login
    pub fn join(&mut self, nickname: String) {
        self.nickname = Some(nickname);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_participant_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let participant = Participant::new(ClientId::new(), tx);

        assert!(participant.nickname.is_none());
        assert!(!participant.has_joined());
        assert_eq!(participant.display_name(), "<pending>");
    }

    #[tokio::test]
    async fn test_participant_join() {
        let (tx, _rx) = mpsc::channel(32);
        let mut participant = Participant::new(ClientId::new(), tx);

        participant.join("Alice".to_string());

        assert!(participant.has_joined());
        assert_eq!(participant.display_name(), "Alice");
    }

    #[tokio::test]
    async fn test_notify_after_writer_gone() {
        let (tx, rx) = mpsc::channel(32);
        let participant = Participant::new(ClientId::new(), tx);
        drop(rx);

        assert!(matches!(
            participant.notify(Arc::from("hi")),
            Err(SendError::OutboxClosed)
        ));
    }

    #[tokio::test]
    async fn test_notify_full_outbox() {
        let (tx, mut rx) = mpsc::channel(1);
        let participant = Participant::new(ClientId::new(), tx);

        participant.notify(Arc::from("one")).unwrap();
        assert!(matches!(
            participant.notify(Arc::from("two")),
            Err(SendError::OutboxFull)
        ));
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
    }
}
