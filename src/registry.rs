//! Registry actor implementation
//!
//! The single owner of the participant set. Handlers talk to it through a
//! cloneable [`RegistryHandle`]; commands are processed one at a time, so a
//! broadcast always sees a whole, stable participant set and every
//! recipient gets the message as one block.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::message::{self, Reply};
use crate::participant::Participant;
use crate::types::{Admission, ClientId};

/// Channel buffer size for registry commands
const COMMAND_BUFFER_SIZE: usize = 256;

/// Commands sent from the accept loop and handlers to the Registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Socket accepted; add it before its handler starts
    Register {
        client_id: ClientId,
        outbox: mpsc::Sender<Arc<str>>,
        reply: oneshot::Sender<Admission>,
    },
    /// Login succeeded; bind nickname and answer `LOGIN_SUCCESS`
    Join {
        client_id: ClientId,
        nickname: String,
    },
    /// Login failed; answer `LOGIN_FAILED` and drop the participant
    Reject {
        client_id: ClientId,
    },
    /// Send a chat line to every logged-in participant, sender included
    Broadcast {
        sender: ClientId,
        message: String,
    },
    /// Connection ended
    Remove {
        client_id: ClientId,
    },
    /// Number of registered connections
    ClientCount {
        reply: oneshot::Sender<usize>,
    },
    /// Notify everyone, then drop every participant
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// The Registry actor
///
/// Owns the participant set. Not-yet-logged-in connections are registered
/// but only receive their login reply and the shutdown notice.
pub struct Registry {
    /// All registered connections: ClientId -> Participant
    participants: HashMap<ClientId, Participant>,
    /// Upper bound on registered connections
    max_clients: Option<usize>,
    /// Cleared by shutdown; later registrations are refused
    accepting: bool,
    /// Command receiver channel
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl Registry {
    /// Create a new Registry with the given command receiver
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>, max_clients: Option<usize>) -> Self {
        Self {
            participants: HashMap::new(),
            max_clients,
            accepting: true,
            receiver,
        }
    }

    /// Run the Registry event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    pub async fn run(mut self) {
        debug!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("Registry stopped");
    }

    /// Process a single command
    ///
    /// Never waits on a connection: every outbox write is a `try_send`.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                client_id,
                outbox,
                reply,
            } => {
                let admission = self.handle_register(client_id, outbox);
                let _ = reply.send(admission);
            }
            RegistryCommand::Join {
                client_id,
                nickname,
            } => {
                self.handle_join(client_id, nickname);
            }
            RegistryCommand::Reject { client_id } => {
                self.handle_reject(client_id);
            }
            RegistryCommand::Broadcast { sender, message } => {
                if self.participants.get(&sender).is_some_and(Participant::has_joined) {
                    self.handle_broadcast(message.into());
                } else {
                    debug!("Dropping line from {}: not in the chat", sender);
                }
            }
            RegistryCommand::Remove { client_id } => {
                if let Some(nickname) = self.remove(client_id) {
                    self.handle_broadcast(message::departure_notice(&nickname).into());
                }
            }
            RegistryCommand::ClientCount { reply } => {
                let _ = reply.send(self.participants.len());
            }
            RegistryCommand::Shutdown { done } => {
                self.handle_shutdown();
                let _ = done.send(());
            }
        }
    }

    /// Handle a newly accepted socket
    fn handle_register(&mut self, client_id: ClientId, outbox: mpsc::Sender<Arc<str>>) -> Admission {
        if !self.accepting {
            return Admission::ShuttingDown;
        }
        if let Some(max) = self.max_clients {
            if self.participants.len() >= max {
                return Admission::ServerFull;
            }
        }

        self.participants
            .insert(client_id, Participant::new(client_id, outbox));
        info!(
            "Client {} connected ({} clients)",
            client_id,
            self.participants.len()
        );
        Admission::Admitted
    }

    /// Handle successful login
    fn handle_join(&mut self, client_id: ClientId, nickname: String) {
        let Some(participant) = self.participants.get_mut(&client_id) else {
            return;
        };

        participant.join(nickname);
        info!("Client {} logged in as '{}'", client_id, participant.display_name());

        if let Err(e) = participant.notify(Reply::LoginSuccess.as_str().into()) {
            warn!("Login reply to {} not delivered: {}", client_id, e);
            self.remove(client_id);
        }
    }

    /// Handle failed login
    fn handle_reject(&mut self, client_id: ClientId) {
        let Some(participant) = self.participants.remove(&client_id) else {
            return;
        };

        let _ = participant.notify(Reply::LoginFailed.as_str().into());
        debug!(
            "Client {} dropped after failed login ({} clients)",
            client_id,
            self.participants.len()
        );
    }

    /// Queue `message` for every logged-in participant
    ///
    /// A participant whose outbox is full or closed is dropped on the spot,
    /// and everyone left hears its departure notice.
    fn handle_broadcast(&mut self, message: Arc<str>) {
        let mut queue = VecDeque::from([message]);

        while let Some(message) = queue.pop_front() {
            debug!("Broadcasting: {}", message);

            let failed: Vec<ClientId> = self
                .participants
                .values()
                .filter(|p| p.has_joined())
                .filter_map(|p| match p.notify(Arc::clone(&message)) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("Dropping {} ({}): {}", p.id, p.display_name(), e);
                        Some(p.id)
                    }
                })
                .collect();

            for client_id in failed {
                if let Some(nickname) = self.remove(client_id) {
                    queue.push_back(message::departure_notice(&nickname).into());
                }
            }
        }
    }

    /// Drop a participant and its outbox sender
    ///
    /// Returns the nickname if it had logged in. Unknown ids are a no-op.
    fn remove(&mut self, client_id: ClientId) -> Option<String> {
        let participant = self.participants.remove(&client_id)?;

        info!(
            "Client {} ({}) disconnected ({} clients)",
            client_id,
            participant.display_name(),
            self.participants.len()
        );
        participant.nickname
    }

    /// Handle server shutdown
    ///
    /// The notice is best-effort: a participant whose outbox is full misses it.
    /// Dropping each outbox sender ends that connection's writer, which in
    /// turn ends its handler.
    fn handle_shutdown(&mut self) {
        self.accepting = false;

        let notice: Arc<str> = message::SHUTDOWN_NOTICE.into();
        for (client_id, participant) in self.participants.drain() {
            if let Err(e) = participant.notify(Arc::clone(&notice)) {
                warn!("Shutdown notice to {} not delivered: {}", client_id, e);
            }
        }

        info!("Registry shut down");
    }
}

/// Cloneable front door to the Registry actor
///
/// Also carries the shared password, which never changes after startup.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    commands: mpsc::Sender<RegistryCommand>,
    password: Arc<str>,
}

impl RegistryHandle {
    /// Spawn a Registry actor and return a handle to it
    pub fn spawn(password: impl Into<Arc<str>>, max_clients: Option<usize>) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER_SIZE);
        tokio::spawn(Registry::new(receiver, max_clients).run());

        Self {
            commands,
            password: password.into(),
        }
    }

    /// Plain equality against the configured password
    pub fn password_valid(&self, attempt: &str) -> bool {
        *self.password == *attempt
    }

    /// Add an accepted connection to the set
    pub async fn register(
        &self,
        client_id: ClientId,
        outbox: mpsc::Sender<Arc<str>>,
    ) -> Result<Admission, ChatError> {
        let (reply, admission) = oneshot::channel();
        self.send(RegistryCommand::Register {
            client_id,
            outbox,
            reply,
        })
        .await?;
        admission.await.map_err(|_| ChatError::ChannelSend)
    }

    pub async fn join(&self, client_id: ClientId, nickname: String) -> Result<(), ChatError> {
        self.send(RegistryCommand::Join {
            client_id,
            nickname,
        })
        .await
    }

    pub async fn reject(&self, client_id: ClientId) -> Result<(), ChatError> {
        self.send(RegistryCommand::Reject { client_id }).await
    }

    pub async fn broadcast(&self, sender: ClientId, message: String) -> Result<(), ChatError> {
        self.send(RegistryCommand::Broadcast { sender, message })
            .await
    }

    /// Remove a connection; a no-op if it is not registered
    pub async fn remove_client(&self, client_id: ClientId) -> Result<(), ChatError> {
        self.send(RegistryCommand::Remove { client_id }).await
    }

    /// Number of registered connections, logged in or not
    ///
    /// Answered after every command queued before it.
    pub async fn client_count(&self) -> Result<usize, ChatError> {
        let (reply, count) = oneshot::channel();
        self.send(RegistryCommand::ClientCount { reply }).await?;
        count.await.map_err(|_| ChatError::ChannelSend)
    }

    /// Send the shutdown notice and release every connection
    pub async fn shutdown(&self) -> Result<(), ChatError> {
        let (done, finished) = oneshot::channel();
        self.send(RegistryCommand::Shutdown { done }).await?;
        finished.await.map_err(|_| ChatError::ChannelSend)
    }

    async fn send(&self, cmd: RegistryCommand) -> Result<(), ChatError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| ChatError::ChannelSend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registered(
        registry: &RegistryHandle,
        nickname: Option<&str>,
    ) -> (ClientId, mpsc::Receiver<Arc<str>>) {
        let client_id = ClientId::new();
        let (tx, mut rx) = mpsc::channel(32);
        assert_eq!(
            registry.register(client_id, tx).await.unwrap(),
            Admission::Admitted
        );
        if let Some(nickname) = nickname {
            registry.join(client_id, nickname.to_string()).await.unwrap();
            assert_eq!(rx.recv().await.as_deref(), Some("LOGIN_SUCCESS"));
        }
        (client_id, rx)
    }

    #[tokio::test]
    async fn test_password_valid() {
        let registry = RegistryHandle::spawn("secret", None);
        assert!(registry.password_valid("secret"));
        assert!(!registry.password_valid("Secret"));
        assert!(!registry.password_valid(""));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_including_sender() {
        let registry = RegistryHandle::spawn("pw", None);
        let (alice, mut alice_rx) = registered(&registry, Some("Alice")).await;
        let (_bob, mut bob_rx) = registered(&registry, Some("Bob")).await;

        registry
            .broadcast(alice, "Alice: hello".to_string())
            .await
            .unwrap();

        assert_eq!(alice_rx.recv().await.as_deref(), Some("Alice: hello"));
        assert_eq!(bob_rx.recv().await.as_deref(), Some("Alice: hello"));
    }

    #[tokio::test]
    async fn test_broadcast_skips_pending_login() {
        let registry = RegistryHandle::spawn("pw", None);
        let (alice, mut alice_rx) = registered(&registry, Some("Alice")).await;
        let (_pending, mut pending_rx) = registered(&registry, None).await;

        registry.broadcast(alice, "Alice: hi".to_string()).await.unwrap();
        assert_eq!(alice_rx.recv().await.as_deref(), Some("Alice: hi"));

        registry.client_count().await.unwrap();
        assert!(pending_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_joiner_misses_earlier_broadcast() {
        let registry = RegistryHandle::spawn("pw", None);
        let (alice, _alice_rx) = registered(&registry, Some("Alice")).await;

        registry.broadcast(alice, "Alice: early".to_string()).await.unwrap();
        let (_bob, mut bob_rx) = registered(&registry, Some("Bob")).await;
        registry.broadcast(alice, "Alice: late".to_string()).await.unwrap();

        assert_eq!(bob_rx.recv().await.as_deref(), Some("Alice: late"));
    }

    #[tokio::test]
    async fn test_remove_sends_one_departure_notice() {
        let registry = RegistryHandle::spawn("pw", None);
        let (alice, _alice_rx) = registered(&registry, Some("Alice")).await;
        let (_bob, mut bob_rx) = registered(&registry, Some("Bob")).await;
        let (_carol, mut carol_rx) = registered(&registry, Some("Carol")).await;

        registry.remove_client(alice).await.unwrap();
        assert_eq!(registry.client_count().await.unwrap(), 2);

        assert_eq!(bob_rx.recv().await.as_deref(), Some("Alice disconnected"));
        assert_eq!(carol_rx.recv().await.as_deref(), Some("Alice disconnected"));
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_removed_outbox_closes() {
        let registry = RegistryHandle::spawn("pw", None);
        let (alice, mut alice_rx) = registered(&registry, Some("Alice")).await;

        registry.remove_client(alice).await.unwrap();
        assert!(alice_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let registry = RegistryHandle::spawn("pw", None);
        let (_alice, mut alice_rx) = registered(&registry, Some("Alice")).await;

        registry.remove_client(ClientId::new()).await.unwrap();
        assert_eq!(registry.client_count().await.unwrap(), 1);
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reject_answers_and_drops() {
        let registry = RegistryHandle::spawn("pw", None);
        let (_alice, mut alice_rx) = registered(&registry, Some("Alice")).await;
        let (mallory, mut mallory_rx) = registered(&registry, None).await;

        registry.reject(mallory).await.unwrap();
        registry.remove_client(mallory).await.unwrap();

        assert_eq!(mallory_rx.recv().await.as_deref(), Some("LOGIN_FAILED"));
        assert!(mallory_rx.recv().await.is_none());
        assert_eq!(registry.client_count().await.unwrap(), 1);
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_outbox_is_dropped_not_awaited() {
        let registry = RegistryHandle::spawn("pw", None);
        let (bob, mut bob_rx) = registered(&registry, Some("Bob")).await;

        // Alice's outbox holds one message and she never drains it
        let alice = ClientId::new();
        let (tx, mut alice_rx) = mpsc::channel(1);
        registry.register(alice, tx).await.unwrap();
        registry.join(alice, "Alice".to_string()).await.unwrap();

        registry.broadcast(bob, "Bob: one".to_string()).await.unwrap();
        registry.broadcast(bob, "Bob: two".to_string()).await.unwrap();
        assert_eq!(registry.client_count().await.unwrap(), 1);

        assert_eq!(bob_rx.recv().await.as_deref(), Some("Bob: one"));
        assert_eq!(bob_rx.recv().await.as_deref(), Some("Alice disconnected"));
        assert_eq!(bob_rx.recv().await.as_deref(), Some("Bob: two"));

        assert_eq!(alice_rx.recv().await.as_deref(), Some("LOGIN_SUCCESS"));
        assert!(alice_rx.recv().await.is_none());

        // The dropped connection's handler may still report its end
        registry.remove_client(alice).await.unwrap();
        registry.client_count().await.unwrap();
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_from_outside_the_chat_ignored() {
        let registry = RegistryHandle::spawn("pw", None);
        let (_alice, mut alice_rx) = registered(&registry, Some("Alice")).await;
        let (pending, _pending_rx) = registered(&registry, None).await;

        registry.broadcast(pending, "ghost".to_string()).await.unwrap();
        registry.broadcast(ClientId::new(), "ghost".to_string()).await.unwrap();
        registry.client_count().await.unwrap();

        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_max_clients() {
        let registry = RegistryHandle::spawn("pw", Some(1));
        let (_alice, _alice_rx) = registered(&registry, None).await;

        let (tx, _rx) = mpsc::channel(32);
        assert_eq!(
            registry.register(ClientId::new(), tx).await.unwrap(),
            Admission::ServerFull
        );
    }

    #[tokio::test]
    async fn test_shutdown_notifies_all_and_refuses_new() {
        let registry = RegistryHandle::spawn("pw", None);
        let (_alice, mut alice_rx) = registered(&registry, Some("Alice")).await;
        let (_pending, mut pending_rx) = registered(&registry, None).await;

        registry.shutdown().await.unwrap();

        assert_eq!(alice_rx.recv().await.as_deref(), Some("Server is shutting down"));
        assert!(alice_rx.recv().await.is_none());
        assert_eq!(pending_rx.recv().await.as_deref(), Some("Server is shutting down"));
        assert_eq!(registry.client_count().await.unwrap(), 0);

        let (tx, _rx) = mpsc::channel(32);
        assert_eq!(
            registry.register(ClientId::new(), tx).await.unwrap(),
            Admission::ShuttingDown
        );
    }
}
