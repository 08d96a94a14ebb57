//! Listening socket and accept loop
//!
//! Every accepted socket is registered with the registry before its
//! handler task starts.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::ChatError;
use crate::handler::{self, OUTBOX_CAPACITY};
use crate::message::Reply;
use crate::registry::RegistryHandle;
use crate::types::{Admission, ClientId};

/// A bound chat relay
pub struct Server {
    listener: TcpListener,
    registry: RegistryHandle,
}

impl Server {
    /// Bind the listening socket and start the registry
    ///
    /// Fails with `InvalidPassword` if no password is configured.
    pub async fn bind(config: ServerConfig) -> Result<Self, ChatError> {
        if !config.has_password() {
            return Err(ChatError::InvalidPassword);
        }

        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| ChatError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        info!("Chat relay listening on {}", listener.local_addr()?);

        let registry = RegistryHandle::spawn(config.password, config.max_clients);

        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Accept connections until accepting fails
    pub async fn start(self) -> Result<(), ChatError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until accepting fails or `signal` completes
    ///
    /// Either way the listening socket is closed and the registry shut down,
    /// which sends the shutdown notice and ends every handler.
    pub async fn run_until<F>(self, signal: F) -> Result<(), ChatError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);

        let result = loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr),
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        break Err(ChatError::from(e));
                    }
                },
            }
        };

        info!("Chat relay shutting down");
        drop(self.listener);
        if let Err(e) = self.registry.shutdown().await {
            warn!("Registry shutdown failed: {}", e);
        }

        result
    }

    /// Register an accepted socket and run its handler on a new task
    ///
    /// The accept loop never waits on the registry.
    fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let client_id = ClientId::new();
            let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);

            match registry.register(client_id, outbox_tx).await {
                Ok(Admission::Admitted) => {
                    debug!("Client {} connected from {}", client_id, addr);
                    if let Err(e) =
                        handler::handle_connection(stream, client_id, outbox_rx, registry).await
                    {
                        error!("Connection handler error for {}: {}", addr, e);
                    }
                }
                Ok(Admission::ServerFull) => {
                    warn!("Refusing {}: server is full", addr);
                    handler::refuse_connection(stream, Reply::ServerFull).await;
                }
                Ok(Admission::ShuttingDown) | Err(_) => {
                    debug!("Dropping {}: registry is shutting down", addr);
                }
            }
        });
    }
}
