//! `TunequeueServer` builder and accept loop.
//!
//! Ties the layers together: transport → dispatcher → presence → store.

use std::sync::Arc;
use std::time::Duration;

use tunequeue_auth::Authenticator;
use tunequeue_presence::PresenceManager;
use tunequeue_protocol::{Codec, JsonCodec};
use tunequeue_store::SessionStore;
use tunequeue_transport::{PendingConnection, Transport, WebSocketTransport};

use crate::dispatcher::handle_connection;
use crate::{ServerConfig, TunequeueError};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared state handed to each connection task.
pub(crate) struct ServerState<A: Authenticator, S: SessionStore, C: Codec> {
    pub(crate) presence: Arc<PresenceManager<S>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Tunequeue server.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tunequeue::prelude::*;
///
/// let server = TunequeueServerBuilder::from_config(ServerConfig::from_env()?)
///     .build(auth, Arc::new(InMemorySessionStore::new()))
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct TunequeueServerBuilder {
    config: ServerConfig,
}

impl TunequeueServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a client has to complete its handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets how long a connection may go without sending a frame.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A, S>(
        self,
        auth: A,
        store: Arc<S>,
    ) -> Result<TunequeueServer<A, S, JsonCodec>, TunequeueError>
    where
        A: Authenticator,
        S: SessionStore,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            presence: Arc::new(PresenceManager::new(store)),
            auth,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(TunequeueServer { transport, state })
    }
}

/// A bound Tunequeue server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TunequeueServer<A: Authenticator, S: SessionStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, C>>,
}

impl<A, S, C> TunequeueServer<A, S, C>
where
    A: Authenticator,
    S: SessionStore,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The presence manager shared by every connection.
    pub fn presence(&self) -> Arc<PresenceManager<S>> {
        Arc::clone(&self.state.presence)
    }

    /// The configuration the server runs with.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted connection gets its own task, which performs the
    /// WebSocket upgrade under the handshake timeout before dispatching.
    /// A failed accept is logged and the loop keeps going.
    pub async fn run(mut self) -> Result<(), TunequeueError> {
        tracing::info!(
            namespace = %self.state.config.namespace,
            "Tunequeue server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let limit = state.config.handshake_timeout;
                        let conn = match tokio::time::timeout(limit, pending.upgrade()).await {
                            Ok(Ok(conn)) => conn,
                            Ok(Err(e)) => {
                                tracing::debug!(%peer, error = %e, "upgrade failed");
                                return;
                            }
                            Err(_) => {
                                tracing::debug!(%peer, "upgrade timed out");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
