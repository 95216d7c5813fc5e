//! Per-connection presence state.

use tokio::sync::mpsc;
use tunequeue_auth::UserIdentity;
use tunequeue_protocol::{ServerEvent, SessionId, UserId};
use tunequeue_transport::ConnectionId;

/// Where room broadcasts for one connection are queued.
///
/// Unbounded so a broadcast never waits on a slow client.
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

/// The receiving half of a connection's outbound queue.
pub type OutboundReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// The presence state machine of one connection.
///
/// ```text
///            join            leave
/// NoRoom ──────────→ InRoom ──────→ NoRoom
///    │                 │ join (other session)
///    │                 └──→ InRoom (leaves the old room first)
///    │   disconnect        │
///    └─────────────→ Disconnected ←─┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Authenticated, not in any session room.
    NoRoom,
    /// In the room of this session.
    InRoom(SessionId),
    /// Transport closed. Terminal.
    Disconnected,
}

/// Everything the presence layer knows about one live connection.
///
/// The identity is fixed when the context is created; there is no way to
/// change it afterwards. Every participant mutation uses it, never an id
/// the client sends.
#[derive(Debug)]
pub struct ConnectionContext {
    conn_id: ConnectionId,
    identity: UserIdentity,
    sender: OutboundSender,
    state: ConnectionState,
}

impl ConnectionContext {
    pub(crate) fn new(conn_id: ConnectionId, identity: UserIdentity, sender: OutboundSender) -> Self {
        Self {
            conn_id,
            identity,
            sender,
            state: ConnectionState::NoRoom,
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Shorthand for `identity().id()`.
    pub fn user_id(&self) -> &UserId {
        self.identity.id()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The session whose room this connection is in, if any.
    pub fn current_session(&self) -> Option<&SessionId> {
        match &self.state {
            ConnectionState::InRoom(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Disconnected
    }

    pub(crate) fn sender(&self) -> &OutboundSender {
        &self.sender
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }
}
