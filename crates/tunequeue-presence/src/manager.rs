//! The presence manager: join, leave and disconnect transitions.
//!
//! Two sources of truth meet here. The store holds the persisted
//! participant set; the [`RoomRegistry`] holds who is connected right now.
//! Every transition mutates the store first, then updates the registry and
//! broadcasts. Broadcast counts always come from the persisted set.
//!
//! # Locking
//!
//! The registry mutex is never held across a store call. Store calls are
//! where a transition can suspend for a long time; registry updates and
//! broadcasts are non-blocking and happen under one short lock scope.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tunequeue_auth::UserIdentity;
use tunequeue_protocol::{ServerEvent, Session, SessionCode, SessionId};
use tunequeue_store::{SessionLookup, SessionStore, StoreError};
use tunequeue_transport::ConnectionId;

use crate::{ConnectionContext, ConnectionState, OutboundReceiver, PresenceError, RoomRegistry};

/// Owns the live rooms and drives every connection's presence state.
///
/// Shared by all connection tasks (wrap it in an `Arc`). The store is
/// injected so tests and deployments choose the backing storage.
pub struct PresenceManager<S: SessionStore> {
    store: Arc<S>,
    rooms: Mutex<RoomRegistry>,
}

impl<S: SessionStore> PresenceManager<S> {
    /// Creates a manager with no live rooms.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            rooms: Mutex::new(RoomRegistry::new()),
        }
    }

    /// The session store this manager mutates.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Creates the context for a freshly authenticated connection.
    ///
    /// The connection starts in [`ConnectionState::NoRoom`]. Room broadcasts
    /// for it arrive on the returned receiver.
    pub fn admit(
        &self,
        conn_id: ConnectionId,
        identity: UserIdentity,
    ) -> (ConnectionContext, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        tracing::debug!(%conn_id, user_id = %identity.id(), "connection admitted");
        (ConnectionContext::new(conn_id, identity, tx), rx)
    }

    /// Joins the session with `code`.
    ///
    /// Adds the connection's user to the persisted participant set
    /// (idempotently), places the connection in the session's room, and
    /// broadcasts `user_joined` to everyone in it, the joiner included.
    /// A connection already in a different room leaves that room first.
    ///
    /// Returns the session record after the join.
    ///
    /// # Errors
    /// - [`PresenceError::SessionNotFound`]: no session has `code`; nothing
    ///   was mutated and nothing broadcast.
    /// - [`PresenceError::Store`]: the store failed; membership unchanged.
    /// - [`PresenceError::Closed`]: the connection is already disconnected.
    pub async fn join(
        &self,
        ctx: &mut ConnectionContext,
        code: &SessionCode,
    ) -> Result<Session, PresenceError> {
        if ctx.is_closed() {
            return Err(PresenceError::Closed);
        }
        let user_id = ctx.user_id().clone();

        let session = self
            .store
            .add_participant(&SessionLookup::Code(code.clone()), &user_id)
            .await?
            .ok_or_else(|| PresenceError::SessionNotFound(code.clone()))?;

        if let Some(previous) = ctx.current_session().cloned() {
            if previous != session.id {
                tracing::debug!(
                    %user_id,
                    from = %previous,
                    to = %session.id,
                    "switching rooms"
                );
                self.depart(ctx, &previous).await;
            }
        }

        let event = ServerEvent::UserJoined {
            user_id: user_id.clone(),
            participant_count: session.participant_count(),
        };
        {
            let mut rooms = self.rooms.lock().await;
            rooms.admit(&session.id, ctx.conn_id(), user_id.clone(), ctx.sender().clone());
            rooms.broadcast(&session.id, &event);
        }
        ctx.set_state(ConnectionState::InRoom(session.id.clone()));

        tracing::info!(
            %user_id,
            session_id = %session.id,
            participants = session.participant_count(),
            "user joined session"
        );
        Ok(session)
    }

    /// Leaves the session with `code`.
    ///
    /// Removes the user from the persisted participant set, takes the
    /// connection out of the room, and broadcasts `user_left` to whoever
    /// remains.
    ///
    /// # Errors
    /// - [`PresenceError::SessionNotFound`]: no session has `code`.
    /// - [`PresenceError::Store`]: the store failed; the connection stays in
    ///   the room.
    /// - [`PresenceError::Closed`]: the connection is already disconnected.
    pub async fn leave(
        &self,
        ctx: &mut ConnectionContext,
        code: &SessionCode,
    ) -> Result<(), PresenceError> {
        if ctx.is_closed() {
            return Err(PresenceError::Closed);
        }

        let session = self
            .store
            .remove_participant(&SessionLookup::Code(code.clone()), ctx.user_id())
            .await?
            .ok_or_else(|| PresenceError::SessionNotFound(code.clone()))?;

        self.announce_departure(ctx, &session).await;
        if ctx.current_session() == Some(&session.id) {
            ctx.set_state(ConnectionState::NoRoom);
        }

        tracing::info!(
            user_id = %ctx.user_id(),
            session_id = %session.id,
            participants = session.participant_count(),
            "user left session"
        );
        Ok(())
    }

    /// Tears down a connection's presence after its transport closed.
    ///
    /// If the connection was in a room, the user is removed from that
    /// session's participant set and `user_left` is broadcast, exactly as
    /// for an explicit leave. Failures are logged; the connection ends in
    /// [`ConnectionState::Disconnected`] with no registry entries either way.
    /// Calling this twice is a no-op.
    pub async fn disconnect(&self, ctx: &mut ConnectionContext) {
        if ctx.is_closed() {
            return;
        }

        if let Some(session_id) = ctx.current_session().cloned() {
            self.depart(ctx, &session_id).await;
        }

        self.rooms.lock().await.evict_everywhere(ctx.conn_id());
        ctx.set_state(ConnectionState::Disconnected);

        tracing::info!(
            conn_id = %ctx.conn_id(),
            user_id = %ctx.user_id(),
            "connection disconnected"
        );
    }

    /// Live connections in the session's room.
    pub async fn live_count(&self, session_id: &SessionId) -> usize {
        self.rooms.lock().await.live_count(session_id)
    }

    /// Rooms with at least one live connection.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.room_count()
    }

    /// Leaves the room of `session_id` on behalf of a room switch or a
    /// disconnect. Never fails: the connection always ends up out of the
    /// live room, and a store failure only leaves the persisted set stale.
    async fn depart(&self, ctx: &ConnectionContext, session_id: &SessionId) {
        let removed: Result<Option<Session>, StoreError> = self
            .store
            .remove_participant(&SessionLookup::Id(session_id.clone()), ctx.user_id())
            .await;

        match removed {
            Ok(Some(session)) => {
                self.announce_departure(ctx, &session).await;
                tracing::info!(
                    user_id = %ctx.user_id(),
                    %session_id,
                    participants = session.participant_count(),
                    "user departed session"
                );
            }
            Ok(None) => {
                tracing::warn!(
                    user_id = %ctx.user_id(),
                    %session_id,
                    "session vanished before departure"
                );
                self.rooms.lock().await.evict(session_id, ctx.conn_id());
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %ctx.user_id(),
                    %session_id,
                    error = %e,
                    "failed to remove participant on departure"
                );
                self.rooms.lock().await.evict(session_id, ctx.conn_id());
            }
        }
    }

    /// Evicts the connection from the session's room, then tells the
    /// remaining members.
    async fn announce_departure(&self, ctx: &ConnectionContext, session: &Session) {
        let event = ServerEvent::UserLeft {
            user_id: ctx.user_id().clone(),
            participant_count: session.participant_count(),
        };
        let mut rooms = self.rooms.lock().await;
        rooms.evict(&session.id, ctx.conn_id());
        rooms.broadcast(&session.id, &event);
    }
}
