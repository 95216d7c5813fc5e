//! Group addressing: which live connections are in which session room.

use std::collections::HashMap;

use tunequeue_protocol::{ServerEvent, SessionId, UserId};
use tunequeue_transport::ConnectionId;

use crate::OutboundSender;

struct Member {
    user_id: UserId,
    sender: OutboundSender,
}

/// Live room membership, keyed by session id.
///
/// This is the live side of presence. It is deliberately independent of
/// the persisted participant set: a user can be a participant with no
/// live connection, or have two tabs open in the same room.
///
/// Not thread-safe by itself; the [`PresenceManager`](crate::PresenceManager)
/// owns it behind a mutex.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<SessionId, HashMap<ConnectionId, Member>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a connection in a room. Returns `false` if it was already there.
    pub fn admit(
        &mut self,
        session_id: &SessionId,
        conn_id: ConnectionId,
        user_id: UserId,
        sender: OutboundSender,
    ) -> bool {
        let room = self.rooms.entry(session_id.clone()).or_default();
        if room.contains_key(&conn_id) {
            return false;
        }
        room.insert(conn_id, Member { user_id, sender });
        true
    }

    /// Takes a connection out of a room. Empty rooms are dropped.
    /// Returns `false` if the connection was not in the room.
    pub fn evict(&mut self, session_id: &SessionId, conn_id: ConnectionId) -> bool {
        let Some(room) = self.rooms.get_mut(session_id) else {
            return false;
        };
        let removed = room.remove(&conn_id).is_some();
        if room.is_empty() {
            self.rooms.remove(session_id);
        }
        removed
    }

    /// Removes a connection from every room it is in.
    pub fn evict_everywhere(&mut self, conn_id: ConnectionId) {
        self.rooms.retain(|_, room| {
            room.remove(&conn_id);
            !room.is_empty()
        });
    }

    /// Queues `event` for every connection in the room.
    ///
    /// Returns how many connections it was queued for. Connections whose
    /// receiver is gone are skipped; their handler is already tearing down.
    pub fn broadcast(&self, session_id: &SessionId, event: &ServerEvent) -> usize {
        let Some(room) = self.rooms.get(session_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (conn_id, member) in room {
            if member.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(
                    %conn_id,
                    user_id = %member.user_id,
                    "outbound queue closed, skipping"
                );
            }
        }
        delivered
    }

    /// Number of live connections in the room.
    pub fn live_count(&self, session_id: &SessionId) -> usize {
        self.rooms.get(session_id).map_or(0, HashMap::len)
    }

    /// Number of rooms with at least one live connection.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if the connection is in the room.
    pub fn contains(&self, session_id: &SessionId, conn_id: ConnectionId) -> bool {
        self.rooms
            .get(session_id)
            .is_some_and(|room| room.contains_key(&conn_id))
    }
}
