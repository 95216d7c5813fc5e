//! Live presence for Tunequeue session rooms.
//!
//! Each authenticated connection gets a [`ConnectionContext`] from the
//! [`PresenceManager`]. Joining a session puts the connection in that
//! session's room; leaving or disconnecting takes it out. Every change is
//! written to the [`SessionStore`](tunequeue_store::SessionStore) and
//! announced to the room.
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher  ← forwards join/leave/disconnect, drains OutboundReceiver
//!     ↕
//! Presence (this crate)
//!     ↕
//! Store       ← atomic participant mutations
//! ```

mod connection;
mod error;
mod manager;
mod room;

pub use connection::{ConnectionContext, ConnectionState, OutboundReceiver, OutboundSender};
pub use error::PresenceError;
pub use manager::PresenceManager;
pub use room::RoomRegistry;
