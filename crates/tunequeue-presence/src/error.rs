//! Error types for the presence layer.

use tunequeue_protocol::SessionCode;
use tunequeue_store::StoreError;

/// Errors from join and leave transitions.
///
/// None of these end the connection: the dispatcher turns them into a
/// failed acknowledgement and keeps reading.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// No session has this join code. Nothing was mutated.
    #[error("session {0} not found")]
    SessionNotFound(SessionCode),

    /// The session store failed. Room membership was left as it was.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The connection has already been torn down.
    #[error("connection is closed")]
    Closed,
}
