//! Unified error type for Tunequeue.

use tunequeue_auth::AuthError;
use tunequeue_presence::PresenceError;
use tunequeue_protocol::ProtocolError;
use tunequeue_store::StoreError;
use tunequeue_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum TunequeueError {
    /// Connection, send, or recv failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode, or unexpected message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection's credential was refused.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Session storage failure outside a connection's request handling.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Join/leave failure that escaped the acknowledgement path.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A configuration value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    Config { key: &'static str, value: String },
}
