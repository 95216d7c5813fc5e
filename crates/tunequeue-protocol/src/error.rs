//! Error types for the protocol layer.
//!
//! Each crate in Tunequeue defines its own error enum, so a
//! `ProtocolError` always means the problem is in serialization, not in
//! networking, auth, or persistence.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields,
    /// unknown event names, or truncated frames.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule, e.g. the first
    /// frame of a connection is not a handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
