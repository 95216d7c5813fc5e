//! Error types for the auth layer.

use tunequeue_protocol::UserId;

/// Why a connection attempt was refused.
///
/// The `Display` strings are what the client sees in the 401 error frame;
/// the browser client matches on the first two to decide whether to
/// refresh its token and reconnect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented at all.
    #[error("Authentication token missing")]
    MissingToken,

    /// The token is malformed, has a bad signature, or claims the wrong
    /// issuer.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token was valid but has expired.
    #[error("Invalid or expired token")]
    Expired,

    /// The token verified but names a user that does not exist.
    #[error("user {0} not found")]
    UnknownUser(UserId),

    /// The identity lookup itself failed (directory unavailable).
    #[error("identity lookup failed: {0}")]
    Directory(String),
}
