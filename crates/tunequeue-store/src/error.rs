//! Error types for the store layer.

use tunequeue_protocol::SessionCode;

/// Errors a [`SessionStore`](crate::SessionStore) can return.
///
/// "Not found" is not an error here: lookups and mutations return
/// `Option` so callers decide what a missing session means to them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Another session already uses this code.
    #[error("session code {0} is already in use")]
    DuplicateCode(SessionCode),

    /// Code generation kept colliding with existing sessions.
    #[error("could not allocate a free session code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// The backing storage failed or is unreachable.
    #[error("session storage unavailable: {0}")]
    Backend(String),
}
