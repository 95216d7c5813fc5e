//! The [`SessionStore`] trait: the persistence seam for session records.

use std::fmt;
use std::future::Future;

use tunequeue_protocol::{Session, SessionCode, SessionId, SessionStatus, UserId};

use crate::StoreError;

/// How a participant mutation finds its session.
///
/// Joins and explicit leaves name the session by the code the user typed;
/// disconnect cleanup uses the id recorded when the connection joined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionLookup {
    Code(SessionCode),
    Id(SessionId),
}

impl fmt::Display for SessionLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "code {code}"),
            Self::Id(id) => write!(f, "id {id}"),
        }
    }
}

impl From<SessionCode> for SessionLookup {
    fn from(code: SessionCode) -> Self {
        Self::Code(code)
    }
}

impl From<SessionId> for SessionLookup {
    fn from(id: SessionId) -> Self {
        Self::Id(id)
    }
}

/// Persistent storage for [`Session`] records.
///
/// The participant operations are the contract the presence layer relies
/// on. Each one must be a single atomic find-and-mutate: two connections
/// joining the same session at the same time both end up in the set,
/// neither overwrites the other. Both return the record as it is *after*
/// the mutation, or `None` if no session matched.
///
/// # Implementing
///
/// ```rust,ignore
/// impl SessionStore for PostgresSessionStore {
///     async fn add_participant(
///         &self,
///         lookup: &SessionLookup,
///         user: &UserId,
///     ) -> Result<Option<Session>, StoreError> {
///         // UPDATE sessions SET participants = ... WHERE ... RETURNING *
///     }
///     // ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Creates a session hosted by `host_id` with a fresh, unique code.
    fn create_session(
        &self,
        host_id: UserId,
        session_name: String,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Looks up a session by its join code.
    fn find_by_code(
        &self,
        code: &SessionCode,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Looks up a session by id.
    fn find_by_id(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// All sessions hosted by `host_id`, newest first.
    fn find_by_host(
        &self,
        host_id: &UserId,
    ) -> impl Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// Adds `user` to the participant set. Idempotent.
    fn add_participant(
        &self,
        lookup: &SessionLookup,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Removes `user` from the participant set. Removing a non-member
    /// still returns the (unchanged) record.
    fn remove_participant(
        &self,
        lookup: &SessionLookup,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Changes a session's lifecycle status.
    fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;
}
