//! Authentication hook for validating the credential on a new connection.
//!
//! The dispatcher doesn't know how tokens are issued or verified. It holds
//! an [`Authenticator`] and calls it once per connection, before any
//! session logic runs. [`JwtAuthenticator`](crate::JwtAuthenticator) is the
//! production implementation; tests plug in their own.

use tunequeue_protocol::UserId;

use crate::AuthError;

/// A resolved user identity, attached to a connection at admission time.
///
/// There is no way to change `id` after construction: once a connection is
/// admitted, every membership change it makes uses this id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    id: UserId,
    username: Option<String>,
}

impl UserIdentity {
    /// Creates an identity for `id`.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            username: None,
        }
    }

    /// Attaches a display name.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// The user's id.
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// The user's display name, if known.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// Validates a connection credential and returns who it belongs to.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use tunequeue_auth::{AuthError, Authenticator, UserIdentity};
///
/// /// Treats the token itself as the user id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError> {
///         if token.is_empty() {
///             return Err(AuthError::MissingToken);
///         }
///         Ok(UserIdentity::new(token))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and resolves it to an existing user.
    ///
    /// # Errors
    /// Any [`AuthError`]; the dispatcher refuses the connection.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<UserIdentity, AuthError>> + Send;
}
