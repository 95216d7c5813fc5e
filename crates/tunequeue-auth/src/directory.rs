//! Identity resolution: user id → user record.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tunequeue_protocol::UserId;

use crate::{AuthError, UserIdentity};

/// Looks up user records by id.
pub trait UserDirectory: Send + Sync + 'static {
    /// Returns the user, or `None` if no such user exists.
    ///
    /// # Errors
    /// [`AuthError::Directory`] if the lookup could not be performed.
    fn find_user(
        &self,
        id: &UserId,
    ) -> impl std::future::Future<Output = Result<Option<UserIdentity>, AuthError>> + Send;
}

/// A [`UserDirectory`] backed by a map in memory.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserIdentity>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with `users`.
    pub fn with_users(users: impl IntoIterator<Item = UserIdentity>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.id().clone(), user))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// Adds or replaces a user.
    pub async fn insert(&self, user: UserIdentity) {
        self.users.write().await.insert(user.id().clone(), user);
    }

    /// Removes a user. Tokens already issued to them stop resolving.
    pub async fn remove(&self, id: &UserId) -> Option<UserIdentity> {
        self.users.write().await.remove(id)
    }
}

impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserIdentity>, AuthError> {
        Ok(self.users.read().await.get(id).cloned())
    }
}
