//! In-process [`SessionStore`] backed by hash maps.
//!
//! All state lives behind one `tokio::sync::Mutex`, and every operation
//! does its find and its mutation inside a single lock scope. That is what
//! makes `add_participant`/`remove_participant` atomic: there is no window
//! between reading the participant set and writing it back.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tunequeue_protocol::{Session, SessionCode, SessionId, SessionStatus, UserId};

use crate::code::{generate_session_code, generate_session_id};
use crate::{SessionLookup, SessionStore, StoreError};

/// How many fresh codes to try before giving up on `create_session`.
const MAX_CODE_ATTEMPTS: usize = 16;

#[derive(Default)]
struct Inner {
    /// Session records, keyed by id.
    sessions: HashMap<SessionId, Session>,

    /// Index from join code to session id, kept in sync with `sessions`.
    codes: HashMap<SessionCode, SessionId>,

    /// Ids in insertion order, oldest first.
    order: Vec<SessionId>,
}

impl Inner {
    fn resolve(&self, lookup: &SessionLookup) -> Option<SessionId> {
        match lookup {
            SessionLookup::Code(code) => self.codes.get(code).cloned(),
            SessionLookup::Id(id) => self.sessions.contains_key(id).then(|| id.clone()),
        }
    }

    fn insert(&mut self, mut session: Session) -> Result<(), StoreError> {
        let taken = self
            .codes
            .get(&session.session_code)
            .is_some_and(|owner| owner != &session.id);
        if taken {
            return Err(StoreError::DuplicateCode(session.session_code));
        }
        // Participants are a set; keep the first occurrence of each user.
        let mut seen = HashSet::new();
        session.participants.retain(|user| seen.insert(user.clone()));

        if let Some(old) = self.sessions.remove(&session.id) {
            self.codes.remove(&old.session_code);
            self.order.retain(|id| id != &old.id);
        }

        self.codes
            .insert(session.session_code.clone(), session.id.clone());
        self.order.push(session.id.clone());
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Runs `mutate` on the session `lookup` names and returns the result.
    /// Bumps `updated_at` only if `mutate` reports a change.
    fn update(
        &mut self,
        lookup: &SessionLookup,
        mutate: impl FnOnce(&mut Session) -> bool,
    ) -> Option<Session> {
        let id = self.resolve(lookup)?;
        let session = self.sessions.get_mut(&id)?;
        if mutate(session) {
            session.updated_at = now_millis();
        }
        Some(session.clone())
    }
}

/// A [`SessionStore`] that keeps everything in memory.
///
/// Suitable for tests, demos and single-process deployments. Records are
/// lost when the process exits.
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: Mutex<Inner>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a complete record, e.g. to seed fixtures.
    ///
    /// A record with an existing id replaces it. Repeated entries in
    /// `participants` are collapsed to one.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateCode`] if a different session already
    /// uses `session.session_code`.
    pub async fn insert(&self, session: Session) -> Result<(), StoreError> {
        self.inner.lock().await.insert(session)
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Returns `true` if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        host_id: UserId,
        session_name: String,
    ) -> Result<Session, StoreError> {
        let mut inner = self.inner.lock().await;

        let mut code = generate_session_code();
        let mut attempts = 1;
        while inner.codes.contains_key(&code) {
            if attempts == MAX_CODE_ATTEMPTS {
                return Err(StoreError::CodeSpaceExhausted(attempts));
            }
            code = generate_session_code();
            attempts += 1;
        }

        let now = now_millis();
        let session = Session {
            id: generate_session_id(),
            host_id,
            session_name,
            session_code: code,
            participants: Vec::new(),
            session_status: SessionStatus::default(),
            created_at: now,
            updated_at: now,
        };
        inner.insert(session.clone())?;

        tracing::info!(
            session_id = %session.id,
            session_code = %session.session_code,
            host_id = %session.host_id,
            "session created"
        );
        Ok(session)
    }

    async fn find_by_code(&self, code: &SessionCode) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .codes
            .get(code)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.lock().await.sessions.get(id).cloned())
    }

    async fn find_by_host(&self, host_id: &UserId) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.sessions.get(id))
            .filter(|s| &s.host_id == host_id)
            .cloned()
            .collect())
    }

    async fn add_participant(
        &self,
        lookup: &SessionLookup,
        user: &UserId,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.update(lookup, |s| s.add_participant(user)))
    }

    async fn remove_participant(
        &self,
        lookup: &SessionLookup,
        user: &UserId,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.update(lookup, |s| s.remove_participant(user)))
    }

    async fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.update(&SessionLookup::Id(id.clone()), |s| {
            let changed = s.session_status != status;
            s.session_status = status;
            changed
        }))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
