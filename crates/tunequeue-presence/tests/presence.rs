//! Integration tests for the presence state machine against an in-memory
//! store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tunequeue_auth::UserIdentity;
use tunequeue_presence::{
    ConnectionContext, ConnectionState, OutboundReceiver, PresenceError, PresenceManager,
};
use tunequeue_protocol::{
    ServerEvent, Session, SessionCode, SessionId, SessionStatus, UserId,
};
use tunequeue_store::{InMemorySessionStore, SessionLookup, SessionStore, StoreError};
use tunequeue_transport::ConnectionId;

// =========================================================================
// Fixtures
// =========================================================================

fn fixture(id: &str, code: &str, participants: &[&str]) -> Session {
    Session {
        id: SessionId::from(id),
        host_id: UserId::from("host"),
        session_name: "Friday".into(),
        session_code: SessionCode::from(code),
        participants: participants.iter().map(|p| UserId::from(*p)).collect(),
        session_status: SessionStatus::Active,
        created_at: 0,
        updated_at: 0,
    }
}

async fn manager_with(sessions: &[Session]) -> PresenceManager<InMemorySessionStore> {
    let store = InMemorySessionStore::new();
    for s in sessions {
        store.insert(s.clone()).await.unwrap();
    }
    PresenceManager::new(Arc::new(store))
}

fn connect<S: SessionStore>(
    presence: &PresenceManager<S>,
    conn: u64,
    user: &str,
) -> (ConnectionContext, OutboundReceiver) {
    presence.admit(ConnectionId::new(conn), UserIdentity::new(user))
}

fn code(c: &str) -> SessionCode {
    SessionCode::from(c)
}

fn joined(user: &str, count: usize) -> ServerEvent {
    ServerEvent::UserJoined {
        user_id: UserId::from(user),
        participant_count: count,
    }
}

fn left(user: &str, count: usize) -> ServerEvent {
    ServerEvent::UserLeft {
        user_id: UserId::from(user),
        participant_count: count,
    }
}

/// Everything queued on `rx` so far.
fn drain(rx: &mut OutboundReceiver) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

async fn participants<S: SessionStore>(presence: &PresenceManager<S>, id: &str) -> Vec<UserId> {
    presence
        .store()
        .find_by_id(&SessionId::from(id))
        .await
        .unwrap()
        .unwrap()
        .participants
}

/// A store whose mutations can be made to fail on demand.
struct FlakyStore {
    inner: InMemorySessionStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Backend("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

impl SessionStore for FlakyStore {
    async fn create_session(&self, host_id: UserId, name: String) -> Result<Session, StoreError> {
        self.check()?;
        self.inner.create_session(host_id, name).await
    }

    async fn find_by_code(&self, code: &SessionCode) -> Result<Option<Session>, StoreError> {
        self.inner.find_by_code(code).await
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_host(&self, host_id: &UserId) -> Result<Vec<Session>, StoreError> {
        self.inner.find_by_host(host_id).await
    }

    async fn add_participant(
        &self,
        lookup: &SessionLookup,
        user: &UserId,
    ) -> Result<Option<Session>, StoreError> {
        self.check()?;
        self.inner.add_participant(lookup, user).await
    }

    async fn remove_participant(
        &self,
        lookup: &SessionLookup,
        user: &UserId,
    ) -> Result<Option<Session>, StoreError> {
        self.check()?;
        self.inner.remove_participant(lookup, user).await
    }

    async fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
    ) -> Result<Option<Session>, StoreError> {
        self.check()?;
        self.inner.set_status(id, status).await
    }
}

async fn flaky_manager(sessions: &[Session]) -> (PresenceManager<FlakyStore>, Arc<FlakyStore>) {
    let inner = InMemorySessionStore::new();
    for s in sessions {
        inner.insert(s.clone()).await.unwrap();
    }
    let store = Arc::new(FlakyStore {
        inner,
        failing: AtomicBool::new(false),
    });
    (PresenceManager::new(Arc::clone(&store)), store)
}

// =========================================================================
// join()
// =========================================================================

#[tokio::test]
async fn test_join_non_member_adds_once_and_broadcasts_incremented_count() {
    let presence = manager_with(&[fixture("s1", "AB12", &["u9"])]).await;
    let (mut ctx, mut rx) = connect(&presence, 1, "u1");

    let session = presence.join(&mut ctx, &code("AB12")).await.unwrap();

    assert_eq!(session.participants, vec![UserId::from("u9"), UserId::from("u1")]);
    assert_eq!(ctx.state(), &ConnectionState::InRoom(SessionId::from("s1")));
    assert_eq!(drain(&mut rx), vec![joined("u1", 2)]);
    assert_eq!(presence.live_count(&SessionId::from("s1")).await, 1);
}

#[tokio::test]
async fn test_join_twice_keeps_set_and_rebroadcasts_same_count() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut ctx, mut rx) = connect(&presence, 1, "u1");

    presence.join(&mut ctx, &code("AB12")).await.unwrap();
    let session = presence.join(&mut ctx, &code("ab12")).await.unwrap();

    assert_eq!(session.participant_count(), 1);
    assert_eq!(drain(&mut rx), vec![joined("u1", 1), joined("u1", 1)]);
    assert_eq!(presence.live_count(&SessionId::from("s1")).await, 1);
}

#[tokio::test]
async fn test_join_broadcast_reaches_existing_members() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut a, mut rx_a) = connect(&presence, 1, "u1");
    let (mut b, mut rx_b) = connect(&presence, 2, "u2");

    presence.join(&mut a, &code("AB12")).await.unwrap();
    presence.join(&mut b, &code("AB12")).await.unwrap();

    assert_eq!(drain(&mut rx_a), vec![joined("u1", 1), joined("u2", 2)]);
    assert_eq!(drain(&mut rx_b), vec![joined("u2", 2)]);
}

#[tokio::test]
async fn test_join_unknown_code_returns_not_found_without_side_effects() {
    let presence = manager_with(&[fixture("s1", "AB12", &["u9"])]).await;
    let (mut watcher, mut rx_w) = connect(&presence, 1, "u9");
    presence.join(&mut watcher, &code("AB12")).await.unwrap();
    drain(&mut rx_w);
    let (mut ctx, mut rx) = connect(&presence, 2, "u1");

    let result = presence.join(&mut ctx, &code("ZZZZ")).await;

    assert!(matches!(result, Err(PresenceError::SessionNotFound(c)) if c == code("ZZZZ")));
    assert_eq!(ctx.state(), &ConnectionState::NoRoom);
    assert!(drain(&mut rx).is_empty());
    assert!(drain(&mut rx_w).is_empty());
    assert_eq!(participants(&presence, "s1").await, vec![UserId::from("u9")]);
}

#[tokio::test]
async fn test_join_other_session_leaves_previous_room_first() {
    let presence = manager_with(&[
        fixture("s1", "AAAA", &[]),
        fixture("s2", "BBBB", &[]),
    ])
    .await;
    let (mut stayer, mut rx_s) = connect(&presence, 1, "u2");
    let (mut mover, mut rx_m) = connect(&presence, 2, "u1");
    presence.join(&mut stayer, &code("AAAA")).await.unwrap();
    presence.join(&mut mover, &code("AAAA")).await.unwrap();
    drain(&mut rx_s);
    drain(&mut rx_m);

    presence.join(&mut mover, &code("BBBB")).await.unwrap();

    assert_eq!(mover.current_session(), Some(&SessionId::from("s2")));
    assert_eq!(drain(&mut rx_s), vec![left("u1", 1)]);
    assert_eq!(drain(&mut rx_m), vec![joined("u1", 1)]);
    assert_eq!(participants(&presence, "s1").await, vec![UserId::from("u2")]);
    assert_eq!(presence.live_count(&SessionId::from("s1")).await, 1);
    assert_eq!(presence.live_count(&SessionId::from("s2")).await, 1);
}

#[tokio::test]
async fn test_join_store_failure_leaves_membership_unchanged() {
    let (presence, store) = flaky_manager(&[fixture("s1", "AB12", &[])]).await;
    let (mut ctx, mut rx) = connect(&presence, 1, "u1");
    store.failing.store(true, Ordering::SeqCst);

    let result = presence.join(&mut ctx, &code("AB12")).await;

    assert!(matches!(result, Err(PresenceError::Store(StoreError::Backend(_)))));
    assert_eq!(ctx.state(), &ConnectionState::NoRoom);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(presence.room_count().await, 0);
}

// =========================================================================
// leave()
// =========================================================================

#[tokio::test]
async fn test_leave_after_join_restores_set_and_broadcasts_to_remaining() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut a, mut rx_a) = connect(&presence, 1, "u1");
    let (mut b, mut rx_b) = connect(&presence, 2, "u2");
    presence.join(&mut a, &code("AB12")).await.unwrap();
    presence.join(&mut b, &code("AB12")).await.unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    presence.leave(&mut b, &code("AB12")).await.unwrap();

    assert_eq!(b.state(), &ConnectionState::NoRoom);
    assert_eq!(drain(&mut rx_a), vec![left("u2", 1)]);
    assert!(drain(&mut rx_b).is_empty(), "the leaver is already out of the room");
    assert_eq!(participants(&presence, "s1").await, vec![UserId::from("u1")]);
}

#[tokio::test]
async fn test_leave_unknown_code_returns_not_found() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut ctx, _rx) = connect(&presence, 1, "u1");
    presence.join(&mut ctx, &code("AB12")).await.unwrap();

    let result = presence.leave(&mut ctx, &code("NOPE")).await;

    assert!(matches!(result, Err(PresenceError::SessionNotFound(_))));
    assert_eq!(ctx.current_session(), Some(&SessionId::from("s1")));
}

#[tokio::test]
async fn test_leave_store_failure_keeps_connection_in_room() {
    let (presence, store) = flaky_manager(&[fixture("s1", "AB12", &[])]).await;
    let (mut ctx, mut rx) = connect(&presence, 1, "u1");
    presence.join(&mut ctx, &code("AB12")).await.unwrap();
    drain(&mut rx);
    store.failing.store(true, Ordering::SeqCst);

    let result = presence.leave(&mut ctx, &code("AB12")).await;

    assert!(matches!(result, Err(PresenceError::Store(_))));
    assert_eq!(ctx.current_session(), Some(&SessionId::from("s1")));
    assert_eq!(presence.live_count(&SessionId::from("s1")).await, 1);
    assert!(drain(&mut rx).is_empty());
}

// =========================================================================
// disconnect()
// =========================================================================

#[tokio::test]
async fn test_disconnect_in_room_prunes_membership_and_broadcasts() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut a, mut rx_a) = connect(&presence, 1, "u1");
    let (mut b, _rx_b) = connect(&presence, 2, "u2");
    presence.join(&mut a, &code("AB12")).await.unwrap();
    presence.join(&mut b, &code("AB12")).await.unwrap();
    drain(&mut rx_a);

    presence.disconnect(&mut b).await;

    assert_eq!(b.state(), &ConnectionState::Disconnected);
    assert_eq!(drain(&mut rx_a), vec![left("u2", 1)]);
    assert_eq!(participants(&presence, "s1").await, vec![UserId::from("u1")]);
    assert_eq!(presence.live_count(&SessionId::from("s1")).await, 1);
}

#[tokio::test]
async fn test_disconnect_without_room_touches_nothing() {
    let presence = manager_with(&[fixture("s1", "AB12", &["u1"])]).await;
    let (mut ctx, _rx) = connect(&presence, 1, "u1");

    presence.disconnect(&mut ctx).await;

    assert!(ctx.is_closed());
    assert_eq!(participants(&presence, "s1").await, vec![UserId::from("u1")]);
}

#[tokio::test]
async fn test_disconnect_store_failure_still_releases_room() {
    let (presence, store) = flaky_manager(&[fixture("s1", "AB12", &[])]).await;
    let (mut ctx, _rx) = connect(&presence, 1, "u1");
    presence.join(&mut ctx, &code("AB12")).await.unwrap();
    store.failing.store(true, Ordering::SeqCst);

    presence.disconnect(&mut ctx).await;

    assert!(ctx.is_closed());
    assert_eq!(presence.room_count().await, 0);
}

#[tokio::test]
async fn test_join_after_disconnect_returns_closed() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut ctx, _rx) = connect(&presence, 1, "u1");
    presence.disconnect(&mut ctx).await;

    assert!(matches!(
        presence.join(&mut ctx, &code("AB12")).await,
        Err(PresenceError::Closed)
    ));
    assert!(matches!(
        presence.leave(&mut ctx, &code("AB12")).await,
        Err(PresenceError::Closed)
    ));
    assert!(participants(&presence, "s1").await.is_empty());
}

// =========================================================================
// End to end
// =========================================================================

#[tokio::test]
async fn test_two_users_join_then_one_disconnects() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut u1, mut rx1) = connect(&presence, 1, "u1");
    let (mut u2, mut rx2) = connect(&presence, 2, "u2");

    presence.join(&mut u1, &code("AB12")).await.unwrap();
    assert_eq!(drain(&mut rx1), vec![joined("u1", 1)]);

    presence.join(&mut u2, &code("AB12")).await.unwrap();
    assert_eq!(drain(&mut rx1), vec![joined("u2", 2)]);
    assert_eq!(drain(&mut rx2), vec![joined("u2", 2)]);

    presence.disconnect(&mut u1).await;
    assert_eq!(drain(&mut rx2), vec![left("u1", 1)]);
    assert_eq!(participants(&presence, "s1").await, vec![UserId::from("u2")]);
}

#[tokio::test]
async fn test_same_user_two_connections_share_room() {
    let presence = manager_with(&[fixture("s1", "AB12", &[])]).await;
    let (mut tab1, mut rx1) = connect(&presence, 1, "u1");
    let (mut tab2, mut rx2) = connect(&presence, 2, "u1");

    presence.join(&mut tab1, &code("AB12")).await.unwrap();
    presence.join(&mut tab2, &code("AB12")).await.unwrap();

    assert_eq!(presence.live_count(&SessionId::from("s1")).await, 2);
    assert_eq!(participants(&presence, "s1").await, vec![UserId::from("u1")]);
    assert_eq!(drain(&mut rx1), vec![joined("u1", 1), joined("u1", 1)]);
    assert_eq!(drain(&mut rx2), vec![joined("u1", 1)]);
}
