//! Core protocol types for Tunequeue's wire format.
//!
//! Everything in this module is serialized onto the `/session` channel:
//! identities, the session record returned in acknowledgements, client
//! requests, room broadcasts, and the envelope that wraps them all.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user.
///
/// Newtype over the user record's id string. `#[serde(transparent)]`
/// keeps it a plain JSON string (`"u1"`, not `{"0":"u1"}`), which is what
/// the browser client compares against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty id, which never names a real user.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The persistent identifier of a session record. Also the room key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The short, human-shareable join code of a session.
///
/// Codes are case-insensitive for people typing them in: every
/// construction path, deserialization included, trims whitespace and
/// upper-cases the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Borrows the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionCode {
    fn from(code: String) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }
}

impl From<&str> for SessionCode {
    fn from(code: &str) -> Self {
        Self::from(code.to_string())
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Session record
// ---------------------------------------------------------------------------

/// Lifecycle status of a listening session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Music is playing and participants are interacting.
    Active,
    /// Created but not started, or stopped by the host.
    #[default]
    Inactive,
    /// Paused by the host.
    Halted,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// The persisted record of one hosted listening session.
///
/// `participants` is an ordered list with set semantics: use
/// [`Session::add_participant`] and [`Session::remove_participant`] to
/// mutate it so an identity never appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub host_id: UserId,
    pub session_name: String,
    pub session_code: SessionCode,
    #[serde(default)]
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub session_status: SessionStatus,
    /// Unix milliseconds.
    pub created_at: u64,
    /// Unix milliseconds.
    pub updated_at: u64,
}

impl Session {
    /// Size of the persisted participant set.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Returns `true` if `user` is in the participant set.
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// Adds `user` unless already present. Returns `true` if the set changed.
    pub fn add_participant(&mut self, user: &UserId) -> bool {
        if self.has_participant(user) {
            return false;
        }
        self.participants.push(user.clone());
        true
    }

    /// Removes `user` if present. Returns `true` if the set changed.
    pub fn remove_participant(&mut self, user: &UserId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p != user);
        self.participants.len() != before
    }
}

// ---------------------------------------------------------------------------
// SystemMessage: connection plumbing
// ---------------------------------------------------------------------------

/// Connection-level messages: handshake, keep-alive, and errors.
///
/// Internally tagged: `{ "type": "Handshake", "version": 1, "token": "…" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server, first frame of every connection. `token` is the
    /// bearer credential; when absent the server falls back to the one
    /// sent with the upgrade request.
    Handshake {
        version: u32,
        #[serde(default)]
        token: Option<String>,
    },

    /// Server → Client: admitted as `user_id`.
    HandshakeAck { user_id: UserId, server_time: u64 },

    /// Either direction: "I'm disconnecting."
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client reply to [`SystemMessage::Heartbeat`].
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Server → Client. `code` follows HTTP conventions (400, 401, 404).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Session channel events
// ---------------------------------------------------------------------------

/// Requests a client can make on the session channel.
///
/// Adjacently tagged to mirror the event-name/argument pairs the browser
/// client emits: `{ "event": "join_session", "data": "AB12" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Join the session with this code.
    JoinSession(SessionCode),
    /// Leave the session with this code.
    LeaveSession(SessionCode),
}

/// Membership notifications broadcast to every connection in a room.
///
/// `participant_count` is always the size of the persisted participant
/// set after the mutation, not the number of live connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    UserJoined {
        user_id: UserId,
        participant_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: UserId,
        participant_count: usize,
    },
}

impl ServerEvent {
    /// The user the event is about.
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::UserJoined { user_id, .. } | Self::UserLeft { user_id, .. } => user_id,
        }
    }

    /// The post-mutation participant count carried by the event.
    pub fn participant_count(&self) -> usize {
        match self {
            Self::UserJoined {
                participant_count, ..
            }
            | Self::UserLeft {
                participant_count, ..
            } => *participant_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Acknowledgements
// ---------------------------------------------------------------------------

/// Outcome of a client request, delivered as its acknowledgement.
///
/// In Rust this is a proper sum type. On the wire it keeps the flat shape
/// the browser client already reads: `{ "success": true, "session": … }`
/// or `{ "success": false, "message": "…" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AckWire", into = "AckWire")]
pub enum AckResult {
    /// The request succeeded. `session` is set for joins.
    Success { session: Option<Session> },
    /// The request failed; the connection is unaffected.
    Failure { message: String },
}

impl AckResult {
    /// A success with no payload (leave).
    pub fn ok() -> Self {
        Self::Success { session: None }
    }

    /// A failure with a human-readable message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Returns `true` for [`AckResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Serialize, Deserialize)]
struct AckWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<AckResult> for AckWire {
    fn from(result: AckResult) -> Self {
        match result {
            AckResult::Success { session } => Self {
                success: true,
                session,
                message: None,
            },
            AckResult::Failure { message } => Self {
                success: false,
                session: None,
                message: Some(message),
            },
        }
    }
}

impl From<AckWire> for AckResult {
    fn from(wire: AckWire) -> Self {
        if wire.success {
            Self::Success {
                session: wire.session,
            }
        } else {
            Self::Failure {
                message: wire.message.unwrap_or_default(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of a frame.
///
/// Adjacently tagged: `{ "type": "Request", "data": { … } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Connection plumbing.
    System(SystemMessage),
    /// Client → Server session channel request.
    Request(ClientRequest),
    /// Server → Client acknowledgement of the request sent with `seq`.
    Ack { seq: u64, result: AckResult },
    /// Server → Client room broadcast.
    Event(ServerEvent),
}

/// The top-level frame. Every message on the wire is an `Envelope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number. Acks echo the request's `seq`.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
