//! # Tunequeue
//!
//! Real-time session presence for a collaborative music queue.
//!
//! Hosts create listening sessions; participants join with a short code.
//! This crate runs the WebSocket side of that: it authenticates each
//! connection on the `/session` namespace, routes `join_session` and
//! `leave_session` requests to the presence layer, and tells everybody in
//! a session when someone joins or leaves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tunequeue::prelude::*;
//!
//! # async fn run() -> Result<(), TunequeueError> {
//! let directory = InMemoryUserDirectory::with_users([UserIdentity::new("u1")]);
//! let auth = JwtAuthenticator::new(JwtConfig::new("change-me"), directory);
//!
//! let server = TunequeueServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(auth, Arc::new(InMemorySessionStore::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatcher;
mod error;
mod server;

pub use config::{ServerConfig, SESSION_NAMESPACE};
pub use error::TunequeueError;
pub use server::{TunequeueServer, TunequeueServerBuilder, PROTOCOL_VERSION};

/// Re-exports of the types needed to run and talk to a server.
pub mod prelude {
    pub use crate::{
        ServerConfig, TunequeueError, TunequeueServer, TunequeueServerBuilder, PROTOCOL_VERSION,
        SESSION_NAMESPACE,
    };
    pub use tunequeue_auth::{
        AuthError, Authenticator, InMemoryUserDirectory, JwtAuthenticator, JwtConfig,
        UserDirectory, UserIdentity,
    };
    pub use tunequeue_presence::{PresenceError, PresenceManager};
    pub use tunequeue_protocol::{
        AckResult, ClientRequest, Codec, Envelope, JsonCodec, Payload, ServerEvent, Session,
        SessionCode, SessionId, SessionStatus, SystemMessage, UserId,
    };
    pub use tunequeue_store::{InMemorySessionStore, SessionLookup, SessionStore, StoreError};
}
