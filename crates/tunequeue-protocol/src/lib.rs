//! Wire protocol for Tunequeue.
//!
//! This crate defines what travels over the `/session` channel:
//!
//! - **Types** ([`Envelope`], [`ClientRequest`], [`ServerEvent`],
//!   [`AckResult`], [`Session`], identities): the frame structures.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Dispatcher → Presence
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AckResult, ClientRequest, Envelope, Payload, ServerEvent, Session, SessionCode, SessionId,
    SessionStatus, SystemMessage, UserId,
};
