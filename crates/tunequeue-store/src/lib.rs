//! Session persistence for Tunequeue.
//!
//! The presence layer never reads a participant list, edits it, and writes
//! it back. It asks the store to add or remove one identity and gets the
//! resulting record in return. [`SessionStore`] is that contract;
//! [`InMemorySessionStore`] is the in-process implementation.

mod code;
mod error;
mod memory;
mod store;

pub use code::{generate_session_code, generate_session_id, SESSION_CODE_LEN};
pub use error::StoreError;
pub use memory::InMemorySessionStore;
pub use store::{SessionLookup, SessionStore};
