//! Connection authentication for Tunequeue.
//!
//! Every connection to the session channel presents a bearer credential.
//! This crate turns that credential into a [`UserIdentity`] or refuses it:
//!
//! 1. **Verification**: [`JwtAuthenticator`] checks the token's signature,
//!    expiry, and issuer.
//! 2. **Resolution**: the token's subject is looked up in a
//!    [`UserDirectory`]; a token for a user that no longer exists is
//!    refused.
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher  ← calls Authenticator once per connection, before any room logic
//!     ↕
//! Auth (this crate)
//!     ↕
//! Protocol    ← provides UserId
//! ```

mod authenticator;
mod directory;
mod error;
mod jwt;

pub use authenticator::{Authenticator, UserIdentity};
pub use directory::{InMemoryUserDirectory, UserDirectory};
pub use error::AuthError;
pub use jwt::{JwtAuthenticator, JwtConfig};
