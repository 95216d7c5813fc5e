//! Random identifiers for new sessions.

use rand::Rng;
use tunequeue_protocol::{SessionCode, SessionId};

/// Length of a generated join code.
pub const SESSION_CODE_LEN: usize = 6;

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates a short join code: [`SESSION_CODE_LEN`] base-36 characters,
/// upper-case so it reads the same way people type it back.
pub fn generate_session_code() -> SessionCode {
    let mut rng = rand::rng();
    let code: String = (0..SESSION_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    SessionCode::from(code)
}

/// Generates a session id: 12 random bytes as 24 lowercase hex characters.
pub fn generate_session_id() -> SessionId {
    let bytes: [u8; 12] = rand::rng().random();
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}
