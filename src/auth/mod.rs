//! Authentication module
//!
//! Decides whether a username/password pair is accepted. Registered users are
//! checked against their salted hash; unregistered users are treated as
//! guests.

pub mod password;

pub use password::{hash_password, verify, StoredCredential, DIGEST_HEX_LEN};

use tracing::debug;

/// Result of authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// Whether authentication succeeded
    pub authenticated: bool,
    /// Username presented by the client
    pub username: String,
    /// Whether the username has no stored credential
    pub guest: bool,
    /// Reason for failure (if not authenticated)
    pub reason: Option<&'static str>,
}

impl AuthResult {
    pub fn success(username: &str, guest: bool) -> Self {
        Self {
            authenticated: true,
            username: username.to_string(),
            guest,
            reason: None,
        }
    }

    pub fn failure(username: &str, guest: bool, reason: &'static str) -> Self {
        Self {
            authenticated: false,
            username: username.to_string(),
            guest,
            reason: Some(reason),
        }
    }
}

/// Authenticate a client given the credential stored for its username.
pub fn authenticate(
    username: &str,
    stored: Option<&StoredCredential>,
    password: Option<&[u8]>,
    guest_secret: Option<&[u8]>,
) -> AuthResult {
    let guest = stored.is_none();

    if verify(stored, password, guest_secret) {
        debug!(username = %username, guest, "Authentication successful");
        return AuthResult::success(username, guest);
    }

    let reason = match (guest, guest_secret.is_some(), password.is_some()) {
        (false, _, false) => "No password provided",
        (false, _, true) => "Invalid password",
        (true, false, _) => "Guests must not send a password",
        (true, true, _) => "Invalid guest secret",
    };

    debug!(username = %username, guest, reason, "Authentication failed");
    AuthResult::failure(username, guest, reason)
}
