//! Salted SHA-256 password verification

use base64::{engine::general_purpose::STANDARD_NO_PAD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of a hex-encoded SHA-256 digest, as stored in `auth.hash`.
pub const DIGEST_HEX_LEN: usize = 64;

/// Random bytes per generated salt (before base64 encoding).
const SALT_BYTES: usize = 32;

/// Hash and salt read from the `auth` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Lowercase hex SHA-256 of `salt ++ password`
    pub hash: String,
    /// Opaque salt string
    pub salt: String,
}

/// Hex-encoded SHA-256 of the salt followed by the password.
///
/// The salt must come first: existing databases were filled that way.
pub fn hash_password(password: &[u8], salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password);
    hex::encode(hasher.finalize())
}

/// Generate a new random salt.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Check a password against a stored credential.
pub fn matches_stored(stored: &StoredCredential, password: &[u8]) -> bool {
    let digest = hash_password(password, &stored.salt);
    debug_assert_eq!(digest.len(), DIGEST_HEX_LEN);
    secure_eq(digest.as_bytes(), stored.hash.as_bytes())
}

/// Decide whether a password is acceptable.
///
/// For an unregistered user (`stored` is `None`) the guest rule applies:
/// with no guest secret configured the client must not send a password,
/// otherwise it must send exactly the guest secret. A stored row always
/// counts as registered, even with an empty hash.
pub fn verify(
    stored: Option<&StoredCredential>,
    password: Option<&[u8]>,
    guest_secret: Option<&[u8]>,
) -> bool {
    match (stored, password) {
        (Some(stored), Some(password)) => matches_stored(stored, password),
        (Some(_), None) => false,
        (None, password) => match (guest_secret, password) {
            (None, None) => true,
            (Some(secret), Some(password)) => secure_eq(secret, password),
            _ => false,
        },
    }
}

fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
