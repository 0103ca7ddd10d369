//! Credential lookups against the `auth` table

use crate::auth::password::{generate_salt, hash_password, matches_stored, StoredCredential};
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

/// The one query on the authentication path.
pub const LOOKUP_QUERY: &str = "SELECT hash, salt FROM auth WHERE username = ?1";

const SUPERUSER_DISPLAYNAME: &str = "devmaster";
const SUPERUSER_TYPE: &str = "master";

/// SQLite-backed credential store
///
/// All callers share one connection behind a mutex. The lookup query is
/// compiled once into the connection's statement cache; rusqlite resets a
/// cached statement when it goes back into the cache, whether the step
/// succeeded or not.
pub struct CredentialStore {
    conn: Mutex<Connection>,
}

impl CredentialStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Compile the lookup query ahead of the first request
    pub fn prepare_lookup(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(LOOKUP_QUERY)?;
        Ok(())
    }

    /// Fetch the stored hash and salt for a username.
    ///
    /// `Ok(None)` means the user is not registered.
    pub fn lookup(&self, username: &str) -> Result<Option<StoredCredential>> {
        let conn = self.conn.lock();
        lookup_on(&conn, username)
    }

    /// Store a new salt and hash for an existing profile.
    pub fn set_credential(&self, username: &str, password: &str) -> Result<()> {
        let conn = self.conn.lock();
        set_credential_on(&conn, username, password)
    }

    /// Add (or update) the superuser's profile and credentials.
    ///
    /// The credential is only rewritten when it is missing or does not match
    /// `password`. Returns `true` if anything was written to `auth`. Runs as
    /// one transaction under a single lock.
    pub fn ensure_superuser(&self, username: &str, password: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO profile (username, displayname, type, connected, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, SUPERUSER_DISPLAYNAME, SUPERUSER_TYPE, "1", ""],
        )?;

        let current = lookup_on(&tx, username)?
            .is_some_and(|stored| matches_stored(&stored, password.as_bytes()));
        if !current {
            set_credential_on(&tx, username, password)?;
        }
        tx.commit()?;

        if !current {
            info!(username = %username, "Superuser credentials updated");
        }
        Ok(!current)
    }

    /// Run a closure against the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Finalize cached statements and close the connection.
    pub(crate) fn close(self) -> Result<()> {
        super::close_connection(self.conn.into_inner())
    }
}

fn lookup_on(conn: &Connection, username: &str) -> Result<Option<StoredCredential>> {
    let mut stmt = conn.prepare_cached(LOOKUP_QUERY)?;
    let stored = stmt
        .query_row([username], |row| {
            Ok(StoredCredential {
                hash: row.get(0)?,
                salt: row.get(1)?,
            })
        })
        .optional()?;
    Ok(stored)
}

fn set_credential_on(conn: &Connection, username: &str, password: &str) -> Result<()> {
    let salt = generate_salt();
    let hash = hash_password(password.as_bytes(), &salt);

    conn.execute(
        "INSERT INTO auth (username, hash, salt) VALUES (?1, ?2, ?3)
         ON CONFLICT(username) DO UPDATE SET hash = excluded.hash, salt = excluded.salt",
        params![username, hash, salt],
    )?;

    debug!(username = %username, "Credential stored");
    Ok(())
}
