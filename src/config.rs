//! Plugin configuration
//!
//! The broker passes options as a flat list of key/value pairs
//! (`auth_opt_<key> <value>` lines in `mosquitto.conf`). Only three keys are
//! recognized; anything else is ignored.

use crate::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Option key for the SQLite database path (required).
pub const OPT_DB_FILE: &str = "db_file";

/// Option key for the superuser name (optional).
pub const OPT_SUPERUSER: &str = "superuser";

/// Option key for the guest secret (optional).
pub const OPT_GUEST_SECRET: &str = "guest_secret";

/// Authorization plugin configuration
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    /// SQLite database holding the profile, auth and schedule tables
    pub db_file: PathBuf,

    /// User with read and write access to every topic
    #[serde(default)]
    pub superuser: Option<String>,

    /// Password that unregistered clients must present
    #[serde(default)]
    pub guest_secret: Option<String>,
}

impl AuthConfig {
    /// Create a configuration with only the database path set
    pub fn new(db_file: impl Into<PathBuf>) -> Self {
        Self {
            db_file: db_file.into(),
            superuser: None,
            guest_secret: None,
        }
    }

    pub fn with_superuser(mut self, superuser: impl Into<String>) -> Self {
        self.superuser = Some(superuser.into());
        self
    }

    pub fn with_guest_secret(mut self, secret: impl Into<String>) -> Self {
        self.guest_secret = Some(secret.into());
        self
    }

    /// Build a configuration from the broker's option list.
    ///
    /// Later occurrences of a key override earlier ones. Fails with
    /// [`AuthError::Config`] when `db_file` is absent.
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut db_file = None;
        let mut superuser = None;
        let mut guest_secret = None;

        for (key, value) in options {
            let value = value.as_ref();
            match key.as_ref() {
                OPT_DB_FILE => db_file = Some(PathBuf::from(value)),
                OPT_SUPERUSER => superuser = Some(value.to_string()),
                OPT_GUEST_SECRET => guest_secret = Some(value.to_string()),
                other => debug!(key = %other, "Ignoring unrecognized option"),
            }
        }

        let db_file = db_file.ok_or_else(|| {
            AuthError::Config(format!(
                "no SQLite database specified; the broker configuration should \
                 include an auth_opt_{} entry",
                OPT_DB_FILE
            ))
        })?;

        Ok(Self {
            db_file,
            superuser,
            guest_secret,
        })
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("db_file", &self.db_file)
            .field("superuser", &self.superuser)
            .field(
                "guest_secret",
                &self.guest_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
