//! Error types for the authorization plugin
//!
//! Denials are not errors: a rejected password or topic is returned as an
//! [`AuthResult`](crate::auth::AuthResult) or [`AclDecision`](crate::acl::AclDecision).
//! An `AuthError` on a check means the outcome is indeterminate.

use crate::plugin::{Lifecycle, Status};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors raised while configuring, opening or querying the credential store.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required option is missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database file could not be opened.
    #[error("Failed to open database {}: {source}", path.display())]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Prepare, step, reset or finalize failed.
    #[error("Database error: {0}")]
    StoreIo(#[from] rusqlite::Error),

    /// A table could not be created.
    #[error("Failed to create table '{table}': {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The database could not be closed cleanly.
    #[error("Failed to close database: {0}")]
    StoreClose(#[source] rusqlite::Error),

    /// A check arrived while the plugin was not ready to serve it.
    #[error("Plugin is not ready (state: {0:?})")]
    NotReady(Lifecycle),
}

impl AuthError {
    /// Status code reported to the host for this error.
    pub fn status(&self) -> Status {
        match self {
            AuthError::Config(_) => Status::NoDbFileSpecified,
            AuthError::StoreOpen { .. } => Status::DbFileCantOpen,
            AuthError::StoreIo(_) | AuthError::Schema { .. } | AuthError::NotReady(_) => {
                Status::DbError
            }
            AuthError::StoreClose(_) => Status::DbFileCantClose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthError::Config("db_file".to_string()).status(),
            Status::NoDbFileSpecified
        );
        assert_eq!(
            AuthError::StoreIo(rusqlite::Error::QueryReturnedNoRows).status(),
            Status::DbError
        );
        assert_eq!(
            AuthError::StoreClose(rusqlite::Error::InvalidQuery).status(),
            Status::DbFileCantClose
        );
        assert_eq!(
            AuthError::NotReady(Lifecycle::Closed).status(),
            Status::DbError
        );
    }

    #[test]
    fn test_schema_error_names_table() {
        let err = AuthError::Schema {
            table: "auth",
            source: rusqlite::Error::InvalidQuery,
        };
        assert!(err.to_string().contains("'auth'"));
    }
}
