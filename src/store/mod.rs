//! SQLite credential store
//!
//! Opens the shared AutoHome database, migrates its schema and answers
//! credential lookups.

mod credentials;
pub mod schema;

pub use credentials::{CredentialStore, LOOKUP_QUERY};
pub use schema::{ensure_table, initialize_schema, SchemaOutcome, TableDef, TableStatus};

use crate::error::{AuthError, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Open (or create) the database file.
pub fn open(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )
    .map_err(|source| AuthError::StoreOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Finalize every cached statement, then close the connection.
pub(crate) fn close_connection(conn: Connection) -> Result<()> {
    conn.flush_prepared_statement_cache();
    conn.close().map_err(|(_, e)| AuthError::StoreClose(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.db");

        let conn = open(&path).unwrap();
        assert!(path.exists());
        close_connection(conn).unwrap();
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("auth.db");

        match open(&path) {
            Err(AuthError::StoreOpen { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected open error, got {:?}", other.map(|_| ())),
        }
    }
}
