//! Engine context
//!
//! One `Context` exists per running plugin. It owns the database connection,
//! the compiled lookup query and the configured superuser and guest secret.

use crate::acl::{AclDecision, AclEngine, AclRequest};
use crate::auth::{self, AuthResult};
use crate::config::AuthConfig;
use crate::error::Result;
use crate::store::{self, CredentialStore, SchemaOutcome};
use tracing::{error, info, warn};

pub struct Context {
    store: CredentialStore,
    acl: AclEngine,
    guest_secret: Option<String>,
    schema: SchemaOutcome,
}

impl Context {
    /// Open the database, migrate its schema and compile the lookup query.
    ///
    /// On failure everything acquired so far is released before the error is
    /// returned.
    pub fn init(config: &AuthConfig) -> Result<Self> {
        let conn = store::open(&config.db_file).map_err(|e| {
            error!(path = %config.db_file.display(), error = %e, "Failed to open SQLite database");
            e
        })?;

        let schema = match store::initialize_schema(&conn) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Failed to create tables");
                release(store::close_connection(conn));
                return Err(e);
            }
        };

        let store = CredentialStore::new(conn);
        if let Err(e) = store.prepare_lookup() {
            error!(error = %e, "Failed to compile password prepared statement");
            release(store.close());
            return Err(e);
        }

        info!(
            path = %config.db_file.display(),
            superuser = ?config.superuser,
            guest_secret = config.guest_secret.is_some(),
            "AutoHome authorization plugin initialized"
        );

        Ok(Self {
            store,
            acl: AclEngine::new(config.superuser.clone()),
            guest_secret: config.guest_secret.clone(),
            schema,
        })
    }

    /// Finalize the lookup query and close the database.
    pub fn teardown(self) -> Result<()> {
        match self.store.close() {
            Ok(()) => {
                info!("AutoHome authorization plugin shut down");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to close SQLite database");
                Err(e)
            }
        }
    }

    /// Check a username/password pair.
    ///
    /// A database failure is returned as an error, never as a denial.
    pub fn check_password(&self, username: &str, password: Option<&[u8]>) -> Result<AuthResult> {
        let stored = self.store.lookup(username).map_err(|e| {
            warn!(username = %username, error = %e, "Internal SQLite error, authentication cancelled");
            e
        })?;

        Ok(auth::authenticate(
            username,
            stored.as_ref(),
            password,
            self.guest_secret.as_deref().map(str::as_bytes),
        ))
    }

    /// Check topic access.
    pub fn check_acl(&self, request: &AclRequest<'_>) -> AclDecision {
        self.acl.decide(request)
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn acl(&self) -> &AclEngine {
        &self.acl
    }

    /// What schema initialization found when the context was created
    pub fn schema_outcome(&self) -> &SchemaOutcome {
        &self.schema
    }
}

/// Cleanup after a failed init: report, but keep the original error.
fn release(result: Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to release database after init error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AccessKind;
    use crate::error::AuthError;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AuthConfig {
        AuthConfig::new(dir.path().join("auth.db"))
    }

    #[test]
    fn test_init_and_teardown() {
        let dir = TempDir::new().unwrap();
        let context = Context::init(&config(&dir)).unwrap();
        assert_eq!(context.schema_outcome(), &SchemaOutcome::Fresh);
        context.teardown().unwrap();

        let context = Context::init(&config(&dir)).unwrap();
        assert_eq!(context.schema_outcome(), &SchemaOutcome::Existing);
        context.teardown().unwrap();
    }

    #[test]
    fn test_init_open_failure() {
        let dir = TempDir::new().unwrap();
        let config = AuthConfig::new(dir.path().join("nope").join("auth.db"));
        assert!(matches!(
            Context::init(&config),
            Err(AuthError::StoreOpen { .. })
        ));
    }

    #[test]
    fn test_init_schema_failure_releases_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let err = Context::init(&AuthConfig::new(&path)).err().unwrap();
        assert!(matches!(
            err,
            AuthError::Schema { .. } | AuthError::StoreIo(_)
        ));

        // The connection was closed, so the file can be replaced and reopened.
        std::fs::remove_file(&path).unwrap();
        Context::init(&AuthConfig::new(&path))
            .unwrap()
            .teardown()
            .unwrap();
    }

    #[test]
    fn test_init_prepare_failure_releases_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE auth (username text primary key)")
            .unwrap();

        let err = Context::init(&AuthConfig::new(&path)).err().unwrap();
        assert!(matches!(err, AuthError::StoreIo(_)));
        assert_eq!(err.status(), crate::plugin::Status::DbError);

        std::fs::remove_file(&path).unwrap();
        Context::init(&AuthConfig::new(&path))
            .unwrap()
            .teardown()
            .unwrap();
    }

    #[test]
    fn test_guest_and_registered_passwords() {
        let dir = TempDir::new().unwrap();
        let context = Context::init(&config(&dir).with_guest_secret("letmein")).unwrap();
        context.store().ensure_superuser("root", "toor").unwrap();

        assert!(context.check_password("root", Some(b"toor")).unwrap().authenticated);
        assert!(!context.check_password("root", Some(b"letmein")).unwrap().authenticated);
        assert!(context.check_password("visitor", Some(b"letmein")).unwrap().authenticated);
        assert!(!context.check_password("visitor", None).unwrap().authenticated);
    }

    #[test]
    fn test_store_error_is_not_a_denial() {
        let dir = TempDir::new().unwrap();
        let context = Context::init(&config(&dir)).unwrap();
        context
            .store()
            .with_connection(|conn| conn.execute_batch("DROP TABLE auth"))
            .unwrap();

        assert!(matches!(
            context.check_password("anyone", None),
            Err(AuthError::StoreIo(_))
        ));
    }

    #[test]
    fn test_check_acl_uses_superuser() {
        let dir = TempDir::new().unwrap();
        let context = Context::init(&config(&dir).with_superuser("devmaster")).unwrap();
        assert_eq!(context.acl().superuser(), Some("devmaster"));

        let decision = context.check_acl(&AclRequest {
            client_id: Some("x"),
            username: Some("devmaster"),
            topic: "lamp/set",
            access: AccessKind::Write,
        });
        assert!(decision.allowed);
    }
}
