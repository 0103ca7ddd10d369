//! Broker-facing plugin interface
//!
//! `AuthPlugin` implements the callback contract a Mosquitto auth plugin must
//! honor and tracks the plugin lifecycle. The C exports in [`crate::ffi`] are a
//! thin layer over it.

use crate::acl::{AccessKind, AclDecision, AclRequest};
use crate::auth::AuthResult;
use crate::config::AuthConfig;
use crate::context::Context;
use crate::error::{AuthError, Result};
use tracing::{debug, error};

/// Auth plugin API version implemented by this crate
pub const PLUGIN_API_VERSION: i32 = 2;

/// Plugin return codes for lifecycle callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    FailedSqlite = 1,
    NoDbFileSpecified = 2,
    DbFileCantOpen = 3,
    DbFileCantClose = 4,
    DbError = 5,
    /// The callback is not implemented by this plugin
    NotRequired = 102,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Plugin lifecycle
///
/// ```text
/// Uninitialized -> Initializing -> Ready -> ShuttingDown -> Closed
///                       |                                    ^
///                       +------------- (init failed) --------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
    Closed,
}

/// Authorization plugin instance
///
/// Checks take `&self` and may run concurrently; `init` and `cleanup` take
/// `&mut self` and are called once each by the broker.
pub struct AuthPlugin {
    state: Lifecycle,
    context: Option<Context>,
}

impl AuthPlugin {
    pub fn new() -> Self {
        Self {
            state: Lifecycle::Uninitialized,
            context: None,
        }
    }

    pub fn version() -> i32 {
        PLUGIN_API_VERSION
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// The live context, if the plugin is ready
    pub fn context(&self) -> Option<&Context> {
        self.ready().ok()
    }

    /// Parse the broker options and bring up the context.
    pub fn init<I, K, V>(&mut self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if self.state != Lifecycle::Uninitialized {
            return Err(AuthError::NotReady(self.state));
        }

        self.state = Lifecycle::Initializing;
        let result = AuthConfig::from_options(options).and_then(|config| Context::init(&config));

        match result {
            Ok(context) => {
                self.context = Some(context);
                self.state = Lifecycle::Ready;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Authorization plugin failed to initialize");
                self.state = Lifecycle::Closed;
                Err(e)
            }
        }
    }

    /// Release the context. Always ends in `Closed`, even if closing failed.
    pub fn cleanup(&mut self) -> Result<()> {
        let result = match self.context.take() {
            Some(context) => {
                self.state = Lifecycle::ShuttingDown;
                context.teardown()
            }
            None => Ok(()),
        };
        self.state = Lifecycle::Closed;
        result
    }

    /// Called on startup and on every configuration reload. Does nothing.
    pub fn security_init(&self, reload: bool) -> Result<()> {
        debug!(reload, "Security init");
        Ok(())
    }

    /// Called on shutdown and on every configuration reload. Does nothing.
    pub fn security_cleanup(&self, reload: bool) -> Result<()> {
        debug!(reload, "Security cleanup");
        Ok(())
    }

    /// Decide whether a client may read or write a topic.
    pub fn acl_check(
        &self,
        client_id: Option<&str>,
        username: Option<&str>,
        topic: Option<&str>,
        access: AccessKind,
    ) -> Result<AclDecision> {
        let context = self.ready()?;

        let Some(topic) = topic else {
            debug!(client_id = ?client_id, "ACL check without topic");
            return Ok(AclDecision::deny("Missing topic"));
        };

        Ok(context.check_acl(&AclRequest {
            client_id,
            username,
            topic,
            access,
        }))
    }

    /// Decide whether a username/password pair is accepted.
    pub fn unpwd_check(&self, username: Option<&str>, password: Option<&[u8]>) -> Result<AuthResult> {
        let context = self.ready()?;

        match username {
            Some(username) => context.check_password(username, password),
            None => Ok(AuthResult::failure("", false, "No username provided")),
        }
    }

    /// Pre-shared keys are not supported.
    pub fn psk_key_get(&self, _hint: &str, _identity: &str) -> Status {
        Status::NotRequired
    }

    fn ready(&self) -> Result<&Context> {
        match (&self.context, self.state) {
            (Some(context), Lifecycle::Ready) => Ok(context),
            _ => Err(AuthError::NotReady(self.state)),
        }
    }
}

impl Default for AuthPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ready_plugin(dir: &TempDir) -> AuthPlugin {
        let db = dir.path().join("auth.db");
        let mut plugin = AuthPlugin::new();
        plugin
            .init([
                ("db_file", db.to_str().unwrap()),
                ("superuser", "devmaster"),
            ])
            .unwrap();
        plugin
    }

    #[test]
    fn test_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut plugin = AuthPlugin::new();
        assert_eq!(plugin.state(), Lifecycle::Uninitialized);
        assert!(plugin.context().is_none());

        plugin
            .init([("db_file", dir.path().join("auth.db").to_str().unwrap())])
            .unwrap();
        assert_eq!(plugin.state(), Lifecycle::Ready);
        assert!(plugin.context().is_some());

        plugin.cleanup().unwrap();
        assert_eq!(plugin.state(), Lifecycle::Closed);
        assert!(plugin.context().is_none());
    }

    #[test]
    fn test_init_failure_goes_to_closed() {
        let mut plugin = AuthPlugin::new();
        let err = plugin.init([("superuser", "devmaster")]).unwrap_err();
        assert_eq!(err.status(), Status::NoDbFileSpecified);
        assert_eq!(plugin.state(), Lifecycle::Closed);

        assert!(matches!(
            plugin.unpwd_check(Some("x"), None),
            Err(AuthError::NotReady(Lifecycle::Closed))
        ));
    }

    #[test]
    fn test_init_failure_on_incompatible_auth_table() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("auth.db");
        rusqlite::Connection::open(&db)
            .unwrap()
            .execute_batch("CREATE TABLE auth (username text primary key)")
            .unwrap();

        let mut plugin = AuthPlugin::new();
        let err = plugin.init([("db_file", db.to_str().unwrap())]).unwrap_err();
        assert!(matches!(err, AuthError::StoreIo(_)));
        assert_eq!(plugin.state(), Lifecycle::Closed);
        assert!(plugin.context().is_none());
    }

    #[test]
    fn test_checks_before_init() {
        let plugin = AuthPlugin::new();
        assert!(matches!(
            plugin.acl_check(Some("a"), Some("a"), Some("a/b"), AccessKind::Read),
            Err(AuthError::NotReady(Lifecycle::Uninitialized))
        ));
    }

    #[test]
    fn test_double_init_rejected() {
        let dir = TempDir::new().unwrap();
        let mut plugin = ready_plugin(&dir);
        assert!(plugin
            .init([("db_file", dir.path().join("other.db").to_str().unwrap())])
            .is_err());
        assert_eq!(plugin.state(), Lifecycle::Ready);
    }

    #[test]
    fn test_reload_hooks_are_noops() {
        let dir = TempDir::new().unwrap();
        let plugin = ready_plugin(&dir);
        assert!(plugin.security_init(false).is_ok());
        assert!(plugin.security_init(true).is_ok());
        assert!(plugin.security_cleanup(true).is_ok());
        assert!(plugin.security_cleanup(false).is_ok());
        assert_eq!(plugin.state(), Lifecycle::Ready);
    }

    #[test]
    fn test_checks() {
        let dir = TempDir::new().unwrap();
        let plugin = ready_plugin(&dir);

        assert!(plugin.unpwd_check(Some("guest"), None).unwrap().authenticated);
        assert!(!plugin.unpwd_check(None, None).unwrap().authenticated);

        assert!(plugin
            .acl_check(Some("lamp"), Some("lamp"), Some("lamp/on"), AccessKind::Write)
            .unwrap()
            .allowed);
        assert!(!plugin
            .acl_check(Some("lamp"), Some("lamp"), None, AccessKind::Read)
            .unwrap()
            .allowed);
        assert!(plugin
            .acl_check(Some("x"), Some("devmaster"), Some("any/topic"), AccessKind::Write)
            .unwrap()
            .allowed);
    }

    #[test]
    fn test_psk_not_supported() {
        let plugin = AuthPlugin::new();
        assert_eq!(plugin.psk_key_get("hint", "id"), Status::NotRequired);
        assert_eq!(Status::NotRequired.code(), 102);
    }

    #[test]
    fn test_cleanup_without_init() {
        let mut plugin = AuthPlugin::new();
        assert!(plugin.cleanup().is_ok());
        assert_eq!(plugin.state(), Lifecycle::Closed);
    }
}
