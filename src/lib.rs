//! AutoHome authorization plugin for Mosquitto
//!
//! Grants or denies MQTT clients access to the AutoHome broker:
//!
//! - **Authentication**: usernames are checked against salted SHA-256 hashes
//!   stored in SQLite. Unregistered clients are guests and must present the
//!   configured guest secret, or no password when none is configured.
//! - **Access Control**: every user may read and write `username/#`, provided
//!   its client ID equals its username. One optional superuser may use any
//!   topic.
//! - **Schema**: on startup the `profile`, `auth` and `schedule` tables are
//!   created if they are missing.
//!
//! # Architecture
//!
//! The broker loads the crate as a shared library and calls the C exports in
//! [`ffi`], which forward to one [`AuthPlugin`]. The plugin owns a [`Context`]
//! between `init` and `cleanup`.
//!
//! # Example Configuration
//!
//! ```text
//! auth_plugin /usr/lib/libautohome_auth.so
//! auth_opt_db_file /var/lib/autohome/autohome.db
//! auth_opt_superuser devmaster
//! auth_opt_guest_secret letmein
//! ```

pub mod acl;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod ffi;
pub mod plugin;
pub mod store;

// Re-export main types
pub use config::AuthConfig;
pub use context::Context;
pub use error::{AuthError, Result};
pub use plugin::{AuthPlugin, Lifecycle, Status};
