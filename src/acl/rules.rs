//! ACL request and decision types

use std::fmt;

/// Kind of topic access requested by the broker
///
/// Read and write are currently authorized by the same rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => f.write_str("read"),
            AccessKind::Write => f.write_str("write"),
        }
    }
}

/// ACL evaluation request
#[derive(Debug, Clone, Copy)]
pub struct AclRequest<'a> {
    /// Client ID from CONNECT
    pub client_id: Option<&'a str>,
    /// Authenticated username
    pub username: Option<&'a str>,
    /// Topic being accessed
    pub topic: &'a str,
    /// Read or write
    pub access: AccessKind,
}

/// Result of ACL evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclDecision {
    /// Whether access is allowed
    pub allowed: bool,
    /// Reason for the decision
    pub reason: &'static str,
}

impl AclDecision {
    pub fn allow(reason: &'static str) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    pub fn deny(reason: &'static str) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Whether `topic` lies inside `username`'s namespace (`username/...`).
///
/// The topic needs at least one character after the separator, so neither
/// `username` nor `username/` qualify.
pub fn in_namespace(username: &str, topic: &str) -> bool {
    topic
        .strip_prefix(username)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_namespace() {
        assert!(in_namespace("lamp", "lamp/x"));
        assert!(in_namespace("lamp", "lamp/status/power"));
        assert!(in_namespace("lamp", "lamp//"));

        assert!(!in_namespace("lamp", "lamp"));
        assert!(!in_namespace("lamp", "lamp/"));
        assert!(!in_namespace("lamp", "lampx/y"));
        assert!(!in_namespace("lamp", "lam/p"));
        assert!(!in_namespace("lamp", "other/lamp/x"));
        assert!(!in_namespace("lamp", ""));
    }

    #[test]
    fn test_namespace_is_case_sensitive() {
        assert!(!in_namespace("lamp", "Lamp/x"));
    }

    #[test]
    fn test_access_kind_display() {
        assert_eq!(AccessKind::Read.to_string(), "read");
        assert_eq!(AccessKind::Write.to_string(), "write");
    }
}
