//! Topic namespace ACL evaluation

use tracing::{debug, info};

use super::rules::{in_namespace, AclDecision, AclRequest};

/// ACL engine - decides topic access for MQTT operations
///
/// Every user may read and write `username/#`. The client ID must equal the
/// username so that a device cannot borrow another device's namespace. One
/// optional superuser may use any topic.
///
/// The engine holds no mutable state and can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct AclEngine {
    superuser: Option<String>,
}

impl AclEngine {
    pub fn new(superuser: Option<String>) -> Self {
        Self { superuser }
    }

    pub fn superuser(&self) -> Option<&str> {
        self.superuser.as_deref()
    }

    /// Evaluate an ACL request
    pub fn decide(&self, request: &AclRequest<'_>) -> AclDecision {
        let (client_id, username) = match (request.client_id, request.username) {
            (Some(client_id), Some(username)) if !client_id.is_empty() && !username.is_empty() => {
                (client_id, username)
            }
            _ => {
                info!(topic = %request.topic, "Bad username");
                return AclDecision::deny("Missing client id or username");
            }
        };

        if self.superuser.as_deref() == Some(username) {
            return AclDecision::allow("Superuser");
        }

        if client_id != username {
            info!(
                client_id = %client_id,
                username = %username,
                "Unauthorized access: client id does not match username"
            );
            return AclDecision::deny("Client id does not match username");
        }

        if in_namespace(username, request.topic) {
            AclDecision::allow("Own namespace")
        } else {
            debug!(
                username = %username,
                topic = %request.topic,
                access = %request.access,
                "Topic outside user namespace"
            );
            AclDecision::deny("Topic outside user namespace")
        }
    }
}
