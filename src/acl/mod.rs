//! Access Control List (ACL) module
//!
//! Provides topic namespace access control for MQTT operations.

mod evaluator;
mod rules;

pub use evaluator::AclEngine;
pub use rules::{in_namespace, AccessKind, AclDecision, AclRequest};
