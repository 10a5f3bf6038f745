//! Authenticated actor passed into every core operation.

use serde::{Deserialize, Serialize};

/// Role name that lifts branch scoping.
pub const ADMIN_ROLE: &str = "admin";

/// The user performing an operation, as resolved by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    /// User identifier
    pub user_id: String,
    /// Display name, recorded on audit rows
    pub name: String,
    /// Branch the user is working from
    pub branch_id: String,
    /// Role names (case-insensitive)
    pub roles: Vec<String>,
}

impl Actor {
    /// Create an actor without roles.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, branch_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            branch_id: branch_id.into(),
            roles: Vec::new(),
        }
    }

    /// Builder-style role grant.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Check whether the actor holds a role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// An actor is usable only when both user and branch are known.
    pub fn is_identified(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.branch_id.trim().is_empty()
    }
}
