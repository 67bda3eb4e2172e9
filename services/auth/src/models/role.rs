//! Authorization roles
//!
//! Roles are read-only tags attached to a user id in the `user_roles`
//! mapping; there is no self-service assignment surface. `admin` is the only
//! role currently defined.

use serde::{Deserialize, Serialize};

/// Enumerated authorization role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
}

impl Role {
    /// The tag as stored in the `user_roles.role` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
        }
    }

    /// Parse a stored tag; unknown tags yield `None`
    pub fn parse(tag: &str) -> Option<Role> {
        match tag {
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
