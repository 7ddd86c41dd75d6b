//! Caller identity passed to authorization rules and across tiers.

use serde::{Deserialize, Serialize};

/// The identity a portal call runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub is_authenticated: bool,
}

impl Principal {
    /// An unauthenticated caller with no roles.
    pub fn anonymous() -> Self {
        Self {
            name: String::new(),
            roles: Vec::new(),
            is_authenticated: false,
        }
    }

    /// An authenticated caller with the given roles.
    pub fn authenticated(name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            roles,
            is_authenticated: true,
        }
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}
