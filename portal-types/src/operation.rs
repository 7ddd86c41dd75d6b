//! Operation kinds carried by a portal request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The lifecycle operation a portal call asks the target type to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Build a new instance, usually with default values.
    Create,
    /// Load an existing instance identified by criteria.
    Fetch,
    /// Persist a new instance.
    Insert,
    /// Persist changes to an existing instance.
    Update,
    /// Remove the instance that is being submitted.
    DeleteSelf,
    /// Remove an instance identified by criteria.
    Delete,
}

impl Operation {
    /// All operations, in declaration order.
    pub const ALL: [Operation; 6] = [
        Self::Create,
        Self::Fetch,
        Self::Insert,
        Self::Update,
        Self::DeleteSelf,
        Self::Delete,
    ];

    /// Returns the stable wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Fetch => "fetch",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::DeleteSelf => "delete_self",
            Self::Delete => "delete",
        }
    }

    /// Whether the payload of this operation is an entity rather than criteria.
    pub fn takes_entity(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::DeleteSelf)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownOperation(s.to_string()))
    }
}
