//! Boolean conditions over a user's permissions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate over a set of permissions.
///
/// Renders as an expression such as `(admin && (read || write))` for error
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermCondition {
    /// The permission is held.
    Contains(String),
    /// Every nested condition holds. Empty is always satisfied.
    All(Vec<PermCondition>),
    /// At least one nested condition holds. Empty is never satisfied.
    Any(Vec<PermCondition>),
}

impl PermCondition {
    pub fn contains(perm: impl Into<String>) -> Self {
        Self::Contains(perm.into())
    }

    pub fn all(conditions: impl IntoIterator<Item = PermCondition>) -> Self {
        Self::All(conditions.into_iter().collect())
    }

    pub fn any(conditions: impl IntoIterator<Item = PermCondition>) -> Self {
        Self::Any(conditions.into_iter().collect())
    }

    pub fn is_satisfied_by(&self, perms: &[String]) -> bool {
        match self {
            Self::Contains(perm) => perms.iter().any(|p| p == perm),
            Self::All(conditions) => conditions.iter().all(|c| c.is_satisfied_by(perms)),
            Self::Any(conditions) => conditions.iter().any(|c| c.is_satisfied_by(perms)),
        }
    }
}

impl fmt::Display for PermCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (conditions, op) = match self {
            Self::Contains(perm) => return f.write_str(perm),
            Self::All(conditions) => (conditions, " && "),
            Self::Any(conditions) => (conditions, " || "),
        };
        f.write_str("(")?;
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(op)?;
            }
            write!(f, "{}", condition)?;
        }
        f.write_str(")")
    }
}
