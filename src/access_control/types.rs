//! Access control types
//!
//! Core types used by the release-control resolver.

use crate::directory::{GroupId, PrincipalId};
use crate::taxonomy::ClassificationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An authenticated principal as handed over by the identity layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    /// Role names; the classification gate derives clearances from these
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Restriction dimension of a securable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Classification,
    EyesOnly,
    ReleasableTo,
}

impl Dimension {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dimension::Classification => "classification",
            Dimension::EyesOnly => "eyes_only",
            Dimension::ReleasableTo => "releasable_to",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an access check failed. Recorded for audit; end users only see "forbidden".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dimension", rename_all = "snake_case")]
pub enum DenyReason {
    /// The classification gate refused the object's classification
    Classification { classification: ClassificationId },
    /// Need-to-know compartments absent from the principal's closure
    EyesOnly { missing: BTreeSet<GroupId> },
    /// The principal belongs to none of the releasability compartments
    ReleasableTo { releasable_to: BTreeSet<GroupId> },
}

impl DenyReason {
    pub fn dimension(&self) -> Dimension {
        match self {
            DenyReason::Classification { .. } => Dimension::Classification,
            DenyReason::EyesOnly { .. } => Dimension::EyesOnly,
            DenyReason::ReleasableTo { .. } => Dimension::ReleasableTo,
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Classification { classification } => {
                write!(f, "classification: {} not cleared", classification)
            }
            DenyReason::EyesOnly { missing } => {
                write!(f, "eyes_only: missing {}", join_groups(missing))
            }
            DenyReason::ReleasableTo { releasable_to } => {
                write!(
                    f,
                    "releasable_to: member of none of {}",
                    join_groups(releasable_to)
                )
            }
        }
    }
}

fn join_groups(groups: &BTreeSet<GroupId>) -> String {
    let ids: Vec<String> = groups.iter().map(GroupId::to_string).collect();
    format!("[{}]", ids.join(", "))
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    /// Access is allowed
    Allow,
    /// Access is denied with a reason
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny(_))
    }

    /// The failing dimension, if denied
    pub fn denied_on(&self) -> Option<Dimension> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(reason.dimension()),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Deny(reason) => write!(f, "deny ({})", reason),
        }
    }
}
