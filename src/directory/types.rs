//! Group and membership records

use crate::hierarchy::TreeNode;
use crate::util::numeric_id;
use serde::{Deserialize, Serialize};
use std::fmt;

numeric_id!(
    /// Identifier of a group (compartment)
    GroupId
);

/// Identity of an authenticated user or service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PrincipalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An organizational / releasability compartment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent: Option<GroupId>,
    #[serde(default)]
    pub is_default: bool,
    /// Left out of user-facing pickers, still enforced
    #[serde(default)]
    pub hidden: bool,
}

impl TreeNode for Group {
    type Id = GroupId;

    fn id(&self) -> GroupId {
        self.id
    }

    fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<GroupId>) {
        self.parent = parent;
    }
}

/// Direct membership of a principal in a group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Member {
    pub group: GroupId,
    pub principal: PrincipalId,
}

/// Fields for a new group; the directory assigns the id
#[derive(Debug, Clone, Default)]
pub struct GroupDraft {
    pub name: String,
    pub description: String,
    pub parent: Option<GroupId>,
    pub is_default: bool,
    pub hidden: bool,
}

impl GroupDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn under(mut self, parent: GroupId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn default_group(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Group field edits. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hidden: Option<bool>,
}

impl GroupPatch {
    pub(crate) fn apply(self, target: &mut Group) {
        if let Some(name) = self.name {
            target.name = name;
        }
        if let Some(description) = self.description {
            target.description = description;
        }
        if let Some(hidden) = self.hidden {
            target.hidden = hidden;
        }
    }
}
