//! Request types for the release-control facade

use crate::directory::GroupId;
use crate::taxonomy::ClassificationId;
use std::collections::BTreeSet;

/// Restrictions requested for a new top-level object.
///
/// Unset fields fall back to the system defaults: the default
/// classification, and releasability to the default group. Creation fails
/// with `NoDefault` when the needed default does not exist. An explicitly
/// empty `releasable_to` means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Restrictions {
    pub classification: Option<ClassificationId>,
    pub eyes_only: BTreeSet<GroupId>,
    pub releasable_to: Option<BTreeSet<GroupId>>,
}

impl Restrictions {
    pub fn classified(classification: ClassificationId) -> Self {
        Self {
            classification: Some(classification),
            ..Default::default()
        }
    }

    pub fn eyes_only(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.eyes_only = groups.into_iter().collect();
        self
    }

    pub fn releasable_to(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.releasable_to = Some(groups.into_iter().collect());
        self
    }

    /// Releasable to everyone, overriding the default group
    pub fn unrestricted(mut self) -> Self {
        self.releasable_to = Some(BTreeSet::new());
        self
    }
}
