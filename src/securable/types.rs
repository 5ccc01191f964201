//! Securable object types
//!
//! Core types shared by every protected entity.

use crate::directory::GroupId;
use crate::taxonomy::ClassificationId;
use crate::util::numeric_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

numeric_id!(
    /// Identifier of a securable object. Documents, files and top-level
    /// objects share one id space.
    ObjectId
);

/// Kind of securable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Document,
    File,
    IncomingFeed,
    Collector,
    Scraper,
    Submission,
}

impl ObjectKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Document => "document",
            ObjectKind::File => "file",
            ObjectKind::IncomingFeed => "incoming_feed",
            ObjectKind::Collector => "collector",
            ObjectKind::Scraper => "scraper",
            ObjectKind::Submission => "submission",
        }
    }

    /// Try to parse a kind from a string
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(ObjectKind::Document),
            "file" => Some(ObjectKind::File),
            "incoming_feed" | "feed" => Some(ObjectKind::IncomingFeed),
            "collector" => Some(ObjectKind::Collector),
            "scraper" => Some(ObjectKind::Scraper),
            "submission" => Some(ObjectKind::Submission),
            _ => None,
        }
    }

    /// Get all kinds
    pub fn all() -> &'static [ObjectKind] {
        &[
            ObjectKind::Document,
            ObjectKind::File,
            ObjectKind::IncomingFeed,
            ObjectKind::Collector,
            ObjectKind::Scraper,
            ObjectKind::Submission,
        ]
    }

    /// Whether objects of this kind nest under a parent securable object
    pub const fn is_nested(&self) -> bool {
        matches!(self, ObjectKind::File)
    }

    /// Whether objects of this kind are stored as a generic top-level object
    pub const fn is_generic(&self) -> bool {
        !matches!(self, ObjectKind::Document | ObjectKind::File)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored restriction attributes of a securable object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAttributes {
    /// Never `None` on a top-level object; may be `None` on an inheriting file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationId>,
    /// Need-to-know: every listed group is required. Empty = no restriction.
    #[serde(default)]
    pub eyes_only: BTreeSet<GroupId>,
    /// Releasability: any one listed group suffices. Empty = unrestricted.
    #[serde(default)]
    pub releasable_to: BTreeSet<GroupId>,
}

impl SecurityAttributes {
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
        self.releasable_to = groups.into_iter().collect();
        self
    }

    /// Every group referenced by either compartment set
    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.eyes_only.iter().chain(self.releasable_to.iter())
    }
}

/// Per-dimension override flags of a nested object. A `false` flag means
/// the dimension is inherited from the parent at evaluation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub classification: bool,
    pub eyes_only: bool,
    pub releasable_to: bool,
}

impl Overrides {
    /// Inherit every dimension
    pub const INHERIT: Overrides = Overrides {
        classification: false,
        eyes_only: false,
        releasable_to: false,
    };

    /// Supply every dimension locally
    pub const ALL: Overrides = Overrides {
        classification: true,
        eyes_only: true,
        releasable_to: true,
    };

    pub const fn any(&self) -> bool {
        self.classification || self.eyes_only || self.releasable_to
    }

    pub const fn all(&self) -> bool {
        self.classification && self.eyes_only && self.releasable_to
    }
}

/// Restriction attributes after inheritance resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAttributes {
    pub classification_id: ClassificationId,
    pub eyes_only: BTreeSet<GroupId>,
    pub releasable_to: BTreeSet<GroupId>,
}

/// Anything carrying classification and compartment restrictions
pub trait Securable {
    fn object_id(&self) -> ObjectId;

    fn kind(&self) -> ObjectKind;

    /// Stored (raw, not effective) attributes
    fn attributes(&self) -> &SecurityAttributes;

    /// Override flags, present only on objects that nest under a parent
    fn overrides(&self) -> Option<&Overrides> {
        None
    }

    /// Human-readable label for logs and errors
    fn label(&self) -> String {
        format!("{} {}", self.kind(), self.object_id())
    }
}
