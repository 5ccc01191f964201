//! Classification records

use crate::hierarchy::TreeNode;
use crate::util::numeric_id;
use serde::{Deserialize, Serialize};

numeric_id!(
    /// Identifier of a classification label
    ClassificationId
);

/// A classification label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub id: ClassificationId,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub abbreviation: String,
    /// Display color, e.g. `#c8102e`
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub parent: Option<ClassificationId>,
    #[serde(default)]
    pub is_default: bool,
}

impl TreeNode for Classification {
    type Id = ClassificationId;

    fn id(&self) -> ClassificationId {
        self.id
    }

    fn parent(&self) -> Option<ClassificationId> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<ClassificationId>) {
        self.parent = parent;
    }
}

/// Fields for a new classification; the store assigns the id
#[derive(Debug, Clone, Default)]
pub struct ClassificationDraft {
    pub title: String,
    pub subtitle: String,
    pub abbreviation: String,
    pub color: String,
    pub parent: Option<ClassificationId>,
    pub is_default: bool,
}

impl ClassificationDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviation = abbreviation.into();
        self
    }

    pub fn under(mut self, parent: ClassificationId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn default_label(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Display-field edits. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ClassificationPatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub abbreviation: Option<String>,
    pub color: Option<String>,
}

impl ClassificationPatch {
    pub(crate) fn apply(self, target: &mut Classification) {
        if let Some(title) = self.title {
            target.title = title;
        }
        if let Some(subtitle) = self.subtitle {
            target.subtitle = subtitle;
        }
        if let Some(abbreviation) = self.abbreviation {
            target.abbreviation = abbreviation;
        }
        if let Some(color) = self.color {
            target.color = color;
        }
    }
}
