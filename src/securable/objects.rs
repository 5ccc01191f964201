//! Concrete securable objects

use crate::securable::types::{ObjectId, ObjectKind, Overrides, Securable, SecurityAttributes};
use serde::{Deserialize, Serialize};

/// A document. Owns its files; the thumbnail is a back-reference to one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: ObjectId,
    pub title: String,
    pub attributes: SecurityAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ObjectId>,
}

impl Securable for Document {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Document
    }

    fn attributes(&self) -> &SecurityAttributes {
        &self.attributes
    }
}

/// A file inside a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: ObjectId,
    pub document: ObjectId,
    pub name: String,
    #[serde(default)]
    pub attributes: SecurityAttributes,
    #[serde(default)]
    pub overrides: Overrides,
}

impl Securable for File {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::File
    }

    fn attributes(&self) -> &SecurityAttributes {
        &self.attributes
    }

    fn overrides(&self) -> Option<&Overrides> {
        Some(&self.overrides)
    }
}

/// A securable object with no parent: feed, collector, scraper or submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLevelObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub name: String,
    pub attributes: SecurityAttributes,
}

impl Securable for TopLevelObject {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn attributes(&self) -> &SecurityAttributes {
        &self.attributes
    }
}

/// Any object held by the [`ObjectStore`](crate::securable::ObjectStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredObject {
    Document(Document),
    File(File),
    Other(TopLevelObject),
}

impl StoredObject {
    fn inner(&self) -> &dyn Securable {
        match self {
            StoredObject::Document(d) => d,
            StoredObject::File(f) => f,
            StoredObject::Other(o) => o,
        }
    }

    /// Display name of the object
    pub fn name(&self) -> &str {
        match self {
            StoredObject::Document(d) => &d.title,
            StoredObject::File(f) => &f.name,
            StoredObject::Other(o) => &o.name,
        }
    }

    /// Owning document, for files
    pub fn parent_id(&self) -> Option<ObjectId> {
        match self {
            StoredObject::File(f) => Some(f.document),
            _ => None,
        }
    }
}

impl Securable for StoredObject {
    fn object_id(&self) -> ObjectId {
        self.inner().object_id()
    }

    fn kind(&self) -> ObjectKind {
        self.inner().kind()
    }

    fn attributes(&self) -> &SecurityAttributes {
        self.inner().attributes()
    }

    fn overrides(&self) -> Option<&Overrides> {
        self.inner().overrides()
    }
}
