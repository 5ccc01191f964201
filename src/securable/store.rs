//! Object store
//!
//! Holds documents, their files and the other top-level securable objects.
//! This store only keeps records consistent with each other (files belong to
//! an existing document, thumbnails point at one of the document's files);
//! references into the taxonomy and directory are validated by
//! [`ReleaseControl`](crate::service::ReleaseControl).

use crate::directory::GroupId;
use crate::error::{ControlError, ControlResult, EntityKind, StoreError};
use crate::securable::inherit::resolve_effective;
use crate::securable::objects::{Document, File, StoredObject, TopLevelObject};
use crate::securable::types::{
    EffectiveAttributes, ObjectId, Overrides, Securable, SecurityAttributes,
};
use crate::taxonomy::ClassificationId;
use crate::util::{read_lock, write_lock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

const STORE: &str = "objects";

/// Live references into the taxonomy and directory, for delete protection
pub trait ReferenceIndex {
    /// Stored references to a classification
    fn classification_references(&self, id: ClassificationId) -> Result<usize, StoreError>;

    /// Stored references to a group from any eyes-only or releasable-to set
    fn group_references(&self, id: GroupId) -> Result<usize, StoreError>;
}

#[derive(Default)]
struct ObjectState {
    documents: BTreeMap<ObjectId, Document>,
    files: BTreeMap<ObjectId, File>,
    others: BTreeMap<ObjectId, TopLevelObject>,
}

impl ObjectState {
    fn contains(&self, id: ObjectId) -> bool {
        self.documents.contains_key(&id)
            || self.files.contains_key(&id)
            || self.others.contains_key(&id)
    }

    fn get(&self, id: ObjectId) -> Option<StoredObject> {
        if let Some(d) = self.documents.get(&id) {
            return Some(StoredObject::Document(d.clone()));
        }
        if let Some(f) = self.files.get(&id) {
            return Some(StoredObject::File(f.clone()));
        }
        self.others.get(&id).cloned().map(StoredObject::Other)
    }

    fn all_attributes(&self) -> impl Iterator<Item = &SecurityAttributes> {
        self.documents
            .values()
            .map(|d| &d.attributes)
            .chain(self.files.values().map(|f| &f.attributes))
            .chain(self.others.values().map(|o| &o.attributes))
    }
}

/// Documents, files and top-level objects
pub struct ObjectStore {
    state: RwLock<ObjectState>,
    next_id: AtomicU64,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ObjectState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build a store from persisted records
    pub fn from_records(
        documents: Vec<Document>,
        files: Vec<File>,
        others: Vec<TopLevelObject>,
    ) -> ControlResult<Self> {
        let store = Self::new();
        {
            let mut state = store.write()?;
            for document in documents {
                let id = document.id;
                insert_unique(&mut state, id)?;
                state.documents.insert(id, document);
            }
            for other in others {
                let id = other.id;
                require_generic(&other)?;
                insert_unique(&mut state, id)?;
                state.others.insert(id, other);
            }
            for file in files {
                let id = file.id;
                insert_unique(&mut state, id)?;
                if !state.documents.contains_key(&file.document) {
                    return Err(ControlError::not_found(EntityKind::Object, file.document));
                }
                state.files.insert(id, file);
            }
            for document in state.documents.values() {
                if let Some(thumb) = document.thumbnail
                    && state.files.get(&thumb).is_none_or(|f| f.document != document.id)
                {
                    return Err(ControlError::Invalid {
                        message: format!(
                            "thumbnail {} of document {} is not one of its files",
                            thumb, document.id
                        ),
                    });
                }
            }

            let max = [
                state.documents.keys().next_back(),
                state.files.keys().next_back(),
                state.others.keys().next_back(),
            ]
            .into_iter()
            .flatten()
            .max()
            .map_or(0, |id| id.get());
            store.next_id.store(max + 1, Ordering::Relaxed);
        }
        Ok(store)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ObjectState>, StoreError> {
        read_lock(&self.state, STORE)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ObjectState>, StoreError> {
        write_lock(&self.state, STORE)
    }

    /// Reserve a fresh object id
    pub fn allocate_id(&self) -> ObjectId {
        ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert_document(&self, document: Document) -> ControlResult<()> {
        let mut state = self.write()?;
        insert_unique(&mut state, document.id)?;
        debug!(id = %document.id, "Stored document");
        state.documents.insert(document.id, document);
        Ok(())
    }

    pub fn insert_file(&self, file: File) -> ControlResult<()> {
        let mut state = self.write()?;
        insert_unique(&mut state, file.id)?;
        if !state.documents.contains_key(&file.document) {
            return Err(ControlError::not_found(EntityKind::Object, file.document));
        }
        debug!(id = %file.id, document = %file.document, "Stored file");
        state.files.insert(file.id, file);
        Ok(())
    }

    pub fn insert_object(&self, object: TopLevelObject) -> ControlResult<()> {
        require_generic(&object)?;
        let mut state = self.write()?;
        insert_unique(&mut state, object.id)?;
        debug!(id = %object.id, kind = %object.kind, "Stored object");
        state.others.insert(object.id, object);
        Ok(())
    }

    /// Look up any object by id
    pub fn get(&self, id: ObjectId) -> ControlResult<StoredObject> {
        self.read()?
            .get(id)
            .ok_or_else(|| ControlError::not_found(EntityKind::Object, id))
    }

    pub fn document(&self, id: ObjectId) -> ControlResult<Document> {
        self.read()?
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| ControlError::not_found(EntityKind::Object, id))
    }

    /// An object together with the document it inherits from, read under one lock
    pub fn with_parent(&self, id: ObjectId) -> ControlResult<(StoredObject, Option<Document>)> {
        let state = self.read()?;
        let object = state
            .get(id)
            .ok_or_else(|| ControlError::not_found(EntityKind::Object, id))?;
        let parent = match object.parent_id() {
            Some(document) => Some(
                state
                    .documents
                    .get(&document)
                    .cloned()
                    .ok_or_else(|| ControlError::not_found(EntityKind::Object, document))?,
            ),
            None => None,
        };
        Ok((object, parent))
    }

    /// Effective restrictions of a stored object
    pub fn effective(&self, id: ObjectId) -> ControlResult<EffectiveAttributes> {
        let (object, parent) = self.with_parent(id)?;
        resolve_effective(&object, parent.as_ref().map(|d| d as &dyn Securable))
    }

    /// Files owned by a document, in id order
    pub fn files_of(&self, document: ObjectId) -> ControlResult<Vec<File>> {
        let state = self.read()?;
        if !state.documents.contains_key(&document) {
            return Err(ControlError::not_found(EntityKind::Object, document));
        }
        Ok(state
            .files
            .values()
            .filter(|f| f.document == document)
            .cloned()
            .collect())
    }

    /// Every object in id order
    pub fn list(&self) -> ControlResult<Vec<StoredObject>> {
        let state = self.read()?;
        let mut all: Vec<StoredObject> = state
            .documents
            .values()
            .cloned()
            .map(StoredObject::Document)
            .chain(state.files.values().cloned().map(StoredObject::File))
            .chain(state.others.values().cloned().map(StoredObject::Other))
            .collect();
        all.sort_by_key(|o| match o {
            StoredObject::Document(d) => d.id,
            StoredObject::File(f) => f.id,
            StoredObject::Other(o) => o.id,
        });
        Ok(all)
    }

    /// Snapshot of every record, grouped by table
    pub fn records(&self) -> ControlResult<(Vec<Document>, Vec<File>, Vec<TopLevelObject>)> {
        let state = self.read()?;
        Ok((
            state.documents.values().cloned().collect(),
            state.files.values().cloned().collect(),
            state.others.values().cloned().collect(),
        ))
    }

    /// Replace the stored attributes (and, for files, override flags) of an object
    pub fn update_attributes(
        &self,
        id: ObjectId,
        attributes: SecurityAttributes,
        overrides: Option<Overrides>,
    ) -> ControlResult<()> {
        let mut state = self.write()?;
        if let Some(document) = state.documents.get_mut(&id) {
            document.attributes = attributes;
        } else if let Some(file) = state.files.get_mut(&id) {
            file.attributes = attributes;
            if let Some(overrides) = overrides {
                file.overrides = overrides;
            }
        } else if let Some(other) = state.others.get_mut(&id) {
            other.attributes = attributes;
        } else {
            return Err(ControlError::not_found(EntityKind::Object, id));
        }
        info!(id = %id, "Updated object restrictions");
        Ok(())
    }

    /// Point a document's thumbnail at one of its files, or clear it
    pub fn set_thumbnail(&self, document: ObjectId, file: Option<ObjectId>) -> ControlResult<()> {
        let mut state = self.write()?;
        if let Some(file) = file {
            match state.files.get(&file) {
                Some(f) if f.document == document => {}
                Some(_) => {
                    return Err(ControlError::Invalid {
                        message: format!("file {} does not belong to document {}", file, document),
                    });
                }
                None => return Err(ControlError::not_found(EntityKind::Object, file)),
            }
        }
        let doc = state
            .documents
            .get_mut(&document)
            .ok_or_else(|| ControlError::not_found(EntityKind::Object, document))?;
        doc.thumbnail = file;
        Ok(())
    }

    /// Delete a document and every file it owns
    pub fn delete_document(&self, id: ObjectId) -> ControlResult<(Document, Vec<File>)> {
        let mut state = self.write()?;
        let document = state
            .documents
            .remove(&id)
            .ok_or_else(|| ControlError::not_found(EntityKind::Object, id))?;
        let owned: Vec<ObjectId> = state
            .files
            .values()
            .filter(|f| f.document == id)
            .map(|f| f.id)
            .collect();
        let files: Vec<File> = owned
            .iter()
            .filter_map(|file_id| state.files.remove(file_id))
            .collect();
        info!(id = %id, files = files.len(), "Deleted document");
        Ok((document, files))
    }

    /// Delete a file, clearing the owning document's thumbnail if it pointed here
    pub fn delete_file(&self, id: ObjectId) -> ControlResult<File> {
        let mut state = self.write()?;
        let file = state
            .files
            .remove(&id)
            .ok_or_else(|| ControlError::not_found(EntityKind::Object, id))?;
        if let Some(document) = state.documents.get_mut(&file.document)
            && document.thumbnail == Some(id)
        {
            document.thumbnail = None;
            debug!(document = %document.id, "Cleared thumbnail");
        }
        info!(id = %id, "Deleted file");
        Ok(file)
    }

    /// Delete a top-level object other than a document
    pub fn delete_object(&self, id: ObjectId) -> ControlResult<TopLevelObject> {
        let removed = self
            .write()?
            .others
            .remove(&id)
            .ok_or_else(|| ControlError::not_found(EntityKind::Object, id))?;
        info!(id = %id, kind = %removed.kind, "Deleted object");
        Ok(removed)
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceIndex for ObjectStore {
    fn classification_references(&self, id: ClassificationId) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .all_attributes()
            .filter(|a| a.classification == Some(id))
            .count())
    }

    fn group_references(&self, id: GroupId) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .all_attributes()
            .map(|a| a.groups().filter(|g| **g == id).count())
            .sum())
    }
}

/// Documents and files have their own tables and nesting rules
fn require_generic(object: &TopLevelObject) -> ControlResult<()> {
    if !object.kind.is_generic() {
        return Err(ControlError::Invalid {
            message: format!("{} cannot be stored as a top-level object", object.kind),
        });
    }
    Ok(())
}

fn insert_unique(state: &mut ObjectState, id: ObjectId) -> ControlResult<()> {
    if state.contains(id) {
        return Err(ControlError::Invalid {
            message: format!("duplicate object id {}", id),
        });
    }
    Ok(())
}
