//! Classification taxonomy store
//!
//! Read-mostly: lookups and ancestor walks take a shared lock, structural
//! edits (create, reparent, delete, default changes) take the single
//! writer lock so no reader can observe a transient cycle.

use crate::error::{ControlError, ControlResult, EntityKind, StoreError};
use crate::hierarchy::Forest;
use crate::securable::ReferenceIndex;
use crate::taxonomy::types::{
    Classification, ClassificationDraft, ClassificationId, ClassificationPatch,
};
use crate::util::{read_lock, write_lock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

const STORE: &str = "taxonomy";

/// Forest of classifications
pub struct ClassificationStore {
    forest: RwLock<Forest<Classification>>,
    next_id: AtomicU64,
}

impl ClassificationStore {
    /// Create an empty taxonomy
    pub fn new() -> Self {
        Self {
            forest: RwLock::new(Forest::new(EntityKind::Classification)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build a taxonomy from persisted records, validating every invariant
    pub fn from_records(records: Vec<Classification>) -> ControlResult<Self> {
        let forest = Forest::from_nodes(EntityKind::Classification, records)?;

        let defaults: Vec<&Classification> = forest.iter().filter(|c| c.is_default).collect();
        if defaults.len() > 1 {
            return Err(ControlError::InvalidDefault {
                kind: EntityKind::Classification,
                id: defaults[1].id.to_string(),
                reason: format!("classification {} is already the default", defaults[0].id),
            });
        }
        if let Some(default) = defaults.first()
            && default.parent.is_some()
        {
            return Err(not_root(default.id));
        }

        let next_id = forest.max_id().map_or(1, |id| id.get() + 1);
        Ok(Self {
            forest: RwLock::new(forest),
            next_id: AtomicU64::new(next_id),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Forest<Classification>>, StoreError> {
        read_lock(&self.forest, STORE)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Forest<Classification>>, StoreError> {
        write_lock(&self.forest, STORE)
    }

    /// Look up a classification by id
    pub fn resolve(&self, id: ClassificationId) -> ControlResult<Classification> {
        Ok(self.read()?.require(id)?.clone())
    }

    pub fn exists(&self, id: ClassificationId) -> ControlResult<bool> {
        Ok(self.read()?.contains(id))
    }

    /// Chain from `id` up to its root, `id` first
    pub fn ancestors(&self, id: ClassificationId) -> ControlResult<Vec<ClassificationId>> {
        self.read()?.ancestors(id)
    }

    /// Every classification beneath `id`
    pub fn descendants(&self, id: ClassificationId) -> ControlResult<Vec<ClassificationId>> {
        self.read()?.descendants(id)
    }

    pub fn children(&self, id: ClassificationId) -> ControlResult<Vec<ClassificationId>> {
        let forest = self.read()?;
        forest.require(id)?;
        Ok(forest.children(id))
    }

    /// All classifications in id order
    pub fn list(&self) -> ControlResult<Vec<Classification>> {
        Ok(self.read()?.iter().cloned().collect())
    }

    /// The system-wide fallback classification
    pub fn default(&self) -> ControlResult<Classification> {
        self.read()?
            .iter()
            .find(|c| c.is_default)
            .cloned()
            .ok_or(ControlError::NoDefault {
                kind: EntityKind::Classification,
            })
    }

    /// Add a classification
    pub fn create(&self, draft: ClassificationDraft) -> ControlResult<Classification> {
        if draft.title.trim().is_empty() {
            return Err(ControlError::Invalid {
                message: "classification title must not be blank".to_string(),
            });
        }

        let mut forest = self.write()?;
        let id = ClassificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if draft.is_default && draft.parent.is_some() {
            return Err(not_root(id));
        }

        let record = Classification {
            id,
            title: draft.title.trim().to_string(),
            subtitle: draft.subtitle,
            abbreviation: draft.abbreviation,
            color: draft.color,
            parent: draft.parent,
            is_default: draft.is_default,
        };
        forest.insert(record.clone())?;
        if record.is_default {
            clear_other_defaults(&mut forest, id)?;
        }

        info!(id = %id, title = %record.title, parent = ?record.parent, "Created classification");
        Ok(record)
    }

    /// Edit display fields
    pub fn edit(
        &self,
        id: ClassificationId,
        patch: ClassificationPatch,
    ) -> ControlResult<Classification> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ControlError::Invalid {
                message: "classification title must not be blank".to_string(),
            });
        }
        let mut forest = self.write()?;
        let updated = forest.edit(id, |c| {
            patch.apply(c);
            c.clone()
        })?;
        debug!(id = %id, "Edited classification");
        Ok(updated)
    }

    /// Make `id` the default classification, clearing any previous default
    pub fn set_default(&self, id: ClassificationId) -> ControlResult<()> {
        let mut forest = self.write()?;
        if forest.require(id)?.parent.is_some() {
            return Err(not_root(id));
        }
        forest.edit(id, |c| c.is_default = true)?;
        clear_other_defaults(&mut forest, id)?;
        info!(id = %id, "Set default classification");
        Ok(())
    }

    /// Move `id` under `new_parent` (or to the top level)
    pub fn reparent(
        &self,
        id: ClassificationId,
        new_parent: Option<ClassificationId>,
    ) -> ControlResult<()> {
        let mut forest = self.write()?;
        if new_parent.is_some() && forest.require(id)?.is_default {
            return Err(not_root(id));
        }
        forest.reparent(id, new_parent)?;
        info!(id = %id, parent = ?new_parent, "Reparented classification");
        Ok(())
    }

    /// Delete a classification that nothing references and that has no children
    pub fn delete(
        &self,
        id: ClassificationId,
        references: &impl ReferenceIndex,
    ) -> ControlResult<Classification> {
        let mut forest = self.write()?;
        forest.require(id)?;

        let count = references.classification_references(id)?;
        if count > 0 {
            return Err(ControlError::InUse {
                kind: EntityKind::Classification,
                id: id.to_string(),
                references: count,
            });
        }

        let removed = forest.remove(id)?;
        if removed.is_default {
            warn!(id = %id, "Deleted the default classification; no default remains");
        }
        info!(id = %id, "Deleted classification");
        Ok(removed)
    }
}

impl Default for ClassificationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_root(id: ClassificationId) -> ControlError {
    ControlError::InvalidDefault {
        kind: EntityKind::Classification,
        id: id.to_string(),
        reason: "the default classification must be a root".to_string(),
    }
}

fn clear_other_defaults(
    forest: &mut Forest<Classification>,
    keep: ClassificationId,
) -> ControlResult<()> {
    let others: Vec<ClassificationId> = forest
        .iter()
        .filter(|c| c.is_default && c.id != keep)
        .map(|c| c.id)
        .collect();
    for other in others {
        forest.edit(other, |c| c.is_default = false)?;
    }
    Ok(())
}
