//! Compartment directory
//!
//! Holds the group forest and the direct membership relation. Ancestor
//! memberships are derived on read, never stored. Every mutation bumps a
//! generation counter that closure caches use as their invalidation signal.

use crate::directory::types::{Group, GroupDraft, GroupId, GroupPatch, Member, PrincipalId};
use crate::error::{ControlError, ControlResult, EntityKind, StoreError};
use crate::hierarchy::Forest;
use crate::securable::ReferenceIndex;
use crate::util::{read_lock, write_lock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, trace};

const STORE: &str = "directory";

struct DirectoryState {
    forest: Forest<Group>,
    /// group -> direct members
    members: BTreeMap<GroupId, BTreeSet<PrincipalId>>,
    /// principal -> directly assigned groups
    memberships: HashMap<PrincipalId, BTreeSet<GroupId>>,
}

impl DirectoryState {
    fn closure_of<'a>(&self, direct: impl IntoIterator<Item = &'a GroupId>) -> BTreeSet<GroupId> {
        let mut closure = BTreeSet::new();
        for group in direct {
            // Already walked from here up; the rest of the chain is in too
            if closure.contains(group) {
                continue;
            }
            match self.forest.ancestors(*group) {
                Ok(chain) => closure.extend(chain),
                Err(_) => trace!(group = %group, "Ignoring unknown group in membership set"),
            }
        }
        closure
    }
}

/// Groups and memberships
pub struct GroupDirectory {
    state: RwLock<DirectoryState>,
    next_id: AtomicU64,
    generation: AtomicU64,
}

impl GroupDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState {
                forest: Forest::new(EntityKind::Group),
                members: BTreeMap::new(),
                memberships: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(1),
        }
    }

    /// Build a directory from persisted groups and memberships
    pub fn from_records(groups: Vec<Group>, members: Vec<Member>) -> ControlResult<Self> {
        let forest = Forest::from_nodes(EntityKind::Group, groups)?;

        let defaults: Vec<GroupId> = forest.iter().filter(|g| g.is_default).map(|g| g.id).collect();
        if defaults.len() > 1 {
            return Err(ControlError::InvalidDefault {
                kind: EntityKind::Group,
                id: defaults[1].to_string(),
                reason: format!("group {} is already the default", defaults[0]),
            });
        }

        let mut state = DirectoryState {
            forest,
            members: BTreeMap::new(),
            memberships: HashMap::new(),
        };
        for member in members {
            state.forest.require(member.group)?;
            state
                .members
                .entry(member.group)
                .or_default()
                .insert(member.principal.clone());
            state
                .memberships
                .entry(member.principal)
                .or_default()
                .insert(member.group);
        }

        let next_id = state.forest.max_id().map_or(1, |id| id.get() + 1);
        Ok(Self {
            state: RwLock::new(state),
            next_id: AtomicU64::new(next_id),
            generation: AtomicU64::new(1),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, DirectoryState>, StoreError> {
        read_lock(&self.state, STORE)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, DirectoryState>, StoreError> {
        write_lock(&self.state, STORE)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Current mutation generation. Changes after every group or membership edit.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Look up a group by id
    pub fn resolve(&self, id: GroupId) -> ControlResult<Group> {
        Ok(self.read()?.forest.require(id)?.clone())
    }

    pub fn exists(&self, id: GroupId) -> ControlResult<bool> {
        Ok(self.read()?.forest.contains(id))
    }

    /// Chain from `id` up to its root, `id` first
    pub fn ancestors(&self, id: GroupId) -> ControlResult<Vec<GroupId>> {
        self.read()?.forest.ancestors(id)
    }

    pub fn children(&self, id: GroupId) -> ControlResult<Vec<GroupId>> {
        let state = self.read()?;
        state.forest.require(id)?;
        Ok(state.forest.children(id))
    }

    /// All groups in id order, hidden ones included
    pub fn list(&self) -> ControlResult<Vec<Group>> {
        Ok(self.read()?.forest.iter().cloned().collect())
    }

    /// Groups offered in user-facing pickers
    pub fn pickable(&self) -> ControlResult<Vec<Group>> {
        Ok(self
            .read()?
            .forest
            .iter()
            .filter(|g| !g.hidden)
            .cloned()
            .collect())
    }

    /// The group used when a creator specifies no releasability
    pub fn default(&self) -> ControlResult<Group> {
        self.read()?
            .forest
            .iter()
            .find(|g| g.is_default)
            .cloned()
            .ok_or(ControlError::NoDefault {
                kind: EntityKind::Group,
            })
    }

    /// Principals directly assigned to `id`
    pub fn members(&self, id: GroupId) -> ControlResult<BTreeSet<PrincipalId>> {
        let state = self.read()?;
        state.forest.require(id)?;
        Ok(state.members.get(&id).cloned().unwrap_or_default())
    }

    /// Groups `principal` is directly assigned to
    pub fn groups_of(&self, principal: &PrincipalId) -> ControlResult<BTreeSet<GroupId>> {
        Ok(self
            .read()?
            .memberships
            .get(principal)
            .cloned()
            .unwrap_or_default())
    }

    /// Every group `principal` belongs to directly, plus all their ancestors
    pub fn closure(&self, principal: &PrincipalId) -> ControlResult<BTreeSet<GroupId>> {
        Ok(self.closure_with_generation(principal)?.0)
    }

    /// Closure together with the generation it was computed at
    pub fn closure_with_generation(
        &self,
        principal: &PrincipalId,
    ) -> ControlResult<(BTreeSet<GroupId>, u64)> {
        let state = self.read()?;
        // Writers bump while holding the write lock, so this is consistent
        let generation = self.generation();
        let closure = match state.memberships.get(principal) {
            Some(direct) => state.closure_of(direct),
            None => BTreeSet::new(),
        };
        debug!(principal = %principal, groups = closure.len(), "Computed group closure");
        Ok((closure, generation))
    }

    /// Closure of a membership set supplied by the identity layer.
    /// Unknown group ids grant nothing and are skipped.
    pub fn closure_of(
        &self,
        direct: impl IntoIterator<Item = GroupId>,
    ) -> ControlResult<BTreeSet<GroupId>> {
        let direct: Vec<GroupId> = direct.into_iter().collect();
        Ok(self.read()?.closure_of(direct.iter()))
    }

    /// Add a group
    pub fn create(&self, draft: GroupDraft) -> ControlResult<Group> {
        if draft.name.trim().is_empty() {
            return Err(ControlError::Invalid {
                message: "group name must not be blank".to_string(),
            });
        }

        let mut state = self.write()?;
        let id = GroupId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = Group {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description,
            parent: draft.parent,
            is_default: draft.is_default,
            hidden: draft.hidden,
        };
        state.forest.insert(record.clone())?;
        if record.is_default {
            clear_other_defaults(&mut state.forest, id)?;
        }
        self.bump();

        info!(id = %id, name = %record.name, parent = ?record.parent, "Created group");
        Ok(record)
    }

    /// Edit name, description or visibility
    pub fn edit(&self, id: GroupId, patch: GroupPatch) -> ControlResult<Group> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ControlError::Invalid {
                message: "group name must not be blank".to_string(),
            });
        }
        let mut state = self.write()?;
        let updated = state.forest.edit(id, |g| {
            patch.apply(g);
            g.clone()
        })?;
        debug!(id = %id, "Edited group");
        Ok(updated)
    }

    /// Make `id` the default group, clearing any previous default
    pub fn set_default(&self, id: GroupId) -> ControlResult<()> {
        let mut state = self.write()?;
        state.forest.edit(id, |g| g.is_default = true)?;
        clear_other_defaults(&mut state.forest, id)?;
        info!(id = %id, "Set default group");
        Ok(())
    }

    /// Move `id` under `new_parent` (or to the top level)
    pub fn reparent(&self, id: GroupId, new_parent: Option<GroupId>) -> ControlResult<()> {
        let mut state = self.write()?;
        state.forest.reparent(id, new_parent)?;
        self.bump();
        info!(id = %id, parent = ?new_parent, "Reparented group");
        Ok(())
    }

    /// Delete an empty, unreferenced leaf group
    pub fn delete(&self, id: GroupId, references: &impl ReferenceIndex) -> ControlResult<Group> {
        let mut state = self.write()?;
        state.forest.require(id)?;

        let members = state.members.get(&id).map_or(0, BTreeSet::len);
        let count = members + references.group_references(id)?;
        if count > 0 {
            return Err(ControlError::InUse {
                kind: EntityKind::Group,
                id: id.to_string(),
                references: count,
            });
        }

        let removed = state.forest.remove(id)?;
        state.members.remove(&id);
        self.bump();
        info!(id = %id, "Deleted group");
        Ok(removed)
    }

    /// Assign `principal` directly to `group`. Returns false if already a member.
    pub fn assign(&self, group: GroupId, principal: &PrincipalId) -> ControlResult<bool> {
        let mut state = self.write()?;
        state.forest.require(group)?;

        let added = state
            .members
            .entry(group)
            .or_default()
            .insert(principal.clone());
        if added {
            state
                .memberships
                .entry(principal.clone())
                .or_default()
                .insert(group);
            self.bump();
            info!(group = %group, principal = %principal, "Assigned member");
        }
        Ok(added)
    }

    /// Remove a direct membership. Returns false if there was none.
    pub fn remove(&self, group: GroupId, principal: &PrincipalId) -> ControlResult<bool> {
        let mut state = self.write()?;
        state.forest.require(group)?;

        let removed = state
            .members
            .get_mut(&group)
            .is_some_and(|set| set.remove(principal));
        if removed {
            if state.members.get(&group).is_some_and(BTreeSet::is_empty) {
                state.members.remove(&group);
            }
            if let Some(groups) = state.memberships.get_mut(principal) {
                groups.remove(&group);
                if groups.is_empty() {
                    state.memberships.remove(principal);
                }
            }
            self.bump();
            info!(group = %group, principal = %principal, "Removed member");
        }
        Ok(removed)
    }

    /// All direct memberships, ordered by group then principal
    pub fn memberships(&self) -> ControlResult<Vec<Member>> {
        let state = self.read()?;
        Ok(state
            .members
            .iter()
            .flat_map(|(group, principals)| {
                principals.iter().map(|p| Member {
                    group: *group,
                    principal: p.clone(),
                })
            })
            .collect())
    }
}

impl Default for GroupDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn clear_other_defaults(forest: &mut Forest<Group>, keep: GroupId) -> ControlResult<()> {
    let others: Vec<GroupId> = forest
        .iter()
        .filter(|g| g.is_default && g.id != keep)
        .map(|g| g.id)
        .collect();
    for other in others {
        forest.edit(other, |g| g.is_default = false)?;
    }
    Ok(())
}
