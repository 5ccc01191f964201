//! Cross-request closure cache
//!
//! The cache holds closures for a single directory generation. Any group or
//! membership mutation moves the generation, and the first lookup that sees
//! the new generation drops every entry at once; nothing is patched
//! incrementally and stale entries never accumulate.

use crate::directory::store::GroupDirectory;
use crate::directory::types::{GroupId, PrincipalId};
use crate::error::{ControlResult, StoreError};
use crate::util::{read_lock, write_lock};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

const STORE: &str = "closure cache";

#[derive(Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<PrincipalId, Arc<BTreeSet<GroupId>>>,
}

/// Principal closure cache bound to one directory
pub struct ClosureCache {
    directory: Arc<GroupDirectory>,
    state: RwLock<CacheState>,
}

impl ClosureCache {
    pub fn new(directory: Arc<GroupDirectory>) -> Self {
        let generation = directory.generation();
        Self {
            directory,
            state: RwLock::new(CacheState {
                generation,
                entries: HashMap::new(),
            }),
        }
    }

    /// Closure of `principal`, recomputed if the directory changed since it was cached
    pub fn closure(&self, principal: &PrincipalId) -> ControlResult<Arc<BTreeSet<GroupId>>> {
        let current = self.directory.generation();
        {
            let state = read_lock(&self.state, STORE)?;
            if state.generation == current
                && let Some(groups) = state.entries.get(principal)
            {
                trace!(principal = %principal, "Closure cache hit");
                return Ok(Arc::clone(groups));
            }
        }

        let (groups, generation) = self.directory.closure_with_generation(principal)?;
        let groups = Arc::new(groups);

        let mut state = write_lock(&self.state, STORE)?;
        if generation > state.generation {
            debug!(
                from = state.generation,
                to = generation,
                evicted = state.entries.len(),
                "Directory changed, clearing closure cache"
            );
            state.entries.clear();
            state.generation = generation;
        }
        // A closure computed at an older generation than the cache is not stored
        if generation == state.generation {
            state.entries.insert(principal.clone(), Arc::clone(&groups));
        }
        Ok(groups)
    }

    /// Drop every entry
    pub fn invalidate(&self) -> Result<(), StoreError> {
        write_lock(&self.state, STORE)?.entries.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(read_lock(&self.state, STORE)?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
