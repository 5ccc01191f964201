//! Per-request access context

use crate::access_control::types::Principal;
use crate::directory::GroupId;
use crate::error::StoreError;
use crate::util::{read_lock, write_lock};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

const STORE: &str = "access context";

struct MemoizedClosure {
    generation: u64,
    groups: Arc<BTreeSet<GroupId>>,
}

/// State shared by every check made on behalf of one request.
///
/// Memoizes the principal's group closure so a list of N objects costs one
/// closure computation. The memo is tagged with the directory generation and
/// ignored once the directory has changed.
pub struct AccessContext {
    principal: Principal,
    request_id: String,
    direct_groups: Option<BTreeSet<GroupId>>,
    memo: RwLock<Option<MemoizedClosure>>,
}

impl AccessContext {
    /// Context whose memberships are read from the directory
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            request_id: format!("{:016x}", rand::random::<u64>()),
            direct_groups: None,
            memo: RwLock::new(None),
        }
    }

    /// Context whose direct memberships come from the identity layer
    pub fn with_memberships(
        principal: Principal,
        groups: impl IntoIterator<Item = GroupId>,
    ) -> Self {
        Self {
            direct_groups: Some(groups.into_iter().collect()),
            ..Self::new(principal)
        }
    }

    /// Use the caller's correlation id instead of a generated one
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Direct groups supplied by the identity layer, if any
    pub fn direct_groups(&self) -> Option<&BTreeSet<GroupId>> {
        self.direct_groups.as_ref()
    }

    /// Memoized closure, if it was computed at `generation`
    pub(crate) fn memoized(
        &self,
        generation: u64,
    ) -> Result<Option<Arc<BTreeSet<GroupId>>>, StoreError> {
        Ok(read_lock(&self.memo, STORE)?
            .as_ref()
            .filter(|m| m.generation == generation)
            .map(|m| Arc::clone(&m.groups)))
    }

    pub(crate) fn memoize(
        &self,
        generation: u64,
        groups: Arc<BTreeSet<GroupId>>,
    ) -> Result<(), StoreError> {
        *write_lock(&self.memo, STORE)? = Some(MemoizedClosure { generation, groups });
        Ok(())
    }
}
