//! Forest of parent-linked nodes
//!
//! Invariants held by every [`Forest`]:
//! - every parent reference points at a node in the same forest
//! - the parent relation is acyclic
//! - `children` is exactly the inverse of the parent relation

use crate::error::{ControlError, ControlResult, EntityKind};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

/// A record that lives in a [`Forest`]
pub trait TreeNode {
    type Id: Copy + Eq + Ord + Hash + fmt::Display;

    fn id(&self) -> Self::Id;

    fn parent(&self) -> Option<Self::Id>;

    fn set_parent(&mut self, parent: Option<Self::Id>);
}

/// Arena of nodes indexed by id
#[derive(Debug, Clone)]
pub struct Forest<N: TreeNode> {
    kind: EntityKind,
    nodes: BTreeMap<N::Id, N>,
    children: HashMap<N::Id, BTreeSet<N::Id>>,
}

impl<N: TreeNode> Forest<N> {
    /// Create an empty forest of the given record kind
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            nodes: BTreeMap::new(),
            children: HashMap::new(),
        }
    }

    /// Build a forest from records in any order, validating parents and acyclicity
    pub fn from_nodes(kind: EntityKind, nodes: impl IntoIterator<Item = N>) -> ControlResult<Self> {
        let mut forest = Self::new(kind);

        for node in nodes {
            let id = node.id();
            if forest.nodes.insert(id, node).is_some() {
                return Err(ControlError::Invalid {
                    message: format!("duplicate {} id {}", kind, id),
                });
            }
        }

        for (id, node) in &forest.nodes {
            if let Some(parent) = node.parent() {
                if !forest.nodes.contains_key(&parent) {
                    return Err(ControlError::not_found(kind, parent));
                }
                forest.children.entry(parent).or_default().insert(*id);
            }
        }

        // A chain longer than the arena can only mean a loop
        let limit = forest.nodes.len();
        for (id, node) in &forest.nodes {
            let mut cursor = node.parent();
            let mut steps = 0;
            while let Some(current) = cursor {
                steps += 1;
                if current == *id || steps > limit {
                    return Err(ControlError::Cycle {
                        kind,
                        id: id.to_string(),
                        parent: node
                            .parent()
                            .map(|p| p.to_string())
                            .unwrap_or_default(),
                    });
                }
                cursor = forest.nodes.get(&current).and_then(TreeNode::parent);
            }
        }

        Ok(forest)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn get(&self, id: N::Id) -> Option<&N> {
        self.nodes.get(&id)
    }

    /// Look up a node or fail with `NotFound`
    pub fn require(&self, id: N::Id) -> ControlResult<&N> {
        self.nodes
            .get(&id)
            .ok_or_else(|| ControlError::not_found(self.kind, id))
    }

    pub fn contains(&self, id: N::Id) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in id order
    pub fn iter(&self) -> impl Iterator<Item = &N> {
        self.nodes.values()
    }

    /// Largest id currently stored
    pub fn max_id(&self) -> Option<N::Id> {
        self.nodes.keys().next_back().copied()
    }

    /// Insert a new node under an existing parent (or as a root)
    pub fn insert(&mut self, node: N) -> ControlResult<()> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(ControlError::Invalid {
                message: format!("duplicate {} id {}", self.kind, id),
            });
        }
        if let Some(parent) = node.parent() {
            self.require(parent)?;
            self.children.entry(parent).or_default().insert(id);
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Edit a node's own fields. The parent link cannot be changed here; use
    /// [`Forest::reparent`].
    pub fn edit<R>(&mut self, id: N::Id, f: impl FnOnce(&mut N) -> R) -> ControlResult<R> {
        let kind = self.kind;
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| ControlError::not_found(kind, id))?;
        let parent = node.parent();
        let out = f(node);
        node.set_parent(parent);
        Ok(out)
    }

    /// Ordered chain from `id` up to its root, `id` first
    pub fn ancestors(&self, id: N::Id) -> ControlResult<Vec<N::Id>> {
        let mut chain = vec![self.require(id)?.id()];
        let mut cursor = self.nodes[&id].parent();
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.require(current)?.parent();
        }
        Ok(chain)
    }

    /// Whether `ancestor` is `id` itself or lies on its chain to the root
    pub fn is_ancestor_or_self(&self, ancestor: N::Id, id: N::Id) -> ControlResult<bool> {
        Ok(self.ancestors(id)?.contains(&ancestor))
    }

    /// Direct children of `id`, in id order
    pub fn children(&self, id: N::Id) -> Vec<N::Id> {
        self.children
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every node beneath `id`, breadth first, excluding `id`
    pub fn descendants(&self, id: N::Id) -> ControlResult<Vec<N::Id>> {
        self.require(id)?;
        let mut out = Vec::new();
        let mut queue: VecDeque<N::Id> = self.children(id).into();
        while let Some(next) = queue.pop_front() {
            out.push(next);
            queue.extend(self.children(next));
        }
        Ok(out)
    }

    /// Nodes without a parent
    pub fn roots(&self) -> Vec<N::Id> {
        self.nodes
            .values()
            .filter(|n| n.parent().is_none())
            .map(TreeNode::id)
            .collect()
    }

    /// Move `id` under `new_parent`. Rejected with `Cycle` when `new_parent`
    /// is `id` itself or one of its descendants; the forest is left untouched.
    pub fn reparent(&mut self, id: N::Id, new_parent: Option<N::Id>) -> ControlResult<()> {
        let old_parent = self.require(id)?.parent();

        if let Some(parent) = new_parent
            && self.is_ancestor_or_self(id, parent)?
        {
            return Err(ControlError::Cycle {
                kind: self.kind,
                id: id.to_string(),
                parent: parent.to_string(),
            });
        }

        if let Some(old) = old_parent
            && let Some(siblings) = self.children.get_mut(&old)
        {
            siblings.remove(&id);
            if siblings.is_empty() {
                self.children.remove(&old);
            }
        }
        if let Some(parent) = new_parent {
            self.children.entry(parent).or_default().insert(id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_parent(new_parent);
        }
        Ok(())
    }

    /// Remove a leaf node. Nodes with children are rejected with `HasChildren`.
    pub fn remove(&mut self, id: N::Id) -> ControlResult<N> {
        let parent = self.require(id)?.parent();
        let children = self.children.get(&id).map_or(0, BTreeSet::len);
        if children > 0 {
            return Err(ControlError::HasChildren {
                kind: self.kind,
                id: id.to_string(),
                children,
            });
        }

        if let Some(parent) = parent
            && let Some(siblings) = self.children.get_mut(&parent)
        {
            siblings.remove(&id);
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }
        self.nodes
            .remove(&id)
            .ok_or_else(|| ControlError::not_found(self.kind, id))
    }
}
