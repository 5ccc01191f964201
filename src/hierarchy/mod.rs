//! Hierarchy module
//!
//! Arena-backed forest shared by the classification taxonomy and the
//! compartment directory. Nodes are indexed by id and carry an optional
//! parent id; a children index is maintained alongside so that subtree
//! walks do not scan the whole arena.

pub mod forest;

pub use forest::{Forest, TreeNode};
