//! Compartment directory
//!
//! Groups double as organizational units and as compartment tags on
//! securable objects. A principal is a member of every group it is directly
//! assigned to and of every ancestor of those groups (upward closure only:
//! belonging to a parent grants nothing in its sub-groups).

pub mod cache;
pub mod store;
pub mod types;

pub use cache::ClosureCache;
pub use store::GroupDirectory;
pub use types::{Group, GroupDraft, GroupId, GroupPatch, Member, PrincipalId};
