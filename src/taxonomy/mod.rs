//! Classification taxonomy
//!
//! A forest of organizational sensitivity labels. Documents, files and feeds
//! reference a classification; they never own it.
//!
//! ## Invariants
//!
//! - The parent relation is acyclic.
//! - At most one classification is the default, and it is a root.
//! - A classification that has children, or is referenced by any securable
//!   object, cannot be deleted.

pub mod store;
pub mod types;

pub use store::ClassificationStore;
pub use types::{Classification, ClassificationDraft, ClassificationId, ClassificationPatch};
