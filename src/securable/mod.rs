//! Securable object model
//!
//! Every protected entity (document, file, feed, collector, scraper,
//! submission) carries one classification reference, a need-to-know
//! (`eyes_only`) compartment set and a releasability (`releasable_to`)
//! compartment set. Files nest under a document and carry three independent
//! override flags deciding, per dimension, whether they use their own value
//! or inherit the document's.

pub mod inherit;
pub mod objects;
pub mod store;
pub mod types;

pub use inherit::resolve_effective;
pub use objects::{Document, File, StoredObject, TopLevelObject};
pub use store::{ObjectStore, ReferenceIndex};
pub use types::{
    EffectiveAttributes, ObjectId, ObjectKind, Overrides, Securable, SecurityAttributes,
};
