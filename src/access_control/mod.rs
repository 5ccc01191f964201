//! Access control module
//!
//! Implements the release-control decision: a classification gate followed
//! by need-to-know (`eyes_only`, every group required) and releasability
//! (`releasable_to`, any one group suffices) compartment checks against the
//! principal's upward group closure.

pub mod context;
pub mod gate;
pub mod patterns;
pub mod resolver;
pub mod types;

pub use context::AccessContext;
pub use gate::{AllowAll, ClassificationGate, ClearancePolicy, FailClosed, gate_from_config};
pub use patterns::PatternMatcher;
pub use resolver::{ReleaseResolver, evaluate};
pub use types::{Decision, DenyReason, Dimension, Principal};
