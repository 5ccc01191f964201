//! Release Control
//!
//! Compartmented access control for documents and the other securable
//! objects of an intelligence platform.
//!
//! ## Features
//!
//! - **Classification taxonomy** - a forest of sensitivity labels with a single root default
//! - **Compartment directory** - a forest of groups; members belong to every ancestor of their groups
//! - **Need-to-know and releasability** - `eyes_only` requires every group, `releasable_to` any one
//! - **Per-dimension inheritance** - files override classification, eyes-only and releasability independently
//! - **Pluggable classification gate** - fail-closed by default, or role clearances from configuration
//!
//! ## Decision Model
//!
//! ```text
//! classification gate → eyes_only ⊆ closure → releasable_to ∩ closure ≠ ∅
//! ```
//!
//! The first failing check is the recorded deny reason. A deny is a normal
//! outcome, not an error; any store fault is an error and must be treated
//! as a deny by the caller.
//!
//! ## Example Configuration
//!
//! ```toml
//! [store]
//! state_path = "release-control.json"
//!
//! [clearance]
//! mode = "roles"                  # deny | allow | roles
//!
//! [clearance.roles.analyst]
//! grant = [2]                     # Internal and everything beneath it
//! deny = ["^NOFORN$"]             # never, whatever other roles grant
//! ```

pub mod access_control;
pub mod config;
pub mod directory;
pub mod error;
pub mod hierarchy;
pub mod securable;
pub mod service;
pub mod snapshot;
pub mod taxonomy;
pub mod util;

// Re-export main types
pub use access_control::{Decision, DenyReason, Principal};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use service::{ReleaseControl, Restrictions};
pub use snapshot::Snapshot;
