//! Release-control service
//!
//! The entry point for consuming services: access checks, effective
//! restrictions for display, and the administrative surface.

pub mod control;
pub mod types;

pub use control::ReleaseControl;
pub use types::Restrictions;
