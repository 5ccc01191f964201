//! Error types for release-control
//!
//! This module defines the error hierarchy used throughout the crate.
//! A denied access check is not an error: `check_access` returns a
//! [`Decision`](crate::access_control::Decision). Only `require_access`
//! turns a deny into an [`AccessDeniedError`].

use crate::access_control::DenyReason;
use std::fmt;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Control(#[from] ControlError),

    #[error("Access denied: {0}")]
    AccessDenied(#[from] AccessDeniedError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Backing-store faults.
///
/// These are never a normal outcome. Callers treat them as fatal for the
/// request and deny access.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{store} lock poisoned")]
    Poisoned { store: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Unsupported state file format: {0}")]
    UnsupportedFormat(String),
}

/// Kind of record an administrative or resolution error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Classification,
    Group,
    Object,
}

impl EntityKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Classification => "classification",
            EntityKind::Group => "group",
            EntityKind::Object => "object",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural and resolution errors of the release-control model
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("cannot move {kind} {id} under {parent}: {parent} is {id} or one of its descendants")]
    Cycle {
        kind: EntityKind,
        id: String,
        parent: String,
    },

    #[error("{kind} {id} is still referenced {references} time(s)")]
    InUse {
        kind: EntityKind,
        id: String,
        references: usize,
    },

    #[error("{kind} {id} still has {children} child(ren)")]
    HasChildren {
        kind: EntityKind,
        id: String,
        children: usize,
    },

    #[error("invalid default {kind} {id}: {reason}")]
    InvalidDefault {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error("no default {kind} is configured")]
    NoDefault { kind: EntityKind },

    #[error("{object} inherits from a parent that was not supplied")]
    MissingParent { object: String },

    #[error("{object} has no classification")]
    Unclassified { object: String },

    #[error("invalid request: {message}")]
    Invalid { message: String },

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl ControlError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        ControlError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether this error came from the backing store rather than the model
    pub fn is_store_fault(&self) -> bool {
        matches!(self, ControlError::Store(_))
    }
}

/// Access denied for a securable object
#[derive(Error, Debug)]
#[error("access denied to {object}: {reason}")]
pub struct AccessDeniedError {
    pub object: String,
    pub reason: DenyReason,
}

impl AccessDeniedError {
    pub fn new(object: impl Into<String>, reason: DenyReason) -> Self {
        Self {
            object: object.into(),
            reason,
        }
    }

    /// Message safe to show an end user. The failing dimension is for audit only.
    pub fn public_message(&self) -> &'static str {
        "forbidden"
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for model operations
pub type ControlResult<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_fault_detection() {
        let err = ControlError::from(StoreError::Poisoned { store: "directory" });
        assert!(err.is_store_fault());
        assert!(!ControlError::not_found(EntityKind::Group, 7).is_store_fault());
    }

    #[test]
    fn test_error_messages() {
        let err = ControlError::Cycle {
            kind: EntityKind::Classification,
            id: "1".into(),
            parent: "3".into(),
        };
        assert!(err.to_string().contains("classification 1"));

        let err = ControlError::InUse {
            kind: EntityKind::Group,
            id: "4".into(),
            references: 2,
        };
        assert!(err.to_string().contains("2 time(s)"));
    }

    #[test]
    fn test_access_denied_hides_reason_publicly() {
        let err = AccessDeniedError::new(
            "document 1",
            DenyReason::ReleasableTo {
                releasable_to: Default::default(),
            },
        );
        assert_eq!(err.public_message(), "forbidden");
        assert!(err.to_string().contains("releasable_to"));
    }
}
