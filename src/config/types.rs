//! Configuration types for release-control
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::taxonomy::ClassificationId;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persisted state location
    pub store: StoreConfig,

    /// Classification gate
    pub clearance: ClearanceConfig,

    /// Closure memoization
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Persisted state configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// State file; `.json` or `.toml`
    pub state_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("release-control.json"),
        }
    }
}

/// How classification is gated before the compartment checks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Deny every classification (fail closed)
    #[default]
    Deny,
    /// Treat classification as descriptive only
    Allow,
    /// Role-derived clearances from `[clearance.roles]`
    Roles,
}

/// Classification gate configuration
///
/// In `roles` mode a role's `grant` covers the listed classifications and
/// every classification beneath them. `deny` patterns are matched against a
/// classification's abbreviation and title and take precedence over grants
/// from any role.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClearanceConfig {
    pub mode: GateMode,

    /// Per-role clearances
    #[serde(default)]
    pub roles: HashMap<String, RoleClearanceConfig>,
}

/// Clearance held by one role
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleClearanceConfig {
    /// Granted subtrees of the taxonomy
    #[serde(default)]
    pub grant: Vec<ClassificationId>,

    /// Deny patterns (regex)
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Closure memoization
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep principal closures across requests until the directory changes
    pub closure: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { closure: true }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
