//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (RELEASE_CONTROL__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::{AppConfig, GateMode};
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "release-control.toml",
    ".release-control.toml",
    "~/.config/release-control/config.toml",
    "/etc/release-control/config.toml",
];

/// Shortcut for `store.state_path`
const STATE_ENV_VAR: &str = "RELEASE_CONTROL_STATE";

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with RELEASE_CONTROL__ prefix
    // e.g., RELEASE_CONTROL__CLEARANCE__MODE, RELEASE_CONTROL__LOGGING__LEVEL
    // Double underscore (__) maps to nested keys (clearance.mode)
    builder = builder.add_source(
        Environment::with_prefix("RELEASE_CONTROL")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    // 4. State path shortcut, unless the namespaced variable already set it
    if std::env::var("RELEASE_CONTROL__STORE__STATE_PATH").is_err()
        && let Ok(path) = std::env::var(STATE_ENV_VAR)
    {
        builder = builder
            .set_override("store.state_path", path)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.store.state_path.as_os_str().is_empty() {
        return Err(ConfigError::Missing {
            field: "store.state_path".to_string(),
        });
    }

    if config.clearance.mode == GateMode::Roles && config.clearance.roles.is_empty() {
        return Err(ConfigError::Invalid {
            message: "clearance.mode = \"roles\" requires at least one [clearance.roles.<name>]"
                .to_string(),
        });
    }

    for (role, clearance) in &config.clearance.roles {
        validate_patterns(&clearance.deny, &format!("clearance.roles.{}.deny", role))?;
    }

    Ok(())
}

/// Validate that all patterns are valid regex
fn validate_patterns(patterns: &[String], field_path: &str) -> Result<(), ConfigError> {
    for pattern in patterns {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: format!("in {}: {}", field_path, e),
            });
        }
    }
    Ok(())
}
