//! Configuration loading tests

use release_control::config::{GateMode, LogFormat, load_config, load_config_from_str};
use release_control::error::ConfigError;
use release_control::taxonomy::ClassificationId;
use std::path::PathBuf;

const MINIMAL_CONFIG: &str = r#"
[clearance]
mode = "allow"
"#;

const FULL_CONFIG: &str = r#"
[store]
state_path = "/var/lib/release-control/state.toml"

[clearance]
mode = "roles"

[clearance.roles.analyst]
grant = [2, 5]

[clearance.roles.contractor]
grant = [2]
deny = ["^NOFORN$", "(?i)exercise"]

[cache]
closure = false

[logging]
level = "debug"
format = "json"
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();
    assert_eq!(config.clearance.mode, GateMode::Allow);
    assert_eq!(config.store.state_path, PathBuf::from("release-control.json"));
    assert!(config.cache.closure);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_empty_config_fails_closed() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.clearance.mode, GateMode::Deny);
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    assert_eq!(
        config.store.state_path,
        PathBuf::from("/var/lib/release-control/state.toml")
    );
    assert_eq!(config.clearance.mode, GateMode::Roles);
    assert_eq!(config.clearance.roles.len(), 2);
    assert_eq!(
        config.clearance.roles["analyst"].grant,
        vec![ClassificationId(2), ClassificationId(5)]
    );
    assert_eq!(config.clearance.roles["contractor"].deny.len(), 2);
    assert!(!config.cache.closure);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_invalid_mode() {
    let result = load_config_from_str("[clearance]\nmode = \"sometimes\"\n");
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_invalid_deny_pattern() {
    let config_str = r#"
[clearance]
mode = "roles"

[clearance.roles.analyst]
deny = ["(unclosed"]
"#;

    let result = load_config_from_str(config_str);
    assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
}

#[test]
fn test_explicit_missing_file() {
    let result = load_config(Some("/nonexistent/release-control.toml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
#[serial_test::serial]
fn test_env_var_overrides_file() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("RELEASE_CONTROL__CLEARANCE__MODE", "deny");
        env::set_var("RELEASE_CONTROL__LOGGING__LEVEL", "warn");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert_eq!(config.clearance.mode, GateMode::Deny);
    assert_eq!(config.logging.level, "warn");

    unsafe {
        env::remove_var("RELEASE_CONTROL__CLEARANCE__MODE");
        env::remove_var("RELEASE_CONTROL__LOGGING__LEVEL");
    }
}

#[test]
#[serial_test::serial]
fn test_state_shortcut_env_var() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::remove_var("RELEASE_CONTROL__STORE__STATE_PATH");
        env::set_var("RELEASE_CONTROL_STATE", "/tmp/shortcut.json");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.store.state_path, PathBuf::from("/tmp/shortcut.json"));

    unsafe {
        env::remove_var("RELEASE_CONTROL_STATE");
    }
}

#[test]
#[serial_test::serial]
fn test_namespaced_state_path_beats_shortcut() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("RELEASE_CONTROL__STORE__STATE_PATH", "/tmp/namespaced.toml");
        env::set_var("RELEASE_CONTROL_STATE", "/tmp/shortcut.json");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(
        config.store.state_path,
        PathBuf::from("/tmp/namespaced.toml")
    );

    unsafe {
        env::remove_var("RELEASE_CONTROL__STORE__STATE_PATH");
        env::remove_var("RELEASE_CONTROL_STATE");
    }
}
