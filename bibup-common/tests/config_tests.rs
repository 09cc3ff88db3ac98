//! Integration tests for configuration loading and graceful degradation
//!
//! Covers:
//! - Missing per-user config → defaults, no failure
//! - Explicit config (CLI / env) must exist
//! - Write → load round trip through a real file
//!
//! Note: Uses serial_test to prevent env-var races between tests that touch
//! BIBUP_CONFIG.

use bibup_common::config::{
    load_config, load_toml_config, write_toml_config, ReenqueuePolicy, TomlConfig, CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use tempfile::TempDir;

#[test]
#[serial]
fn test_env_var_config_is_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.toml");

    let mut config = TomlConfig::default();
    config.server.port = 6001;
    config.queue.reenqueue_policy = ReenqueuePolicy::Merge;
    write_toml_config(&config, &path).unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let loaded = load_config(None, "bibup-queue");
    env::remove_var(CONFIG_ENV_VAR);

    let loaded = loaded.unwrap();
    assert_eq!(loaded.server.port, 6001);
    assert_eq!(loaded.queue.reenqueue_policy, ReenqueuePolicy::Merge);
}

#[test]
#[serial]
fn test_explicit_missing_config_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.toml");

    let result = load_config(Some(&missing), "bibup-queue");
    assert!(result.is_err(), "explicitly named config must exist");
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("env.toml");
    let cli_path = temp_dir.path().join("cli.toml");

    let mut env_config = TomlConfig::default();
    env_config.server.port = 7001;
    write_toml_config(&env_config, &env_path).unwrap();

    let mut cli_config = TomlConfig::default();
    cli_config.server.port = 7002;
    write_toml_config(&cli_config, &cli_path).unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let loaded = load_config(Some(&cli_path), "bibup-queue");
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(loaded.unwrap().server.port, 7002);
}

#[test]
fn test_malformed_toml_reports_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(&path, "[queue\noffline_recheck_secs = ").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, bibup_common::Error::Config(_)));
}

#[test]
fn test_write_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("queue.toml");

    write_toml_config(&TomlConfig::default(), &path).unwrap();
    assert_eq!(load_toml_config(&path).unwrap(), TomlConfig::default());
}

#[test]
#[serial]
fn test_zero_event_capacity_is_rejected() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.toml");
    std::fs::write(&path, "[queue]\nevent_capacity = 0\n").unwrap();

    let err = load_config(Some(&path), "bibup-queue").unwrap_err();
    assert!(matches!(err, bibup_common::Error::Config(_)));
    assert!(err.to_string().contains("event_capacity"));
}

#[test]
#[serial]
fn test_zero_offline_recheck_is_rejected() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.toml");
    std::fs::write(&path, "[queue]\noffline_recheck_secs = 0\n").unwrap();

    let err = load_config(Some(&path), "bibup-queue").unwrap_err();
    assert!(matches!(err, bibup_common::Error::Config(_)));
    assert!(err.to_string().contains("offline_recheck_secs"));
}
