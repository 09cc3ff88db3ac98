//! Configuration loading and config file resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`~/.config/bibup/<module>.toml`)
//! 4. Compiled defaults (fallback, no file)
//!
//! A missing per-user file is not an error; a missing file named explicitly on
//! the command line or in the environment is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BIBUP_CONFIG";

/// Complete TOML configuration for a bibup module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub metadata: MetadataConfig,
    pub queue: QueueSettings,
    pub logging: LoggingConfig,
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5731,
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the per-user data directory
    pub path: Option<PathBuf>,
    /// Upper bound for lock-contention retries (milliseconds)
    pub max_lock_wait_ms: Option<u64>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_database_path)
    }
}

/// `[metadata]` section: the external lookup service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Minimum spacing between lookups (0 disables rate limiting)
    pub rate_limit_ms: u64,
    /// Seconds between reachability checks of `base_url` (0 disables the probe)
    pub probe_interval_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1969".to_string(),
            timeout_secs: 30,
            rate_limit_ms: 0,
            probe_interval_secs: 30,
        }
    }
}

/// What a second enqueue of a non-processing row does with its reviewed state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReenqueuePolicy {
    /// Fresh row; previous diffs and acceptance are dropped
    #[default]
    Replace,
    /// Fresh row that keeps previous diffs so acceptance decisions carry over
    Merge,
}

/// `[queue]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub offline_recheck_secs: u64,
    pub reenqueue_policy: ReenqueuePolicy,
    pub processing_message: String,
    pub error_message: String,
    pub event_capacity: usize,
    /// JSON item-type schema; the built-in schema is used when unset
    pub schema_path: Option<PathBuf>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            offline_recheck_secs: 60,
            reenqueue_policy: ReenqueuePolicy::Replace,
            processing_message: "Processing".to_string(),
            error_message: "An error occurred while updating metadata".to_string(),
            event_capacity: 100,
            schema_path: None,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing EnvFilter directive, e.g. "info" or "bibup_queue=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Per-user config file path for a module (`~/.config/bibup/<module>.toml`)
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bibup").join(format!("{}.toml", module_name)))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bibup"))
        .unwrap_or_else(|| PathBuf::from("./bibup_data"))
        .join("bibup.db")
}

/// Resolve which config file to read, if any
///
/// Returns `(path, explicit)` where `explicit` is true when the path came from
/// the command line or environment.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    module_name: &str,
) -> Option<(PathBuf, bool)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), true));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), true));
        }
    }

    // Priority 3: Per-user config file
    default_config_path(module_name).map(|p| (p, false))
}

impl TomlConfig {
    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue.event_capacity == 0 {
            return Err(Error::Config(
                "queue.event_capacity must be greater than 0".to_string(),
            ));
        }
        if self.queue.offline_recheck_secs == 0 {
            return Err(Error::Config(
                "queue.offline_recheck_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config
        .validate()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Write a config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load configuration for a module using the documented priority order
pub fn load_config(cli_arg: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg, CONFIG_ENV_VAR, module_name) {
        Some((path, true)) => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        Some((path, false)) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        Some((path, false)) => {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}
