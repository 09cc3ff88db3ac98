//! Runtime configuration for bibup-queue
//!
//! Port and database path resolve in priority order:
//! 1. Command-line argument
//! 2. Environment variable (`BIBUP_PORT`, `BIBUP_DATABASE`)
//! 3. TOML config file
//! 4. Compiled default (via the TOML defaults)

use bibup_common::config::{QueueSettings, ReenqueuePolicy, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;

pub const PORT_ENV_VAR: &str = "BIBUP_PORT";
pub const DATABASE_ENV_VAR: &str = "BIBUP_DATABASE";

/// Queue processor behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Wait between connectivity checks while offline
    pub offline_recheck_interval: Duration,
    pub reenqueue_policy: ReenqueuePolicy,
    /// Row message while a lookup is in flight
    pub processing_message: String,
    /// Row message for failures that are not user-facing alerts
    pub error_message: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::from(&QueueSettings::default())
    }
}

impl From<&QueueSettings> for QueueConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            offline_recheck_interval: Duration::from_secs(settings.offline_recheck_secs),
            reenqueue_policy: settings.reenqueue_policy,
            processing_message: settings.processing_message.clone(),
            error_message: settings.error_message.clone(),
        }
    }
}

/// Resolve the HTTP port: CLI → env → TOML
pub fn resolve_port(cli_port: Option<u16>, toml: &TomlConfig) -> u16 {
    if let Some(port) = cli_port {
        return port;
    }

    if let Ok(value) = std::env::var(PORT_ENV_VAR) {
        match value.parse::<u16>() {
            Ok(port) => return port,
            Err(_) => tracing::warn!(value = %value, "Ignoring invalid {}", PORT_ENV_VAR),
        }
    }

    toml.server.port
}

/// Resolve the database path: CLI → env → TOML → default location
pub fn resolve_database_path(cli_path: Option<PathBuf>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    if let Ok(value) = std::env::var(DATABASE_ENV_VAR) {
        if !value.is_empty() {
            return PathBuf::from(value);
        }
    }

    toml.database.resolved_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.offline_recheck_interval, Duration::from_secs(60));
        assert_eq!(config.reenqueue_policy, ReenqueuePolicy::Replace);
        assert_eq!(config.processing_message, "Processing");
    }

    #[test]
    fn test_queue_config_from_settings() {
        let settings = QueueSettings {
            offline_recheck_secs: 5,
            reenqueue_policy: ReenqueuePolicy::Merge,
            ..QueueSettings::default()
        };
        let config = QueueConfig::from(&settings);
        assert_eq!(config.offline_recheck_interval, Duration::from_secs(5));
        assert_eq!(config.reenqueue_policy, ReenqueuePolicy::Merge);
    }

    #[test]
    fn test_cli_takes_priority() {
        let toml = TomlConfig::default();
        assert_eq!(resolve_port(Some(9000), &toml), 9000);
        assert_eq!(
            resolve_database_path(Some(PathBuf::from("/tmp/x.db")), &toml),
            PathBuf::from("/tmp/x.db")
        );
    }
}
