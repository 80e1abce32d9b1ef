//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::{ListenerConfig, Schedule};
use crate::storage::DEFAULT_PREFIX;

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default schedule: one window every 5 minutes at second 0.
pub const DEFAULT_CRON: &str = "0 */5 * * * *";

/// Default directory for stored records.
pub const DEFAULT_STORAGE_ROOT: &str = "data";

fn default_storage_root() -> String {
    DEFAULT_STORAGE_ROOT.to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Record storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory the file store is rooted at (default: "data").
    #[serde(default = "default_storage_root")]
    pub root: String,

    /// Key prefix for window records (default: "occupancy_data").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            prefix: default_prefix(),
        }
    }
}

// =============================================================================
// Schedule Configuration
// =============================================================================

/// When windows are started. `interval` and `cron` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Fixed interval between window starts.
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,

    /// Cron expression (6-field, seconds first).
    #[serde(default)]
    pub cron: Option<String>,
}

impl ScheduleConfig {
    /// Resolve to a [`Schedule`], defaulting to [`DEFAULT_CRON`].
    pub fn to_schedule(&self) -> Result<Schedule, ConfigError> {
        match (self.interval, self.cron.as_deref()) {
            (Some(_), Some(_)) => Err(ConfigError::ValidationError(
                "schedule cannot specify both interval and cron".to_string(),
            )),
            (Some(interval), None) => Ok(Schedule::interval(interval)),
            (None, cron) => Schedule::cron(cron.unwrap_or(DEFAULT_CRON))
                .map_err(|e| ConfigError::ValidationError(format!("schedule: {e}"))),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Schedule configuration.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file without validating it.
    ///
    /// Callers apply their overrides and then call [`AppConfig::validate`].
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse YAML text after expanding `${VAR}` references, without validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(&expand_env_vars(content))?)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listener
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("listener: {e}")))?;

        if self.listener.message_timeout > self.listener.window {
            return Err(ConfigError::ValidationError(
                "listener message_timeout must not exceed window".to_string(),
            ));
        }

        if self.storage.root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage root cannot be empty".to_string(),
            ));
        }

        if self.storage.prefix.split('/').any(|part| part == "..") {
            return Err(ConfigError::ValidationError(format!(
                "storage prefix cannot contain '..': '{}'",
                self.storage.prefix
            )));
        }

        self.schedule.to_schedule()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
listener:
  endpoint: wss://badi-public.crowdmonitor.ch:9591/api
  target_uid: SSD-7
  window: 5m
  message_timeout: 1s
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.listener.target_uid, "SSD-7");
        assert_eq!(config.listener.window, Duration::from_secs(300));
        assert_eq!(config.listener.message_timeout, Duration::from_secs(1));
        assert_eq!(config.listener.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.storage, StorageConfig::default());
        assert_eq!(
            config.schedule.to_schedule().unwrap(),
            Schedule::Cron(DEFAULT_CRON.to_string())
        );
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
listener:
  endpoint: ws://127.0.0.1:9591/api
  target_uid: SSD-4
  window: 2m
  message_timeout: 2s
  connect_timeout: 3s
storage:
  root: /var/lib/fillwatch
  prefix: archive/occupancy
schedule:
  interval: 10m
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.listener.window, Duration::from_secs(120));
        assert_eq!(config.listener.message_timeout, Duration::from_secs(2));
        assert_eq!(config.listener.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.storage.root, "/var/lib/fillwatch");
        assert_eq!(config.storage.prefix, "archive/occupancy");
        assert_eq!(
            config.schedule.to_schedule().unwrap(),
            Schedule::Interval(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_window_timings_required() {
        let yaml = r#"
listener:
  endpoint: ws://localhost:9591/api
  target_uid: SSD-7
"#;
        let err = AppConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().contains("window"));
    }

    #[test]
    fn test_env_expansion_with_default() {
        let yaml = r#"
listener:
  endpoint: ${FILLWATCH_UNSET_ENDPOINT_12345:-ws://localhost:9591/api}
  target_uid: SSD-7
  window: 5m
  message_timeout: 1s
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.listener.endpoint, "ws://localhost:9591/api");
    }

    #[test]
    fn test_interval_cron_conflict() {
        let yaml = format!("{MINIMAL}schedule:\n  interval: 5m\n  cron: \"0 * * * * *\"\n");
        let err = AppConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("both interval and cron"));
    }

    #[test]
    fn test_invalid_cron() {
        let yaml = format!("{MINIMAL}schedule:\n  cron: every five minutes\n");
        let err = AppConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("invalid cron"));
    }

    #[test]
    fn test_invalid_endpoint() {
        let yaml = MINIMAL.replace("wss://", "https://");
        let err = AppConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("listener"));
    }

    #[test]
    fn test_message_timeout_exceeds_window() {
        let yaml = MINIMAL
            .replace("window: 5m", "window: 1s")
            .replace("message_timeout: 1s", "message_timeout: 5s");
        let err = AppConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("must not exceed window"));
    }

    #[test]
    fn test_escaping_prefix_rejected() {
        let yaml = format!("{MINIMAL}storage:\n  prefix: ../outside\n");
        let err = AppConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("'..'"));
    }

    #[test]
    fn test_load_defers_validation_to_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let yaml = MINIMAL.replace(
            "wss://badi-public.crowdmonitor.ch:9591/api",
            "'${FILLWATCH_UNSET_ENDPOINT_67890}'",
        );
        std::fs::write(&path, yaml).unwrap();

        let mut config = AppConfig::load(&path).unwrap();
        assert_eq!(config.listener.endpoint, "");
        assert!(config.validate().is_err());

        config.listener.endpoint = "ws://127.0.0.1:9591/api".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("/nonexistent/fillwatch.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
