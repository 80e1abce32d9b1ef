//! Configuration module for Fillwatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Listener settings (endpoint, target, window and timeouts)
//! - Storage settings (record directory, key prefix)
//! - Schedule (interval or cron)

mod app;
mod validation;

pub use app::{
    AppConfig, DEFAULT_CRON, DEFAULT_STORAGE_ROOT, ScheduleConfig, StorageConfig,
};
pub use validation::{ConfigError, expand_env_vars, parse_duration};
