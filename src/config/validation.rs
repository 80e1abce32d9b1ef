//! Configuration errors and parsing helpers.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Errors raised while loading `fillwatch` configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// The YAML did not match the expected shape (including missing required fields).
    #[error("invalid config YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A field parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Parse a window or timeout length such as `5m`, `300s` or `1m30s`.
///
/// Used for the `--window` override and anywhere a bare duration string is read.
///
/// # Examples
///
/// ```
/// use fillwatch::config::parse_duration;
///
/// assert_eq!(parse_duration("5m").unwrap().as_secs(), 300);
/// assert_eq!(parse_duration("1m30s").unwrap().as_secs(), 90);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    match s.trim() {
        "" => Err("expected a duration like 5m or 300s".to_string()),
        value => humantime::parse_duration(value).map_err(|e| format!("'{value}': {e}")),
    }
}

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Expand `${VAR}` and `${VAR:-default}` references from the process environment.
///
/// Unset variables without a default expand to the empty string, which the
/// listener validation then rejects for required fields.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIPPED_CONFIG: &str = include_str!("../../configs/config.yaml");

    #[test]
    fn test_parse_window_lengths() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_duration_rejects_bare_numbers() {
        let err = parse_duration("300").unwrap_err();
        assert!(err.contains("'300'"));
        assert!(parse_duration("  ").unwrap_err().contains("5m"));
        assert!(parse_duration("five minutes").is_err());
    }

    #[test]
    fn test_shipped_config_expands_to_defaults() {
        let expanded = expand_env_vars(SHIPPED_CONFIG);
        assert!(!expanded.contains("${"));
        if std::env::var("FILLWATCH_TARGET_UID").is_err() {
            assert!(expanded.contains(r#"target_uid: "SSD-7""#));
        }
        if std::env::var("FILLWATCH_ENDPOINT").is_err() {
            assert!(expanded.contains(r#"endpoint: "wss://badi-public.crowdmonitor.ch:9591/api""#));
        }
    }

    #[test]
    fn test_unset_without_default_is_empty() {
        assert_eq!(
            expand_env_vars("target_uid: '${FILLWATCH_UNSET_UID_12345}'"),
            "target_uid: ''"
        );
    }

    #[test]
    fn test_env_overrides_default() {
        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("FILLWATCH_TEST_TARGET_UID", "SSD-4");
        }
        let result = expand_env_vars("target_uid: ${FILLWATCH_TEST_TARGET_UID:-SSD-7}");
        assert_eq!(result, "target_uid: SSD-4");
        // SAFETY: as above.
        unsafe {
            std::env::remove_var("FILLWATCH_TEST_TARGET_UID");
        }
    }
}
