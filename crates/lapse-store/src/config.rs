//! Configuration for the session store.
//!
//! [`StoreOptions`] is the loose, deserializable form (every field optional,
//! durations in milliseconds). [`StoreConfig`] is the validated form the
//! store is constructed from and never changes afterwards.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default table name.
pub const DEFAULT_TABLE: &str = "session";

/// Default max-age for sessions that carry no max-age hint (1 day).
pub const DEFAULT_BROWSER_SESSIONS_MAX_AGE: Duration = Duration::from_millis(86_400_000);

/// Default interval between expiration sweeps.
pub const DEFAULT_CLEAR_INTERVAL: Duration = Duration::from_millis(60_000);

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating store options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML, including values of the wrong kind.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not acceptable.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Raw store options as they appear in a config file.
///
/// ```toml
/// table = "session"
/// browser_sessions_max_age = 86400000
/// clear_interval = 60000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Table holding the session records.
    pub table: Option<String>,

    /// Max-age in milliseconds for sessions without their own hint.
    pub browser_sessions_max_age: Option<u64>,

    /// Sweep period in milliseconds.
    pub clear_interval: Option<u64>,
}

impl StoreOptions {
    /// Parse options from a TOML string.
    pub fn from_toml(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }
}

/// Validated, immutable store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    table: String,
    browser_sessions_max_age: Duration,
    clear_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            browser_sessions_max_age: DEFAULT_BROWSER_SESSIONS_MAX_AGE,
            clear_interval: DEFAULT_CLEAR_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from raw options, filling in defaults.
    pub fn from_options(options: StoreOptions) -> Result<Self> {
        let mut config = Self::default();
        if let Some(table) = options.table {
            config.table = table;
        }
        if let Some(ms) = options.browser_sessions_max_age {
            config.browser_sessions_max_age = Duration::from_millis(ms);
        }
        if let Some(ms) = options.clear_interval {
            config.clear_interval = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_options(StoreOptions::from_toml(&content)?)
    }

    /// Set the table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the default max-age.
    pub fn with_browser_sessions_max_age(mut self, max_age: Duration) -> Self {
        self.browser_sessions_max_age = max_age;
        self
    }

    /// Set the sweep period.
    pub fn with_clear_interval(mut self, interval: Duration) -> Self {
        self.clear_interval = interval;
        self
    }

    /// Table holding the session records.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Max-age applied when a session carries no hint of its own.
    pub fn browser_sessions_max_age(&self) -> Duration {
        self.browser_sessions_max_age
    }

    /// Sweep period.
    pub fn clear_interval(&self) -> Duration {
        self.clear_interval
    }

    /// Check every value. Called by the store before any backend call.
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(ConfigError::Invalid {
                field: "table",
                reason: "must not be empty".to_string(),
            });
        }
        // Table names end up in SQL statements for some backends.
        if !self
            .table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid {
                field: "table",
                reason: format!("'{}' may only contain [A-Za-z0-9_]", self.table),
            });
        }
        if self.browser_sessions_max_age.is_zero() {
            return Err(ConfigError::Invalid {
                field: "browser_sessions_max_age",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.clear_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "clear_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.table(), "session");
        assert_eq!(config.browser_sessions_max_age(), Duration::from_secs(86_400));
        assert_eq!(config.clear_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_options_fills_defaults() {
        let options = StoreOptions {
            table: Some("web_sessions".to_string()),
            ..Default::default()
        };
        let config = StoreConfig::from_options(options).unwrap();
        assert_eq!(config.table(), "web_sessions");
        assert_eq!(config.clear_interval(), DEFAULT_CLEAR_INTERVAL);
    }

    #[test]
    fn test_parse_toml() {
        let options = StoreOptions::from_toml(
            r#"
            table = "sessions"
            browser_sessions_max_age = 3600000
            clear_interval = 5000
            "#,
        )
        .unwrap();
        let config = StoreConfig::from_options(options).unwrap();
        assert_eq!(config.table(), "sessions");
        assert_eq!(config.browser_sessions_max_age(), Duration::from_secs(3600));
        assert_eq!(config.clear_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_wrong_kind_is_parse_error() {
        let result = StoreOptions::from_toml(r#"clear_interval = "soon""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let result = StoreOptions::from_toml(r#"clear_interval = -5"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = StoreOptions::from_toml(r#"tabel = "session""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_values() {
        let err = StoreConfig::new().with_table("").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "table", .. }));

        let err = StoreConfig::new()
            .with_table("session; DROP TABLE x")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "table", .. }));

        let err = StoreConfig::new()
            .with_clear_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "clear_interval",
                ..
            }
        ));

        let options = StoreOptions {
            browser_sessions_max_age: Some(0),
            ..Default::default()
        };
        assert!(StoreConfig::from_options(options).is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lapse.toml");
        std::fs::write(&path, "table = \"from_file\"\n").unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.table(), "from_file");

        let missing = StoreConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
