/*!
 * Configuration types for Cirrus
 */

use cirrus_core_resilience::{RetryPolicy, ThrottleConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CloudError, Result};

/// Default device cloud endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.particle.io";

/// Main configuration for the cloud client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the device cloud API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Response timeout for every API request (milliseconds)
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Connect timeout for function and variable requests (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Extra attempts for a function call whose response timed out
    #[serde(default = "default_function_retry_count")]
    pub function_retry_count: u32,

    /// Delay between function call attempts (milliseconds)
    #[serde(default = "default_function_retry_delay_ms")]
    pub function_retry_delay_ms: u64,

    /// Enforce a minimum interval between calls to the same endpoint
    #[serde(default = "default_true")]
    pub throttle_enabled: bool,

    /// Minimum interval between calls to the same endpoint (seconds)
    #[serde(default = "default_throttle_window_secs")]
    pub throttle_window_secs: u64,

    /// Number of distinct endpoints the throttle tracks
    #[serde(default = "default_throttle_cache_size")]
    pub throttle_cache_size: usize,

    /// Skip TLS certificate verification (transport trust decision)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Directory holding persisted credentials (None = ~/.cirrus)
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            http_timeout_ms: default_http_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            function_retry_count: default_function_retry_count(),
            function_retry_delay_ms: default_function_retry_delay_ms(),
            throttle_enabled: true,
            throttle_window_secs: default_throttle_window_secs(),
            throttle_cache_size: default_throttle_cache_size(),
            accept_invalid_certs: false,
            store_dir: None,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_http_timeout_ms() -> u64 {
    8000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_function_retry_count() -> u32 {
    1
}

fn default_function_retry_delay_ms() -> u64 {
    750
}

fn default_throttle_window_secs() -> u64 {
    10
}

fn default_throttle_cache_size() -> usize {
    10
}

impl CloudConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| CloudError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CloudError::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Retry budget applied to function calls
    pub fn function_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.function_retry_count,
            Duration::from_millis(self.function_retry_delay_ms),
        )
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            enabled: self.throttle_enabled,
            window: Duration::from_secs(self.throttle_window_secs),
            capacity: self.throttle_cache_size,
        }
    }

    /// Resolved credential directory
    pub fn resolved_store_dir(&self) -> Option<PathBuf> {
        self.store_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cirrus")))
    }
}

/// Default configuration file location (~/.cirrus/cirrus.toml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cirrus").join("cirrus.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CloudConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.http_timeout(), Duration::from_secs(8));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert!(config.throttle_enabled);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_function_retry_policy() {
        let config = CloudConfig::default();
        let policy = config.function_retry_policy();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.delay, Duration::from_millis(750));
    }

    #[test]
    fn test_throttle_config() {
        let config = CloudConfig {
            throttle_enabled: false,
            throttle_window_secs: 30,
            throttle_cache_size: 4,
            ..Default::default()
        };
        let throttle = config.throttle_config();
        assert!(!throttle.enabled);
        assert_eq!(throttle.window, Duration::from_secs(30));
        assert_eq!(throttle.capacity, 4);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
api_base_url = "https://cloud.example.test"
function_retry_count = 3
throttle_window_secs = 5
log_level = "debug"
"#;

        let config: CloudConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_base_url, "https://cloud.example.test");
        assert_eq!(config.function_retry_count, 3);
        assert_eq!(config.throttle_window_secs, 5);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.http_timeout_ms, 8000);
        assert_eq!(config.throttle_cache_size, 10);
        assert!(config.throttle_enabled);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cirrus.toml");
        let config = CloudConfig {
            accept_invalid_certs: true,
            store_dir: Some(dir.path().join("store")),
            ..Default::default()
        };

        config.to_file(&path).unwrap();
        let loaded = CloudConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = CloudConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CloudConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "throttle_window_secs = \"soon\"").unwrap();
        assert!(matches!(
            CloudConfig::from_file(&path),
            Err(CloudError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_store_dir_wins() {
        let config = CloudConfig {
            store_dir: Some(PathBuf::from("/var/lib/cirrus")),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_store_dir(),
            Some(PathBuf::from("/var/lib/cirrus"))
        );
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
