//! Configuration System
//!
//! Handles loading configuration from TOML files and environment variables.
//! Environment variables override file settings.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSettings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub iterator: IteratorSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote service connection
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_url")]
    pub url: String,

    /// Stream path iterators are opened on
    #[serde(default = "default_iterate_path")]
    pub iterate_path: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_url() -> String {
    "ws://localhost:9090".to_string()
}

fn default_iterate_path() -> String {
    "/frame/iterate".to_string()
}

fn default_connect_timeout() -> u64 {
    10_000
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            iterate_path: default_iterate_path(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl ClientSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_gc_interval")]
    pub gc_interval_ms: u64,

    /// Unread, unheld series older than this are purged
    #[serde(default = "default_stale_threshold")]
    pub stale_entry_threshold_ms: u64,
}

fn default_gc_interval() -> u64 {
    30_000
}

fn default_stale_threshold() -> u64 {
    60_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            gc_interval_ms: default_gc_interval(),
            stale_entry_threshold_ms: default_stale_threshold(),
        }
    }
}

impl CacheConfig {
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    pub fn stale_entry_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_entry_threshold_ms)
    }
}

/// Iterator defaults
#[derive(Debug, Clone, Deserialize)]
pub struct IteratorSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Let the remote choose the step width when no span is given
    #[serde(default = "default_auto_span")]
    pub auto_span: bool,
}

fn default_chunk_size() -> u64 {
    100_000
}

fn default_auto_span() -> bool {
    true
}

impl Default for IteratorSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            auto_span: default_auto_span(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("telem").join("config.toml")),
            Some(PathBuf::from("/etc/telem/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `TELEM_*` overrides read through `lookup`. Unparseable numbers
    /// are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TELEM_URL") {
            self.client.url = url;
        }
        if let Some(size) = lookup("TELEM_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.iterator.chunk_size = size;
        }
        if let Some(ms) = lookup("TELEM_GC_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.cache.gc_interval_ms = ms;
        }
        if let Some(ms) = lookup("TELEM_STALE_THRESHOLD_MS").and_then(|v| v.parse().ok()) {
            self.cache.stale_entry_threshold_ms = ms;
        }
        if let Some(level) = lookup("TELEM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TELEM_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Telem Client Configuration
#
# Environment variables override these settings:
# - TELEM_URL
# - TELEM_CHUNK_SIZE
# - TELEM_GC_INTERVAL_MS
# - TELEM_STALE_THRESHOLD_MS
# - TELEM_LOG_LEVEL
# - TELEM_LOG_FORMAT

[client]
# WebSocket URL of the telemetry service
url = "ws://localhost:9090"

# Stream path iterators are opened on
iterate_path = "/frame/iterate"

# Connection timeout (ms)
connect_timeout_ms = 10000

[cache]
# How often the background GC runs (ms)
gc_interval_ms = 30000

# Series neither held nor read for this long are purged (ms)
stale_entry_threshold_ms = 60000

[iterator]
# Maximum samples per channel in one data response
chunk_size = 100000

# Let the remote cursor pick the step width
auto_span = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/telem/telem.log"
"#
    .to_string()
}
