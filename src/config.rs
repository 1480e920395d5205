//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides. The
//! resulting `Config` is resolved once at startup and injected everywhere
//! an endpoint is needed.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analysis service endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_analyze_path")]
    pub analyze_path: String,

    #[serde(default = "default_history_path")]
    pub history_path: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_analyze_path() -> String {
    "/analyze".to_string()
}

fn default_history_path() -> String {
    "/history".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            analyze_path: default_analyze_path(),
            history_path: default_history_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Join the base URL with an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn analyze_url(&self) -> String {
        self.endpoint(&self.analyze_path)
    }

    pub fn history_url(&self) -> String {
        self.endpoint(&self.history_path)
    }
}

/// Live channel (Socket.IO) settings
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_path")]
    pub path: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_reconnect")]
    pub reconnect: bool,

    /// 0 means unlimited
    #[serde(default)]
    pub reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_reconnect_delay_max")]
    pub reconnect_delay_max_ms: u64,
}

fn default_channel_path() -> String {
    "/socket.io/".to_string()
}

fn default_namespace() -> String {
    "/".to_string()
}

fn default_reconnect() -> bool {
    true
}

fn default_reconnect_delay() -> u64 {
    1000
}

fn default_reconnect_delay_max() -> u64 {
    5000
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            path: default_channel_path(),
            namespace: default_namespace(),
            reconnect: default_reconnect(),
            reconnect_attempts: 0,
            reconnect_delay_ms: default_reconnect_delay(),
            reconnect_delay_max_ms: default_reconnect_delay_max(),
        }
    }
}

/// Drop-target settings
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
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

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides taken from `lookup`, validated
    fn from_overrides(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("leafguard").join("config.toml")),
            Some(PathBuf::from("/etc/leafguard/config.toml")),
            Some(PathBuf::from("./leafguard.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        match Self::from_env() {
            Ok(config) => {
                tracing::info!("Using default config with environment overrides");
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring environment overrides: {}", e);
                Config::default()
            }
        }
    }

    /// Check that the endpoints are usable URLs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.server.base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.server.base_url.clone(),
            error: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::InvalidUrl {
                url: self.server.base_url.clone(),
                error: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup("LEAFGUARD_BASE_URL") {
            self.server.base_url = base_url;
        }

        if let Some(path) = lookup("LEAFGUARD_CHANNEL_PATH") {
            self.channel.path = path;
        }
        if let Some(namespace) = lookup("LEAFGUARD_NAMESPACE") {
            self.channel.namespace = namespace;
        }

        if let Some(level) = lookup("LEAFGUARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LEAFGUARD_LOG_FORMAT") {
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

    #[error("Invalid server URL '{url}': {error}")]
    InvalidUrl { url: String, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# LeafGuard Configuration
#
# Environment variables override these settings:
# - LEAFGUARD_BASE_URL
# - LEAFGUARD_CHANNEL_PATH
# - LEAFGUARD_NAMESPACE
# - LEAFGUARD_LOG_LEVEL
# - LEAFGUARD_LOG_FORMAT

[server]
# Analysis service base URL
base_url = "http://127.0.0.1:5000"

# Endpoint receiving multipart image uploads
analyze_path = "/analyze"

# Endpoint listing past analyses
history_path = "/history"

# Request timeout in seconds
request_timeout_secs = 30

[channel]
# Socket.IO endpoint path on the same host
path = "/socket.io/"

# Socket.IO namespace carrying "result" events
namespace = "/"

# Reconnect when the transport drops
reconnect = true

# Maximum reconnect attempts (0 = unlimited)
reconnect_attempts = 0

# First reconnect delay, doubled on each attempt up to the maximum (ms)
reconnect_delay_ms = 1000
reconnect_delay_max_ms = 5000

[upload]
# File extensions the drop target accepts
allowed_extensions = ["png", "jpg", "jpeg"]

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
