//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::broker::TopicSet;
use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MQTT broker connection
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Random `polychaeta-relay-<uuid>` when unset
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    #[serde(default)]
    pub topics: TopicSet,
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reconnect_delay() -> u64 {
    1000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
            reconnect_delay_ms: default_reconnect_delay(),
            topics: TopicSet::default(),
        }
    }
}

/// HTTP query API server
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    3001
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// WebSocket push server
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_ws_port")]
    pub port: u16,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
}

fn default_ws_port() -> u16 {
    3002
}

fn default_max_connections() -> usize {
    1000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_send_timeout() -> u64 {
    5000
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_ws_port(),
            max_connections: default_max_connections(),
            queue_capacity: default_queue_capacity(),
            send_timeout_ms: default_send_timeout(),
        }
    }
}

impl WebSocketConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections: self.max_connections,
            queue_capacity: self.queue_capacity,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
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

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let mut config = Self::load(path)?;
        let issues = config.apply_env_overrides();
        Ok(LoadedConfig {
            config,
            source: Some(path.to_path_buf()),
            issues,
        })
    }

    /// Load from default locations or environment
    ///
    /// Files that exist but fail to load are skipped and reported in
    /// [`LoadedConfig::issues`].
    pub fn load_default() -> LoadedConfig {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("polychaeta").join("relay.toml")),
            Some(PathBuf::from("/etc/polychaeta/relay.toml")),
            Some(PathBuf::from("./relay.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    fn load_first(paths: &[PathBuf]) -> LoadedConfig {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(mut loaded) => {
                    skipped.append(&mut loaded.issues);
                    loaded.issues = skipped;
                    return loaded;
                }
                Err(e) => skipped.push(e),
            }
        }

        let mut config = Config::default();
        skipped.extend(config.apply_env_overrides());
        LoadedConfig {
            config,
            source: None,
            issues: skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Vec<ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Returns the overrides that were present but could not be used
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<ConfigError> {
        let mut issues = Vec::new();
        let mut parsed = |key: &'static str| {
            let value = lookup(key)?;
            match value.parse::<u16>() {
                Ok(v) => Some(v),
                Err(e) => {
                    issues.push(ConfigError::Override {
                        key,
                        error: format!("{}", e),
                    });
                    None
                }
            }
        };

        // Broker overrides
        if let Some(port) = parsed("RELAY_BROKER_PORT") {
            self.broker.port = port;
        }
        // API overrides
        if let Some(port) = parsed("RELAY_API_PORT") {
            self.api.port = port;
        }
        // WebSocket overrides
        if let Some(port) = parsed("RELAY_WS_PORT") {
            self.websocket.port = port;
        }

        if let Some(host) = lookup("RELAY_BROKER_HOST") {
            self.broker.host = host;
        }
        if let Some(client_id) = lookup("RELAY_BROKER_CLIENT_ID") {
            self.broker.client_id = Some(client_id);
        }
        if let Some(username) = lookup("RELAY_BROKER_USERNAME") {
            self.broker.username = Some(username);
        }
        if let Some(password) = lookup("RELAY_BROKER_PASSWORD") {
            self.broker.password = Some(password);
        }
        if let Some(host) = lookup("RELAY_API_HOST") {
            self.api.host = host;
        }
        if let Some(host) = lookup("RELAY_WS_HOST") {
            self.websocket.host = host;
        }

        // Logging overrides
        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RELAY_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.logging.format = format,
                Err(error) => issues.push(ConfigError::Override {
                    key: "RELAY_LOG_FORMAT",
                    error,
                }),
            }
        }

        issues
    }
}

/// A loaded configuration and what happened while loading it
///
/// Loading runs before logging is set up, so problems are collected here and
/// logged by [`LoadedConfig::log`] once a subscriber exists.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the config came from; `None` means defaults plus environment
    pub source: Option<PathBuf>,
    /// Skipped files and ignored overrides
    pub issues: Vec<ConfigError>,
}

impl LoadedConfig {
    pub fn log(&self) {
        for issue in &self.issues {
            tracing::warn!("{}", issue);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
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

    #[error("Ignoring {key}: {error}")]
    Override { key: &'static str, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Polychaeta Relay Configuration
#
# Environment variables override these settings:
# - RELAY_BROKER_HOST, RELAY_BROKER_PORT, RELAY_BROKER_CLIENT_ID
# - RELAY_BROKER_USERNAME, RELAY_BROKER_PASSWORD
# - RELAY_API_HOST, RELAY_API_PORT
# - RELAY_WS_HOST, RELAY_WS_PORT
# - RELAY_LOG_LEVEL, RELAY_LOG_FORMAT

[broker]
# MQTT broker address
host = "localhost"
port = 1883

# Client id (random when unset)
# client_id = "polychaeta-relay"

# Credentials (optional)
# username = ""
# password = ""

# Keep-alive interval (seconds)
keep_alive_secs = 60

# Pause after a connection error before the next attempt (ms)
reconnect_delay_ms = 1000

[broker.topics]
sensor_data = "polychaeta/sensor/data"
discovery = "polychaeta/discovery"
status = "polychaeta/status"

[api]
# HTTP query API
host = "0.0.0.0"
port = 3001

# Allowed CORS origins (empty = any)
cors_origins = []

[websocket]
# Dashboard push server
host = "0.0.0.0"
port = 3002

# Maximum concurrent dashboard connections
max_connections = 1000

# Outbound messages queued per dashboard before it is dropped
queue_capacity = 256

# Longest a single socket write may take (ms)
send_timeout_ms = 5000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
