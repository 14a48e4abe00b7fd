//! Application configuration module
//!
//! `AppConfig` is assembled in layers: built-in defaults, then an optional
//! TOML settings file, then environment overrides. Each layer is a plain
//! function so the server and tests can pick the ones they need.
//!
//! ```toml
//! port = 9001
//! db_type = "sqlite"
//! database_url = "sqlite://xfpad.db"
//!
//! [commit_rate_limiting]
//! duration = 1
//! points = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::shared::message::PadOptions;

pub const DEFAULT_PAD_TEXT: &str = "Welcome to xfpad!\n\n\
This pad text is synchronized as you type, so that everyone viewing this page sees the same text. \
This allows you to collaborate seamlessly on documents!\n";

/// Storage backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[default]
    Memory,
    Sqlite,
    Postgres,
}

impl std::str::FromStr for DbType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::InvalidValue {
                field: "db_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Sliding window applied to USER_CHANGES per client IP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in seconds
    pub duration: u64,
    /// Commits allowed inside one window
    pub points: usize,
    /// Disables the limiter entirely
    pub load_test: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            duration: 1,
            points: 10,
            load_test: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ip: String,
    pub port: u16,
    pub db_type: DbType,
    pub database_url: Option<String>,
    pub default_pad_text: String,
    pub commit_rate_limiting: RateLimitConfig,
    pub disable_ip_logging: bool,
    pub pad_options: PadOptions,
    pub max_chat_request: i64,
    pub initial_changesets: usize,
    pub keyframe_interval: i64,
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub outbound_buffer: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 3000,
            db_type: DbType::Memory,
            database_url: None,
            default_pad_text: DEFAULT_PAD_TEXT.to_string(),
            commit_rate_limiting: RateLimitConfig::default(),
            disable_ip_logging: false,
            pad_options: PadOptions::default(),
            max_chat_request: 100,
            initial_changesets: 100,
            keyframe_interval: 100,
            ping_interval_secs: 54,
            pong_timeout_secs: 60,
            outbound_buffer: 256,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Defaults, then the settings file named by `XFPAD_SETTINGS`, then
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("XFPAD_SETTINGS").unwrap_or_else(|_| "settings.toml".to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML settings file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies overrides from `lookup`, normally the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(ip) = lookup("SERVER_IP") {
            self.ip = ip;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "port",
                value: port,
            })?;
        }
        if let Some(db_type) = lookup("DB_TYPE") {
            self.db_type = db_type.parse()?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(text) = lookup("DEFAULT_PAD_TEXT") {
            self.default_pad_text = text;
        }
        if let Some(flag) = lookup("DISABLE_IP_LOGGING") {
            self.disable_ip_logging = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.db_type {
            DbType::Memory => {}
            DbType::Sqlite => {
                if let Some(url) = &self.database_url {
                    if !url.starts_with("sqlite:") {
                        return Err(ConfigError::InvalidUrl(url.clone()));
                    }
                }
            }
            DbType::Postgres => match &self.database_url {
                None => return Err(ConfigError::MissingValue("database_url")),
                Some(url) if !url.starts_with("postgres://") && !url.starts_with("postgresql://") => {
                    return Err(ConfigError::InvalidUrl(url.clone()));
                }
                Some(_) => {}
            },
        }
        if self.commit_rate_limiting.duration == 0 {
            return Err(ConfigError::InvalidValue {
                field: "commit_rate_limiting.duration",
                value: "0".to_string(),
            });
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "outbound_buffer",
                value: "0".to_string(),
            });
        }
        if self.keyframe_interval <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "keyframe_interval",
                value: self.keyframe_interval.to_string(),
            });
        }
        Ok(())
    }

    /// Connection string for the selected SQL backend
    pub fn database_url(&self) -> Option<String> {
        match (self.db_type, &self.database_url) {
            (DbType::Memory, _) => None,
            (_, Some(url)) => Some(url.clone()),
            (DbType::Sqlite, None) => Some("sqlite://xfpad.db".to_string()),
            (DbType::Postgres, None) => None,
        }
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.config.db_type = db_type;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn default_pad_text(mut self, text: impl Into<String>) -> Self {
        self.config.default_pad_text = text.into();
        self
    }

    pub fn rate_limit(mut self, duration: u64, points: usize) -> Self {
        self.config.commit_rate_limiting.duration = duration;
        self.config.commit_rate_limiting.points = points;
        self
    }

    pub fn load_test(mut self, enabled: bool) -> Self {
        self.config.commit_rate_limiting.load_test = enabled;
        self
    }

    pub fn disable_ip_logging(mut self, disabled: bool) -> Self {
        self.config.disable_ip_logging = disabled;
        self
    }

    pub fn keyframe_interval(mut self, interval: i64) -> Self {
        self.config.keyframe_interval = interval;
        self
    }

    pub fn outbound_buffer(mut self, size: usize) -> Self {
        self.config.outbound_buffer = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("failed to read settings: {0}")]
    Io(String),
    #[error("failed to parse settings: {0}")]
    Parse(String),
}
