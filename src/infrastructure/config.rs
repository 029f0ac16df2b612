//! Configuration infrastructure
//!
//! Layered with the `config` crate: built-in defaults, then an optional config
//! file, then `PRICING_SYNC__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::application::sync_engine::EngineOptions;
use crate::domain::repositories::{MAX_BATCH_OPERATIONS, MAX_IN_QUERY_KEYS};

/// Environment variable prefix, e.g. `PRICING_SYNC__SYNC__MAX_BATCH_OPS=200`
pub const ENV_PREFIX: &str = "PRICING_SYNC";

/// Directory name used under the platform config/data dirs
pub const APP_DIR_NAME: &str = "pricing-sync";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Default values
pub mod defaults {
    pub const MAX_BATCH_OPS: usize = 450;
    pub const KEY_LOOKUP_CHUNK: usize = 10;
    pub const CURRENCY: &str = "EUR";
    pub const MAX_CONNECTIONS: u32 = 5;
    pub const LOG_LEVEL: &str = "info";
    pub const MAX_LOG_FILES: u32 = 10;
    pub const LOG_FILE_NAME: &str = "pricing-sync.log";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub sync: SyncSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx connection url, e.g. `sqlite:/var/lib/pricing/prices.db`
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: defaults::MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Operations per committed batch (store cap is 500)
    pub max_batch_ops: usize,
    /// Keys per `IN` lookup (store cap is 10)
    pub key_lookup_chunk: usize,
    pub currency: String,
    pub apply_market_overrides: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_batch_ops: defaults::MAX_BATCH_OPS,
            key_lookup_chunk: defaults::KEY_LOOKUP_CHUNK,
            currency: defaults::CURRENCY.to_string(),
            apply_market_overrides: true,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_batch_ops: self.max_batch_ops,
            key_lookup_chunk: self.key_lookup_chunk,
            currency: self.currency.clone(),
            apply_market_overrides: self.apply_market_overrides,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Log directory; defaults to `<data dir>/pricing-sync/logs`
    pub directory: Option<PathBuf>,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            directory: None,
            max_files: defaults::MAX_LOG_FILES,
            auto_cleanup_logs: true,
            module_filters: HashMap::new(),
        }
    }
}

fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn default_database_url() -> String {
    format!("sqlite:{}", app_data_dir().join("prices.db").display())
}

/// Default log directory
#[must_use]
pub fn default_log_directory() -> PathBuf {
    app_data_dir().join("logs")
}

/// Config file picked up when no explicit path is given
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    /// Loads defaults ← file ← environment. An explicit `path` must exist;
    /// the default config path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    pub(crate) fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => builder = builder.add_source(config::File::from(path).required(true)),
            None => {
                if let Some(default_path) = default_config_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let settings = builder.add_source(env).build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.max_batch_ops == 0 || self.sync.max_batch_ops > MAX_BATCH_OPERATIONS {
            return Err(ConfigError::Validation {
                message: format!("sync.max_batch_ops must be within 1..={MAX_BATCH_OPERATIONS}"),
            });
        }
        if self.sync.key_lookup_chunk == 0 || self.sync.key_lookup_chunk > MAX_IN_QUERY_KEYS {
            return Err(ConfigError::Validation {
                message: format!("sync.key_lookup_chunk must be within 1..={MAX_IN_QUERY_KEYS}"),
            });
        }
        if self.sync.currency.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "sync.currency cannot be empty".to_string(),
            });
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "database.url cannot be empty".to_string(),
            });
        }
        if !self.logging.console_output && !self.logging.file_output {
            return Err(ConfigError::Validation {
                message: "logging needs console_output or file_output".to_string(),
            });
        }
        Ok(())
    }
}
