//! Logging system configuration and initialization
//!
//! Console output goes to stderr so command output on stdout stays clean.
//! File output uses a non-blocking appender whose guard is kept alive for
//! the life of the process.

use anyhow::{Result, anyhow};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::{defaults, default_log_directory};

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Crate target used in filter directives
const CRATE_TARGET: &str = "pricing_sync_lib";

#[must_use]
pub fn log_directory(config: &LoggingConfig) -> PathBuf {
    config.directory.clone().unwrap_or_else(default_log_directory)
}

/// Filter used when `RUST_LOG` is not set.
///
/// SQL statement logs are suppressed unless the level is `trace`.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut directives = vec![config.level.clone()];
    if !config.level.to_lowercase().contains("trace") {
        directives.push("sqlx::query=warn".to_string());
        directives.push("sqlx::sqlite=warn".to_string());
        directives.push(format!("{CRATE_TARGET}={}", config.level));
    }
    let mut modules: Vec<_> = config.module_filters.iter().collect();
    modules.sort();
    directives.extend(modules.into_iter().map(|(module, level)| format!("{module}={level}")));

    EnvFilter::try_new(directives.join(",")).map_err(|e| anyhow!("Invalid log filter: {}", e))
}

/// Initialize logging with custom configuration.
///
/// `RUST_LOG` overrides the configured level, e.g.
/// `RUST_LOG="debug,sqlx::query=debug" pricing-sync seed`.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_env_filter(config)?,
    };

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    });

    let log_dir = log_directory(config);
    let file_layer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        if config.auto_cleanup_logs {
            cleanup_old_logs(&log_dir, config.max_files)?;
        }

        let file_appender = rolling::daily(&log_dir, defaults::LOG_FILE_NAME);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let layer = fmt::Layer::new().with_writer(file_writer).with_ansi(false);
        Some(if config.json_format {
            layer
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            layer.with_target(false).boxed()
        })
    } else {
        None
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Logging already initialized: {}", e))?;

    info!(
        level = %config.level,
        json = config.json_format,
        console = config.console_output,
        file = config.file_output,
        "Logging system initialized"
    );
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
}

/// Removes the oldest `.log` files beyond `max_files`. Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.contains(".log"));
        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let keep = max_files as usize;
    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_suppresses_sql_logs() {
        let filter = build_env_filter(&LoggingConfig::default()).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("sqlx::query=warn"));
    }

    #[test]
    fn module_filters_are_appended() {
        let mut config = LoggingConfig::default();
        config.module_filters.insert("sqlx".to_string(), "error".to_string());
        let rendered = build_env_filter(&config).unwrap().to_string();
        assert!(rendered.contains("sqlx=error"));
    }

    #[test]
    fn trace_level_keeps_sql_logs() {
        let config = LoggingConfig {
            level: "trace".to_string(),
            ..LoggingConfig::default()
        };
        let rendered = build_env_filter(&config).unwrap().to_string();
        assert!(!rendered.contains("sqlx::query=warn"));
    }

    #[test]
    fn cleanup_keeps_the_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            std::fs::write(dir.path().join(format!("pricing-sync.log.{i}")), "x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let removed = cleanup_old_logs(dir.path(), 2).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn no_output_is_rejected() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }
}
