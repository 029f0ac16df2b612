//! Infrastructure layer: SQLite persistence, configuration and logging

pub mod config;
pub mod database_connection;
pub mod logging;
pub mod market_data_repository;
pub mod sqlite_price_store;

pub use config::{AppConfig, ConfigError, LoggingConfig};
pub use database_connection::DatabaseConnection;
pub use logging::init_logging_with_config;
pub use market_data_repository::SqliteMarketDataRepository;
pub use sqlite_price_store::SqlitePriceStore;
