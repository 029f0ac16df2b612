// Database connection and pool management
// SQLite via sqlx; tables are created by `migrate()`

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

/// Connections used for file databases when no setting is given
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        // Every in-memory connection opens its own empty database
        if is_memory_url(database_url) {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await?;
            return Ok(Self { pool });
        }

        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);
        let db_path = db_path.split('?').next().unwrap_or(db_path);

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        if !Path::new(db_path).exists() {
            tokio::fs::File::create(db_path).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_repair_prices_sql = r"
            CREATE TABLE IF NOT EXISTS repair_prices (
                key TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                issue_id TEXT NOT NULL,
                variants TEXT NOT NULL DEFAULT '{}',
                price INTEGER NOT NULL,
                currency TEXT NOT NULL,
                part_cost REAL NOT NULL,
                labor_minutes INTEGER NOT NULL,
                active BOOLEAN NOT NULL DEFAULT 1,
                is_manual BOOLEAN NOT NULL DEFAULT 0,
                updated_at DATETIME NOT NULL
            )
        ";

        let create_buyback_prices_sql = r"
            CREATE TABLE IF NOT EXISTS buyback_prices (
                key TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                storage TEXT NOT NULL,
                condition TEXT NOT NULL
                    CHECK (condition IN ('new', 'like-new', 'good', 'fair', 'damaged')),
                price INTEGER NOT NULL,
                market_value REAL,
                currency TEXT NOT NULL,
                updated_at DATETIME NOT NULL
            )
        ";

        let create_market_values_sql = r"
            CREATE TABLE IF NOT EXISTS market_values (
                device_id TEXT PRIMARY KEY,
                avg_price REAL,
                screen_cost REAL,
                battery_cost REAL,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        ";

        let create_indexes_sql = r"
            CREATE INDEX IF NOT EXISTS idx_repair_prices_device_id ON repair_prices (device_id);
            CREATE INDEX IF NOT EXISTS idx_buyback_prices_device_id ON buyback_prices (device_id);
        ";

        sqlx::query(create_repair_prices_sql).execute(&self.pool).await?;
        sqlx::query(create_buyback_prices_sql).execute(&self.pool).await?;
        sqlx::query(create_market_values_sql).execute(&self.pool).await?;
        sqlx::raw_sql(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }
}
