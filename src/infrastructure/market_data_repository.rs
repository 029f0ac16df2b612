//! Market value records stored alongside the price tables

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::market::{MarketDataProvider, MarketValueRecord, PartCosts};

pub struct SqliteMarketDataRepository {
    pool: SqlitePool,
}

impl SqliteMarketDataRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MarketValueRecord> {
        Ok(MarketValueRecord {
            device_id: row.try_get("device_id")?,
            avg_price: row.try_get("avg_price")?,
            part_costs: PartCosts {
                screen: row.try_get("screen_cost")?,
                battery: row.try_get("battery_cost")?,
            },
        })
    }

    pub async fn upsert(&self, record: &MarketValueRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO market_values (device_id, avg_price, screen_cost, battery_cost, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(device_id) DO UPDATE SET
                avg_price = excluded.avg_price,
                screen_cost = excluded.screen_cost,
                battery_cost = excluded.battery_cost,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&record.device_id)
        .bind(record.avg_price)
        .bind(record.part_costs.screen)
        .bind(record.part_costs.battery)
        .execute(&self.pool)
        .await?;

        debug!(device_id = %record.device_id, "Stored market value");
        Ok(())
    }

    pub async fn find_all(&self) -> Result<Vec<MarketValueRecord>> {
        let rows = sqlx::query(
            "SELECT device_id, avg_price, screen_cost, battery_cost FROM market_values ORDER BY device_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect::<Result<Vec<_>>>()
    }

    pub async fn delete(&self, device_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM market_values WHERE device_id = ?")
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MarketDataProvider for SqliteMarketDataRepository {
    async fn market_value(&self, device_id: &str) -> Result<Option<MarketValueRecord>> {
        let row = sqlx::query(
            "SELECT device_id, avg_price, screen_cost, battery_cost FROM market_values WHERE device_id = ?",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;

    async fn setup_test_db() -> Result<SqlitePool> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(db.pool().clone())
    }

    fn record(device_id: &str, avg_price: Option<f64>, screen: Option<f64>) -> MarketValueRecord {
        MarketValueRecord {
            device_id: device_id.to_string(),
            avg_price,
            part_costs: PartCosts { screen, battery: None },
        }
    }

    #[tokio::test]
    async fn test_upsert_and_lookup() -> Result<()> {
        let repo = SqliteMarketDataRepository::new(setup_test_db().await?);
        assert!(repo.market_value("apple-iphone-15-pro").await?.is_none());

        repo.upsert(&record("apple-iphone-15-pro", Some(950.0), Some(210.0))).await?;
        repo.upsert(&record("apple-iphone-15-pro", Some(900.0), None)).await?;

        let found = repo.market_value("apple-iphone-15-pro").await?.unwrap();
        assert_eq!(found.avg_price, Some(900.0));
        assert_eq!(found.part_costs.screen, None);
        assert_eq!(repo.find_all().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete() -> Result<()> {
        let repo = SqliteMarketDataRepository::new(setup_test_db().await?);
        repo.upsert(&record("google-pixel-8", None, Some(120.0))).await?;

        assert!(repo.delete("google-pixel-8").await?);
        assert!(!repo.delete("google-pixel-8").await?);
        assert!(repo.find_all().await?.is_empty());
        Ok(())
    }
}
