//! SQLite implementation of the price store
//!
//! One table per collection, keyed by identity key. Batches run in a single
//! transaction, and the store enforces the same operation and lookup caps a
//! hosted document store would.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::domain::price_records::{BuybackPriceRecord, ConditionTier, PriceDocument, RepairPriceRecord};
use crate::domain::repositories::{
    BatchOp, MAX_BATCH_OPERATIONS, MAX_IN_QUERY_KEYS, PriceCollection, PriceStore, StoredPrice, WriteBatch,
};
use crate::domain::variants::Variants;

const REPAIR_COLUMNS: &str =
    "key, device_id, issue_id, variants, price, currency, part_cost, labor_minutes, active, is_manual, updated_at";

const BUYBACK_COLUMNS: &str = "key, device_id, storage, condition, price, market_value, currency, updated_at";

pub struct SqlitePriceStore {
    pool: SqlitePool,
}

impl SqlitePriceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count(&self, collection: PriceCollection) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", collection.as_str());
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(u64::try_from(total)?)
    }

    const fn columns(collection: PriceCollection) -> &'static str {
        match collection {
            PriceCollection::Repair => REPAIR_COLUMNS,
            PriceCollection::Buyback => BUYBACK_COLUMNS,
        }
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(raw)
            .map_err(|e| anyhow!("Failed to parse updated_at '{}': {}", raw, e))?
            .with_timezone(&Utc))
    }

    fn row_to_repair(row: &SqliteRow) -> Result<StoredPrice> {
        let variants: String = row.try_get("variants")?;
        let updated_at: String = row.try_get("updated_at")?;
        let price: i64 = row.try_get("price")?;
        let labor_minutes: i64 = row.try_get("labor_minutes")?;

        let record = RepairPriceRecord {
            device_id: row.try_get("device_id")?,
            issue_id: row.try_get("issue_id")?,
            variants: Variants::from_json(&variants)
                .map_err(|e| anyhow!("Invalid variants JSON '{}': {}", variants, e))?,
            price: u32::try_from(price)?,
            currency: row.try_get("currency")?,
            part_cost: row.try_get("part_cost")?,
            labor_minutes: u32::try_from(labor_minutes)?,
            active: row.try_get("active")?,
            is_manual: row.try_get("is_manual")?,
            updated_at: Self::parse_timestamp(&updated_at)?,
        };
        Ok(StoredPrice {
            key: row.try_get("key")?,
            document: PriceDocument::Repair(record),
        })
    }

    fn row_to_buyback(row: &SqliteRow) -> Result<StoredPrice> {
        let condition: String = row.try_get("condition")?;
        let updated_at: String = row.try_get("updated_at")?;
        let price: i64 = row.try_get("price")?;

        let record = BuybackPriceRecord {
            device_id: row.try_get("device_id")?,
            storage: row.try_get("storage")?,
            condition: condition.parse::<ConditionTier>().map_err(|e| anyhow!(e))?,
            price: u32::try_from(price)?,
            market_value: row.try_get("market_value")?,
            currency: row.try_get("currency")?,
            updated_at: Self::parse_timestamp(&updated_at)?,
        };
        Ok(StoredPrice {
            key: row.try_get("key")?,
            document: PriceDocument::Buyback(record),
        })
    }

    fn decode(collection: PriceCollection, row: &SqliteRow) -> Result<StoredPrice> {
        match collection {
            PriceCollection::Repair => Self::row_to_repair(row),
            PriceCollection::Buyback => Self::row_to_buyback(row),
        }
    }

    async fn upsert_repair(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        record: &RepairPriceRecord,
        merge: bool,
    ) -> Result<()> {
        // A merge keeps the stored active/is_manual flags
        let on_conflict = if merge {
            "device_id = excluded.device_id, issue_id = excluded.issue_id, variants = excluded.variants,
             price = excluded.price, currency = excluded.currency, part_cost = excluded.part_cost,
             labor_minutes = excluded.labor_minutes, updated_at = excluded.updated_at"
        } else {
            "device_id = excluded.device_id, issue_id = excluded.issue_id, variants = excluded.variants,
             price = excluded.price, currency = excluded.currency, part_cost = excluded.part_cost,
             labor_minutes = excluded.labor_minutes, active = excluded.active,
             is_manual = excluded.is_manual, updated_at = excluded.updated_at"
        };
        let sql = format!(
            "INSERT INTO repair_prices ({REPAIR_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET {on_conflict}"
        );

        sqlx::query(&sql)
            .bind(key)
            .bind(&record.device_id)
            .bind(&record.issue_id)
            .bind(record.variants.to_canonical_json())
            .bind(i64::from(record.price))
            .bind(&record.currency)
            .bind(record.part_cost)
            .bind(i64::from(record.labor_minutes))
            .bind(record.active)
            .bind(record.is_manual)
            .bind(record.updated_at.to_rfc3339())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn upsert_buyback(tx: &mut Transaction<'_, Sqlite>, key: &str, record: &BuybackPriceRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO buyback_prices (key, device_id, storage, condition, price, market_value, currency, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                device_id = excluded.device_id, storage = excluded.storage, condition = excluded.condition,
                price = excluded.price, market_value = excluded.market_value,
                currency = excluded.currency, updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(&record.device_id)
        .bind(&record.storage)
        .bind(record.condition.as_str())
        .bind(i64::from(record.price))
        .bind(record.market_value)
        .bind(&record.currency)
        .bind(record.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn get(&self, collection: PriceCollection, key: &str) -> Result<Option<StoredPrice>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE key = ?",
            Self::columns(collection),
            collection.as_str()
        );
        let row = sqlx::query(&sql).bind(key).fetch_optional(&self.pool).await?;
        row.map(|row| Self::decode(collection, &row)).transpose()
    }

    async fn query_prefix(&self, collection: PriceCollection, prefix: &str) -> Result<Vec<StoredPrice>> {
        // substr instead of LIKE: `_` is a LIKE wildcard and appears in every key
        let sql = format!(
            "SELECT {} FROM {} WHERE substr(key, 1, ?) = ? ORDER BY key",
            Self::columns(collection),
            collection.as_str()
        );
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(prefix.chars().count())?)
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| Self::decode(collection, row)).collect()
    }

    async fn keys_in(&self, collection: PriceCollection, keys: &[String]) -> Result<Vec<StoredPrice>> {
        if keys.len() > MAX_IN_QUERY_KEYS {
            bail!(
                "IN lookup on {} has {} keys; at most {} are allowed",
                collection,
                keys.len(),
                MAX_IN_QUERY_KEYS
            );
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE key IN ({placeholders}) ORDER BY key",
            Self::columns(collection),
            collection.as_str()
        );
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|row| Self::decode(collection, row)).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > MAX_BATCH_OPERATIONS {
            bail!(
                "Batch has {} operations; at most {} are allowed",
                batch.len(),
                MAX_BATCH_OPERATIONS
            );
        }
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Upsert {
                    key,
                    document: PriceDocument::Repair(record),
                    merge,
                } => Self::upsert_repair(&mut tx, &key, &record, merge).await?,
                BatchOp::Upsert {
                    key,
                    document: PriceDocument::Buyback(record),
                    ..
                } => Self::upsert_buyback(&mut tx, &key, &record).await?,
                BatchOp::Delete { collection, key } => {
                    let sql = format!("DELETE FROM {} WHERE key = ?", collection.as_str());
                    sqlx::query(&sql).bind(&key).execute(&mut *tx).await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
