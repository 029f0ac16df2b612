//! Test utilities for pricing-sync
//!
//! Provides a small fixture catalog, record builders, an in-memory price store
//! that records how the engine talks to it, and an isolated SQLite context.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::PricingSyncEngine;
use crate::domain::catalog::{Brand, BrandTables, DeviceCategory, StaticCatalog};
use crate::domain::price_records::{BuybackPriceRecord, ConditionTier, PriceDocument, RepairPriceRecord};
use crate::domain::repositories::{
    BatchOp, MAX_BATCH_OPERATIONS, MAX_IN_QUERY_KEYS, PriceCollection, PriceStore, StoredPrice, WriteBatch,
};
use crate::domain::variants::Variants;
use crate::infrastructure::{DatabaseConnection, SqliteMarketDataRepository, SqlitePriceStore};

/// Apple and Google tables small enough to reason about in assertions.
///
/// "Pixel 7" has storage but no base value, so it is always skipped.
pub fn fixture_catalog() -> StaticCatalog {
    let apple = BrandTables::new(DeviceCategory::Smartphone)
        .with_model("iPhone 14", 470, &["128GB", "256GB", "512GB"])
        .with_model("iPhone 15", 600, &["128GB", "256GB", "512GB"])
        .with_model("iPhone 15 Pro", 780, &["128GB", "256GB", "512GB"]);

    let mut google = BrandTables::new(DeviceCategory::Smartphone).with_model("Pixel 8", 380, &["128GB", "256GB"]);
    google
        .storage
        .insert("Pixel 7".to_string(), vec!["128GB".to_string(), "256GB".to_string()]);

    StaticCatalog::new()
        .with_brand(Brand::Apple, apple)
        .with_brand(Brand::Google, google)
}

/// 2024-01-01T00:00:00Z
pub fn fixture_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default()
}

pub fn repair_record(device_id: &str, issue_id: &str, variants: Variants) -> RepairPriceRecord {
    RepairPriceRecord {
        device_id: device_id.to_string(),
        issue_id: issue_id.to_string(),
        variants,
        price: 120,
        currency: "EUR".to_string(),
        part_cost: 50.0,
        labor_minutes: 45,
        active: true,
        is_manual: false,
        updated_at: fixture_timestamp(),
    }
}

pub fn buyback_record(device_id: &str, storage: &str, condition: ConditionTier) -> BuybackPriceRecord {
    BuybackPriceRecord {
        device_id: device_id.to_string(),
        storage: storage.to_string(),
        condition,
        price: 300,
        market_value: None,
        currency: "EUR".to_string(),
        updated_at: fixture_timestamp(),
    }
}

#[derive(Default)]
struct RecordingState {
    repair: BTreeMap<String, PriceDocument>,
    buyback: BTreeMap<String, PriceDocument>,
    batch_sizes: Vec<usize>,
    max_in_query_len: usize,
    commits_before_failure: Option<usize>,
}

impl RecordingState {
    fn table(&mut self, collection: PriceCollection) -> &mut BTreeMap<String, PriceDocument> {
        match collection {
            PriceCollection::Repair => &mut self.repair,
            PriceCollection::Buyback => &mut self.buyback,
        }
    }
}

/// In-memory [`PriceStore`] with the same caps as the SQLite store.
///
/// Batches apply atomically and only successful commits are recorded.
#[derive(Default)]
pub struct RecordingStore {
    state: Mutex<RecordingState>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `commits` batches through, then fails every later commit.
    pub fn failing_after(commits: usize) -> Self {
        let store = Self::default();
        store.lock().commits_before_failure = Some(commits);
        store
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    /// Largest key list seen by `keys_in`
    pub fn max_in_query_len(&self) -> usize {
        self.lock().max_in_query_len
    }

    /// Writes a document under an arbitrary key, bypassing batching.
    pub fn insert(&self, key: &str, document: PriceDocument) {
        let collection = PriceCollection::of(&document);
        self.lock().table(collection).insert(key.to_string(), document);
    }

    pub fn keys(&self, collection: PriceCollection) -> Vec<String> {
        self.lock().table(collection).keys().cloned().collect()
    }

    pub fn document(&self, collection: PriceCollection, key: &str) -> Option<PriceDocument> {
        self.lock().table(collection).get(key).cloned()
    }
}

#[async_trait]
impl PriceStore for RecordingStore {
    async fn get(&self, collection: PriceCollection, key: &str) -> Result<Option<StoredPrice>> {
        Ok(self.document(collection, key).map(|document| StoredPrice {
            key: key.to_string(),
            document,
        }))
    }

    async fn query_prefix(&self, collection: PriceCollection, prefix: &str) -> Result<Vec<StoredPrice>> {
        let mut state = self.lock();
        Ok(state
            .table(collection)
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, document)| StoredPrice {
                key: key.clone(),
                document: document.clone(),
            })
            .collect())
    }

    async fn keys_in(&self, collection: PriceCollection, keys: &[String]) -> Result<Vec<StoredPrice>> {
        if keys.len() > MAX_IN_QUERY_KEYS {
            bail!("IN lookup with {} keys", keys.len());
        }
        let mut state = self.lock();
        state.max_in_query_len = state.max_in_query_len.max(keys.len());
        let table = state.table(collection);
        let mut found: Vec<StoredPrice> = keys
            .iter()
            .filter_map(|key| {
                table.get(key).map(|document| StoredPrice {
                    key: key.clone(),
                    document: document.clone(),
                })
            })
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        found.dedup_by(|a, b| a.key == b.key);
        Ok(found)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > MAX_BATCH_OPERATIONS {
            bail!("batch of {} operations", batch.len());
        }
        let mut state = self.lock();
        if let Some(remaining) = state.commits_before_failure.as_mut() {
            if *remaining == 0 {
                bail!("simulated store outage");
            }
            *remaining -= 1;
        }

        let size = batch.len();
        for op in batch.into_ops() {
            match op {
                BatchOp::Upsert { key, document, merge } => {
                    let table = state.table(PriceCollection::of(&document));
                    let document = match (merge, document, table.get(&key)) {
                        (true, PriceDocument::Repair(mut record), Some(PriceDocument::Repair(existing))) => {
                            record.active = existing.active;
                            record.is_manual = existing.is_manual;
                            PriceDocument::Repair(record)
                        }
                        (_, document, _) => document,
                    };
                    table.insert(key, document);
                }
                BatchOp::Delete { collection, key } => {
                    state.table(collection).remove(&key);
                }
            }
        }
        state.batch_sizes.push(size);
        Ok(())
    }
}

/// Test database configuration
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    /// Fresh in-memory database with the schema applied
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    pub fn pool(&self) -> sqlx::Pool<sqlx::Sqlite> {
        self.connection.pool().clone()
    }
}

/// SQLite-backed engine over the fixture catalog
pub struct TestContext {
    pub database: TestDatabase,
    pub store: Arc<SqlitePriceStore>,
    pub market: Arc<SqliteMarketDataRepository>,
    pub engine: PricingSyncEngine,
}

impl TestContext {
    pub async fn new() -> Result<Self> {
        let database = TestDatabase::new().await?;
        let store = Arc::new(SqlitePriceStore::new(database.pool()));
        let market = Arc::new(SqliteMarketDataRepository::new(database.pool()));
        let engine =
            PricingSyncEngine::new(Arc::new(fixture_catalog()), store.clone()).with_market_data(market.clone());

        Ok(Self {
            database,
            store,
            market,
            engine,
        })
    }
}

#[macro_export]
macro_rules! test_context {
    () => {{
        $crate::test_utils::TestContext::new()
            .await
            .expect("Failed to create test context")
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::CatalogProvider;

    #[tokio::test]
    async fn test_context_creation() {
        let ctx = TestContext::new().await.unwrap();
        assert!(!ctx.database.pool().is_closed());
    }

    #[test]
    fn fixture_has_one_invalid_google_model() {
        let entries = fixture_catalog().entries(Brand::Google);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().filter(|e| e.validate().is_err()).count(), 1);
    }

    #[tokio::test]
    async fn recording_store_merge_keeps_flags() {
        let store = RecordingStore::new();
        let mut manual = repair_record("google-pixel-8", "battery", Variants::none());
        manual.is_manual = true;
        let key = manual.identity_key();
        store.insert(&key, PriceDocument::Repair(manual));

        let mut batch = WriteBatch::new();
        batch.push(BatchOp::Upsert {
            key: key.clone(),
            document: PriceDocument::Repair(repair_record("google-pixel-8", "battery", Variants::none())),
            merge: true,
        });
        store.commit(batch).await.unwrap();

        let Some(PriceDocument::Repair(record)) = store.document(PriceCollection::Repair, &key) else {
            panic!("expected repair record");
        };
        assert!(record.is_manual);
        assert_eq!(store.batch_sizes(), vec![1]);
    }
}
