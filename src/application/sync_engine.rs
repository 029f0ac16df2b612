//! Pricing synchronization engine
//!
//! Walks the catalog brand by brand and model by model. For each model it
//! loads the keys already persisted, generates the default blueprint set
//! (patched with market data when available), diffs the candidates against
//! the store according to the [`SyncMode`], and pushes the resulting writes
//! through a [`BatchQueue`].
//!
//! Runs are not locked against each other. Every run logs its own `run_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::batch_queue::{BatchQueue, QueueStats, WriteKind};
use crate::application::deep_clean::{DeepCleanPlan, plan_deep_clean};
use crate::application::errors::{SyncAbort, SyncError};
use crate::application::storage_pruning::plan_storage_pruning;
use crate::application::sync_state::{SyncPhase, SyncStateMachine};
use crate::domain::catalog::{Brand, CatalogProvider};
use crate::domain::generators::{DEFAULT_STORAGE, DeviceBlueprint, generate_defaults};
use crate::domain::market::{MarketDataProvider, apply_market_override};
use crate::domain::price_records::{ConditionTier, PriceDocument, buyback_key, device_key_prefix};
use crate::domain::repositories::{
    BatchOp, MAX_BATCH_OPERATIONS, MAX_IN_QUERY_KEYS, PriceCollection, PriceStore, StoredPrice,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Insert only what is missing
    Safe,
    /// Merge-write every candidate except manual records
    Overwrite,
    /// Overwrite restricted to device ids containing the substring
    Targeted(String),
}

impl SyncMode {
    #[must_use]
    pub const fn overwrites(&self) -> bool {
        !matches!(self, Self::Safe)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => f.write_str("safe"),
            Self::Overwrite => f.write_str("overwrite"),
            Self::Targeted(filter) => write!(f, "targeted({filter})"),
        }
    }
}

/// Which models a run touches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncScope {
    /// Empty means every brand the catalog has
    pub brands: Vec<Brand>,
    /// Case-insensitive substring of the device id
    pub device_filter: Option<String>,
    /// Exact device ids
    pub device_ids: Option<BTreeSet<String>>,
}

impl SyncScope {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn brand(brand: Brand) -> Self {
        Self {
            brands: vec![brand],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_device_filter(mut self, filter: impl Into<String>) -> Self {
        self.device_filter = Some(filter.into().trim().to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn with_device_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.device_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    fn brands_in(&self, catalog: &dyn CatalogProvider) -> Vec<Brand> {
        let available = catalog.brands();
        if self.brands.is_empty() {
            return available;
        }
        available.into_iter().filter(|b| self.brands.contains(b)).collect()
    }

    #[must_use]
    pub fn includes(&self, device_id: &str) -> bool {
        if let Some(filter) = &self.device_filter {
            if !device_id.to_ascii_lowercase().contains(filter.as_str()) {
                return false;
            }
        }
        self.device_ids.as_ref().is_none_or(|ids| ids.contains(device_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Operations per committed batch
    pub max_batch_ops: usize,
    /// Keys per `IN` lookup during planning
    pub key_lookup_chunk: usize,
    pub currency: String,
    pub apply_market_overrides: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_batch_ops: 450,
            key_lookup_chunk: MAX_IN_QUERY_KEYS,
            currency: "EUR".to_string(),
            apply_market_overrides: true,
        }
    }
}

impl EngineOptions {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_batch_ops == 0 || self.max_batch_ops > MAX_BATCH_OPERATIONS {
            return Err(SyncError::InvalidOptions {
                message: format!("max_batch_ops must be within 1..={MAX_BATCH_OPERATIONS}"),
            });
        }
        if self.key_lookup_chunk == 0 || self.key_lookup_chunk > MAX_IN_QUERY_KEYS {
            return Err(SyncError::InvalidOptions {
                message: format!("key_lookup_chunk must be within 1..={MAX_IN_QUERY_KEYS}"),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(SyncError::InvalidOptions {
                message: "currency cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of one engine run. Write counts only include committed batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: String,
    pub operation: String,
    pub catalog_version: String,
    /// Models (or scanned records, for deep clean) handled
    pub processed_count: usize,
    pub skipped_models: usize,
    pub created_count: usize,
    pub updated_count: usize,
    pub deleted_count: usize,
    pub rekeyed_count: usize,
    pub skipped_manual: usize,
    pub market_overrides: usize,
    pub read_ops: usize,
    pub committed_batches: usize,
    pub committed_ops: usize,
    pub warnings: Vec<String>,
    pub final_phase: SyncPhase,
}

impl SyncReport {
    fn new(operation: String, catalog_version: String) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            operation,
            catalog_version,
            processed_count: 0,
            skipped_models: 0,
            created_count: 0,
            updated_count: 0,
            deleted_count: 0,
            rekeyed_count: 0,
            skipped_manual: 0,
            market_overrides: 0,
            read_ops: 0,
            committed_batches: 0,
            committed_ops: 0,
            warnings: Vec::new(),
            final_phase: SyncPhase::Idle,
        }
    }

    fn apply_queue_stats(&mut self, stats: QueueStats) {
        self.committed_batches = stats.committed_batches;
        self.committed_ops = stats.committed_ops;
        self.created_count = stats.created;
        self.updated_count = stats.updated;
        self.deleted_count = stats.deleted;
        self.rekeyed_count = stats.rekeyed;
    }

    /// Records written or removed in total
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.created_count + self.updated_count + self.deleted_count + self.rekeyed_count
    }
}

/// Missing records of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGap {
    pub device_id: String,
    pub missing_repair_keys: Vec<String>,
    pub missing_buyback_keys: Vec<String>,
}

impl DeviceGap {
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.missing_repair_keys.len() + self.missing_buyback_keys.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapReport {
    pub run_id: String,
    pub devices_checked: usize,
    pub skipped_models: usize,
    pub gaps: Vec<DeviceGap>,
    pub warnings: Vec<String>,
}

impl GapReport {
    #[must_use]
    pub fn total_missing(&self) -> usize {
        self.gaps.iter().map(DeviceGap::missing_count).sum()
    }

    #[must_use]
    pub fn device_ids(&self) -> BTreeSet<String> {
        self.gaps.iter().map(|g| g.device_id.clone()).collect()
    }
}

/// A catalog model selected for a run
#[derive(Debug, Clone)]
struct ModelTarget {
    brand: Brand,
    device_id: String,
    storage: Vec<String>,
}

pub struct PricingSyncEngine {
    catalog: Arc<dyn CatalogProvider>,
    store: Arc<dyn PriceStore>,
    market: Option<Arc<dyn MarketDataProvider>>,
    options: EngineOptions,
}

impl PricingSyncEngine {
    pub fn new(catalog: Arc<dyn CatalogProvider>, store: Arc<dyn PriceStore>) -> Self {
        Self {
            catalog,
            store,
            market: None,
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_market_data(mut self, market: Arc<dyn MarketDataProvider>) -> Self {
        self.market = Some(market);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogProvider {
        self.catalog.as_ref()
    }

    /// Generates and diffs every model in scope and commits the writes.
    pub async fn sync(&self, mode: &SyncMode, scope: &SyncScope) -> Result<SyncReport, SyncAbort> {
        let mut report = SyncReport::new(format!("sync:{mode}"), self.catalog.version());
        let scope = match mode {
            SyncMode::Targeted(filter) => {
                if filter.trim().is_empty() {
                    return Err(Self::reject(
                        SyncError::InvalidOptions {
                            message: "targeted sync needs a device filter".to_string(),
                        },
                        report,
                    ));
                }
                scope.clone().with_device_filter(filter.as_str())
            }
            SyncMode::Safe | SyncMode::Overwrite => scope.clone(),
        };
        if let Err(err) = self.options.validate() {
            return Err(Self::reject(err, report));
        }

        info!(
            run_id = %report.run_id,
            mode = %mode,
            catalog_version = %report.catalog_version,
            "Starting pricing sync"
        );

        let targets = self.models_in_scope(&scope, &mut report);
        let mut machine = SyncStateMachine::new();
        let mut queue = BatchQueue::new(Arc::clone(&self.store), self.options.max_batch_ops);
        let result = self
            .run_sync(mode, &targets, &mut machine, &mut queue, &mut report)
            .await;
        Self::finish_run(result, machine, &queue, report)
    }

    async fn run_sync(
        &self,
        mode: &SyncMode,
        targets: &[ModelTarget],
        machine: &mut SyncStateMachine,
        queue: &mut BatchQueue,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let now = Utc::now();
        for target in targets {
            machine.transition(SyncPhase::Planning)?;
            let existing = self.load_existing(target, report).await?;

            machine.transition(SyncPhase::Generating)?;
            let blueprint = self.build_blueprint(&target.device_id, true, report).await;

            machine.transition(SyncPhase::Diffing)?;
            let writes = self.diff(&blueprint, &existing, mode, now, report);
            debug!(
                device_id = %target.device_id,
                existing = existing.len(),
                writes = writes.len(),
                "diffed model"
            );

            machine.transition(SyncPhase::Committing)?;
            for (kind, op) in writes {
                queue.push(kind, op).await?;
            }
            report.processed_count += 1;
        }
        queue.flush().await?;
        machine.transition(SyncPhase::Done)
    }

    /// Reports which default records are missing from the store. Read-only.
    pub async fn analyze_gaps(&self, scope: &SyncScope) -> Result<GapReport, SyncError> {
        self.options.validate()?;
        let mut report = SyncReport::new("analyze_gaps".to_string(), self.catalog.version());
        let targets = self.models_in_scope(scope, &mut report);
        let mut gaps = Vec::new();

        for target in &targets {
            let existing = self.load_existing(target, &mut report).await?;
            let blueprint = self.build_blueprint(&target.device_id, false, &mut report).await;

            let missing = |keys: Vec<String>| -> Vec<String> {
                keys.into_iter().filter(|key| !existing.contains_key(key)).collect()
            };
            let gap = DeviceGap {
                device_id: target.device_id.clone(),
                missing_repair_keys: missing(blueprint.repair_keys()),
                missing_buyback_keys: missing(blueprint.buyback_keys()),
            };
            if gap.missing_count() > 0 {
                gaps.push(gap);
            }
        }

        let gap_report = GapReport {
            run_id: report.run_id,
            devices_checked: targets.len(),
            skipped_models: report.skipped_models,
            gaps,
            warnings: report.warnings,
        };
        info!(
            run_id = %gap_report.run_id,
            devices = gap_report.devices_checked,
            devices_with_gaps = gap_report.gaps.len(),
            missing = gap_report.total_missing(),
            "Gap analysis finished"
        );
        Ok(gap_report)
    }

    /// Safe-mode sync restricted to the devices listed in `gaps`.
    pub async fn generate_defaults_for_gaps(&self, gaps: &GapReport) -> Result<SyncReport, SyncAbort> {
        let scope = SyncScope::all().with_device_ids(gaps.device_ids());
        self.sync(&SyncMode::Safe, &scope).await
    }

    /// Removes ghost and schema-drifted records and re-keys misplaced ones.
    pub async fn deep_clean(&self, scope: &SyncScope) -> Result<SyncReport, SyncAbort> {
        let mut report = SyncReport::new("deep_clean".to_string(), self.catalog.version());
        if let Err(err) = self.options.validate() {
            return Err(Self::reject(err, report));
        }
        info!(run_id = %report.run_id, "Starting deep clean");

        let mut machine = SyncStateMachine::new();
        let mut queue = BatchQueue::new(Arc::clone(&self.store), self.options.max_batch_ops);
        let result = self.run_deep_clean(scope, &mut machine, &mut queue, &mut report).await;
        Self::finish_run(result, machine, &queue, report)
    }

    async fn run_deep_clean(
        &self,
        scope: &SyncScope,
        machine: &mut SyncStateMachine,
        queue: &mut BatchQueue,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        for brand in scope.brands_in(self.catalog.as_ref()) {
            let prefix = format!("{}-", brand.slug());
            for collection in [PriceCollection::Repair, PriceCollection::Buyback] {
                machine.transition(SyncPhase::Planning)?;
                let query = self.store.query_prefix(collection, &prefix);
                let mut records = read_store(SyncPhase::Planning, report, query).await?;
                records.retain(|r| scope.includes(r.document.device_id()));

                machine.transition(SyncPhase::Generating)?;
                let mut plan = plan_deep_clean(&records, self.catalog.as_ref());

                machine.transition(SyncPhase::Diffing)?;
                self.confirm_foreign_targets(&mut plan, &prefix, report).await?;
                if !plan.actions.is_empty() {
                    info!(
                        brand = %brand,
                        collection = %collection,
                        scanned = plan.scanned,
                        drift = plan.drift_count(),
                        ghosts = plan.ghost_count(),
                        rekeys = plan.rekey_count(),
                        "deep clean plan"
                    );
                }

                machine.transition(SyncPhase::Committing)?;
                report.processed_count += plan.scanned;
                for action in plan.actions {
                    for (kind, op) in action.into_ops() {
                        queue.push(kind, op).await?;
                    }
                }
            }
        }
        queue.flush().await?;
        machine.transition(SyncPhase::Done)
    }

    /// A rekey target outside the scanned prefix may already be occupied; the
    /// local scan cannot see it, so ask the store.
    async fn confirm_foreign_targets(
        &self,
        plan: &mut DeepCleanPlan,
        scanned_prefix: &str,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let foreign: Vec<(PriceCollection, String)> = plan
            .rekey_targets()
            .filter(|(_, key)| !key.starts_with(scanned_prefix))
            .map(|(collection, key)| (collection, key.to_string()))
            .collect();
        for (collection, key) in foreign {
            let lookup = self.store.get(collection, &key);
            let occupied = read_store(SyncPhase::Diffing, report, lookup).await?.is_some();
            if occupied {
                plan.demote_rekey_to_ghost(&key);
            }
        }
        Ok(())
    }

    /// Deletes buyback records whose capacity the catalog no longer lists.
    pub async fn prune_storage(&self, scope: &SyncScope) -> Result<SyncReport, SyncAbort> {
        let mut report = SyncReport::new("prune_storage".to_string(), self.catalog.version());
        if let Err(err) = self.options.validate() {
            return Err(Self::reject(err, report));
        }
        info!(run_id = %report.run_id, "Starting storage pruning");

        let targets = self.models_in_scope(scope, &mut report);
        let mut machine = SyncStateMachine::new();
        let mut queue = BatchQueue::new(Arc::clone(&self.store), self.options.max_batch_ops);
        let result = self
            .run_prune(&targets, &mut machine, &mut queue, &mut report)
            .await;
        Self::finish_run(result, machine, &queue, report)
    }

    async fn run_prune(
        &self,
        targets: &[ModelTarget],
        machine: &mut SyncStateMachine,
        queue: &mut BatchQueue,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        for target in targets {
            // Only explicit catalog lists are authoritative
            if target.storage.is_empty() {
                continue;
            }
            machine.transition(SyncPhase::Planning)?;
            let prefix = device_key_prefix(&target.device_id);
            let query = self.store.query_prefix(PriceCollection::Buyback, &prefix);
            let records = read_store(SyncPhase::Planning, report, query).await?;

            machine.transition(SyncPhase::Generating)?;
            machine.transition(SyncPhase::Diffing)?;
            let deletes = plan_storage_pruning(&records, &target.device_id, &target.storage);
            if !deletes.is_empty() {
                info!(
                    device_id = %target.device_id,
                    removed = deletes.len(),
                    "pruning buyback records for unlisted storage"
                );
            }

            machine.transition(SyncPhase::Committing)?;
            for op in deletes {
                queue.push(WriteKind::Delete, op).await?;
            }
            report.processed_count += 1;
        }
        queue.flush().await?;
        machine.transition(SyncPhase::Done)
    }

    fn finish_run(
        result: Result<(), SyncError>,
        mut machine: SyncStateMachine,
        queue: &BatchQueue,
        mut report: SyncReport,
    ) -> Result<SyncReport, SyncAbort> {
        report.apply_queue_stats(queue.stats());
        match result {
            Ok(()) => {
                report.final_phase = machine.phase();
                info!(
                    run_id = %report.run_id,
                    operation = %report.operation,
                    processed = report.processed_count,
                    created = report.created_count,
                    updated = report.updated_count,
                    deleted = report.deleted_count,
                    rekeyed = report.rekeyed_count,
                    batches = report.committed_batches,
                    "Run finished"
                );
                Ok(report)
            }
            Err(err) => {
                machine.fail();
                report.final_phase = machine.phase();
                error!(
                    run_id = %report.run_id,
                    operation = %report.operation,
                    committed_batches = report.committed_batches,
                    committed_ops = report.committed_ops,
                    "Run aborted: {}",
                    err
                );
                Err(SyncAbort::new(err, report))
            }
        }
    }

    fn reject(err: SyncError, mut report: SyncReport) -> SyncAbort {
        report.final_phase = SyncPhase::Failed;
        error!(run_id = %report.run_id, "Run rejected: {}", err);
        SyncAbort::new(err, report)
    }

    /// Catalog models in scope, validated and deduplicated by device id.
    fn models_in_scope(&self, scope: &SyncScope, report: &mut SyncReport) -> Vec<ModelTarget> {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        for brand in scope.brands_in(self.catalog.as_ref()) {
            for entry in self.catalog.entries(brand) {
                let device_id = entry.device_id();
                if !scope.includes(&device_id) {
                    continue;
                }
                if let Err(err) = entry.validate() {
                    warn!(device_id = %device_id, "Skipping catalog entry: {}", err);
                    report.warnings.push(err.to_string());
                    report.skipped_models += 1;
                    continue;
                }
                if seen.insert(device_id.clone()) {
                    targets.push(ModelTarget {
                        brand,
                        device_id,
                        storage: entry.storage,
                    });
                }
            }
        }
        debug!(models = targets.len(), "resolved sync scope");
        targets
    }

    /// Persisted records of one model, keyed by stored key.
    async fn load_existing(
        &self,
        target: &ModelTarget,
        report: &mut SyncReport,
    ) -> Result<HashMap<String, StoredPrice>, SyncError> {
        let prefix = device_key_prefix(&target.device_id);
        let query = self.store.query_prefix(PriceCollection::Repair, &prefix);
        let mut existing: HashMap<String, StoredPrice> = read_store(SyncPhase::Planning, report, query)
            .await?
            .into_iter()
            .map(|stored| (stored.key.clone(), stored))
            .collect();

        let planned = self.planned_buyback_keys(target);
        for chunk in planned.chunks(self.options.key_lookup_chunk) {
            let lookup = self.store.keys_in(PriceCollection::Buyback, chunk);
            let found = read_store(SyncPhase::Planning, report, lookup).await?;
            existing.extend(found.into_iter().map(|stored| (stored.key.clone(), stored)));
        }
        Ok(existing)
    }

    /// Buyback keys the model can produce, from the catalog storage list.
    fn planned_buyback_keys(&self, target: &ModelTarget) -> Vec<String> {
        let storage = self
            .catalog
            .resolve_storage(target.brand, &target.device_id)
            .unwrap_or_else(|_| DEFAULT_STORAGE.iter().map(ToString::to_string).collect());
        let keys: BTreeSet<String> = storage
            .iter()
            .flat_map(|capacity| {
                ConditionTier::ALL
                    .iter()
                    .map(move |tier| buyback_key(&target.device_id, capacity, *tier))
            })
            .collect();
        keys.into_iter().collect()
    }

    async fn build_blueprint(&self, device_id: &str, with_market: bool, report: &mut SyncReport) -> DeviceBlueprint {
        let mut blueprint = generate_defaults(device_id, self.catalog.as_ref());
        if let Some(warning) = &blueprint.storage_warning {
            warn!(device_id = %device_id, "{}", warning);
            report.warnings.push(warning.to_string());
        }

        if !(with_market && self.options.apply_market_overrides) {
            return blueprint;
        }
        let Some(market) = &self.market else {
            return blueprint;
        };
        match market.market_value(device_id).await {
            Ok(record) => {
                if apply_market_override(&mut blueprint, record.as_ref()) {
                    debug!(device_id = %device_id, "applied market override");
                    report.market_overrides += 1;
                }
            }
            Err(err) => {
                warn!(device_id = %device_id, "Market data lookup failed, using defaults: {:#}", err);
            }
        }
        blueprint
    }

    fn diff(
        &self,
        blueprint: &DeviceBlueprint,
        existing: &HashMap<String, StoredPrice>,
        mode: &SyncMode,
        now: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> Vec<(WriteKind, BatchOp)> {
        let device_id = blueprint.device_id();
        let currency = self.options.currency.as_str();

        let repairs = blueprint
            .repairs
            .iter()
            .map(|r| PriceDocument::Repair(r.to_record(device_id, currency, now)));
        let buybacks = blueprint
            .buyback_offers
            .iter()
            .flat_map(|offer| offer.to_records(device_id, currency, now))
            .map(PriceDocument::Buyback);

        let mut writes = Vec::new();
        for document in repairs.chain(buybacks) {
            let key = document.expected_key();
            match existing.get(&key) {
                None => writes.push((
                    WriteKind::Create,
                    BatchOp::Upsert {
                        key,
                        document,
                        merge: false,
                    },
                )),
                Some(_) if !mode.overwrites() => {}
                Some(StoredPrice {
                    document: PriceDocument::Repair(stored),
                    ..
                }) if stored.is_manual => {
                    report.skipped_manual += 1;
                }
                Some(_) => writes.push((
                    WriteKind::Update,
                    BatchOp::Upsert {
                        key,
                        document,
                        merge: true,
                    },
                )),
            }
        }
        writes
    }
}

/// Awaits a store read, counting it towards the run's read operations.
async fn read_store<T>(
    phase: SyncPhase,
    report: &mut SyncReport,
    read: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, SyncError> {
    report.read_ops += 1;
    read.await
        .map_err(|err| SyncError::store_read(phase, report.read_ops, &err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{BrandTables, DeviceCategory, StaticCatalog};
    use crate::test_utils::{RecordingStore, fixture_catalog};

    fn engine(store: Arc<RecordingStore>) -> PricingSyncEngine {
        PricingSyncEngine::new(Arc::new(fixture_catalog()), store)
    }

    #[test]
    fn scope_filter_is_case_insensitive() {
        let scope = SyncScope::all().with_device_filter("IPhone-15");
        assert!(scope.includes("apple-iphone-15-pro"));
        assert!(!scope.includes("apple-iphone-14"));

        let scope = SyncScope::all().with_device_ids(["apple-iphone-15"]);
        assert!(scope.includes("apple-iphone-15"));
        assert!(!scope.includes("apple-iphone-15-pro"));
    }

    #[test]
    fn options_outside_store_limits_are_rejected() {
        let options = EngineOptions {
            max_batch_ops: 501,
            ..EngineOptions::default()
        };
        assert!(matches!(options.validate(), Err(SyncError::InvalidOptions { .. })));
        let options = EngineOptions {
            key_lookup_chunk: 11,
            ..EngineOptions::default()
        };
        assert!(options.validate().is_err());
        assert!(EngineOptions::default().validate().is_ok());
    }

    #[tokio::test]
    async fn safe_sync_creates_then_writes_nothing() {
        let store = Arc::new(RecordingStore::new());
        let engine = engine(store.clone());

        let first = engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
        assert!(first.created_count > 0);
        assert_eq!(first.final_phase, SyncPhase::Done);

        let second = engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
        assert_eq!(second.write_count(), 0);
        assert_eq!(second.committed_batches, 0);
    }

    #[tokio::test]
    async fn planning_reads_in_small_chunks() {
        let store = Arc::new(RecordingStore::new());
        let engine = engine(store.clone());
        engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
        assert!(store.max_in_query_len() <= MAX_IN_QUERY_KEYS);
        assert!(store.max_in_query_len() > 0);
    }

    #[tokio::test]
    async fn empty_targeted_filter_is_rejected() {
        let store = Arc::new(RecordingStore::new());
        let abort = engine(store)
            .sync(&SyncMode::Targeted("  ".to_string()), &SyncScope::all())
            .await
            .unwrap_err();
        assert!(matches!(abort.error, SyncError::InvalidOptions { .. }));
        assert_eq!(abort.partial.final_phase, SyncPhase::Failed);
    }

    #[tokio::test]
    async fn gap_analysis_rejects_invalid_options() {
        let engine = engine(Arc::new(RecordingStore::new())).with_options(EngineOptions {
            key_lookup_chunk: 0,
            ..EngineOptions::default()
        });
        let err = engine.analyze_gaps(&SyncScope::all()).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidOptions { .. }));
    }

    #[tokio::test]
    async fn model_without_storage_list_syncs_default_storage_once() {
        let mut apple = BrandTables::new(DeviceCategory::Smartphone);
        apple.base_values.insert("iPhone 13".to_string(), 420);
        let catalog = StaticCatalog::new().with_brand(Brand::Apple, apple);
        let store = Arc::new(RecordingStore::new());
        let engine = PricingSyncEngine::new(Arc::new(catalog), store.clone());

        let first = engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
        assert_eq!(first.processed_count, 1);
        let buyback = store.keys(PriceCollection::Buyback);
        assert_eq!(buyback.len(), DEFAULT_STORAGE.len() * ConditionTier::ALL.len());
        assert!(buyback.iter().all(|k| k.contains("_128GB_") || k.contains("_256GB_")));

        let second = engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
        assert_eq!(second.write_count(), 0);
    }

    #[tokio::test]
    async fn invalid_entries_are_skipped_with_a_warning() {
        let store = Arc::new(RecordingStore::new());
        let report = engine(store)
            .sync(&SyncMode::Safe, &SyncScope::brand(Brand::Google))
            .await
            .unwrap();
        assert_eq!(report.skipped_models, 1);
        assert!(report.warnings.iter().any(|w| w.contains("no base value")));
    }
}
