//! End-to-end sync runs against an in-memory SQLite store
use std::sync::Arc;

use anyhow::Result;
use pricing_sync_lib::application::{
    EngineOptions, OperatorActions, PricingSyncEngine, SyncError, SyncMode, SyncPhase, SyncScope,
};
use pricing_sync_lib::domain::catalog::{Brand, BrandTables, DeviceCategory, StaticCatalog};
use pricing_sync_lib::domain::market::PartCosts;
use pricing_sync_lib::domain::price_records::{ConditionTier, PriceDocument};
use pricing_sync_lib::domain::repositories::{BatchOp, PriceCollection, PriceStore, WriteBatch};
use pricing_sync_lib::domain::variants::Variants;
use pricing_sync_lib::domain::MarketValueRecord;
use pricing_sync_lib::infrastructure::SqlitePriceStore;
use pricing_sync_lib::test_utils::{RecordingStore, TestContext, buyback_record, fixture_catalog, repair_record};

const PRO: &str = "apple-iphone-15-pro";

fn only(device_id: &str) -> SyncScope {
    SyncScope::all().with_device_ids([device_id])
}

async fn repair_price(store: &SqlitePriceStore, key: &str) -> Result<Option<(u32, f64, bool)>> {
    Ok(store.get(PriceCollection::Repair, key).await?.map(|stored| match stored.document {
        PriceDocument::Repair(r) => (r.price, r.part_cost, r.is_manual),
        PriceDocument::Buyback(_) => panic!("repair key holds a buyback record"),
    }))
}

async fn set_repair_price(ctx: &TestContext, key: &str, price: u32, manual: bool) -> Result<()> {
    sqlx::query("UPDATE repair_prices SET price = ?, is_manual = ? WHERE key = ?")
        .bind(i64::from(price))
        .bind(manual)
        .bind(key)
        .execute(&ctx.database.pool())
        .await?;
    Ok(())
}

#[tokio::test]
async fn iphone_15_pro_safe_sync_end_to_end() -> Result<()> {
    let ctx = TestContext::new().await?;

    let report = ctx.engine.sync(&SyncMode::Safe, &only(PRO)).await.unwrap();
    assert_eq!(report.final_phase, SyncPhase::Done);
    assert_eq!(report.processed_count, 1);

    let repairs = ctx.store.query_prefix(PriceCollection::Repair, "apple-iphone-15-pro_").await?;
    let buybacks = ctx.store.query_prefix(PriceCollection::Buyback, "apple-iphone-15-pro_").await?;
    // 3 screen qualities + battery, charging port, rear camera, back glass
    assert_eq!(repairs.len(), 7);
    assert_eq!(buybacks.len(), 3 * 5);
    assert_eq!(report.created_count, 7 + 15);

    let (_, part_cost, manual) = repair_price(&ctx.store, "apple-iphone-15-pro_screen_oled-soft").await?.unwrap();
    assert!((part_cost - 190.0).abs() < f64::EPSILON);
    assert!(!manual);

    let again = ctx.engine.sync(&SyncMode::Safe, &only(PRO)).await.unwrap();
    assert_eq!(again.created_count, 0);
    assert_eq!(again.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn safe_sync_of_whole_catalog_is_idempotent() -> Result<()> {
    let ctx = TestContext::new().await?;
    let first = ctx.engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
    assert_eq!(first.processed_count, 4);
    assert_eq!(first.skipped_models, 1);

    let total = ctx.store.count(PriceCollection::Repair).await? + ctx.store.count(PriceCollection::Buyback).await?;
    assert_eq!(total as usize, first.created_count);

    let second = ctx.engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
    assert_eq!(second.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn overwrite_restores_prices_but_never_touches_manual_records() -> Result<()> {
    let ctx = TestContext::new().await?;
    ctx.engine.sync(&SyncMode::Safe, &only(PRO)).await.unwrap();

    let battery = "apple-iphone-15-pro_battery_base";
    let port = "apple-iphone-15-pro_charging-port_base";
    let (original_port_price, _, _) = repair_price(&ctx.store, port).await?.unwrap();
    set_repair_price(&ctx, battery, 1, true).await?;
    set_repair_price(&ctx, port, 1, false).await?;

    let report = ctx.engine.sync(&SyncMode::Overwrite, &only(PRO)).await.unwrap();
    assert_eq!(report.skipped_manual, 1);
    assert_eq!(report.created_count, 0);
    assert_eq!(report.updated_count, 7 + 15 - 1);

    let (battery_price, _, battery_manual) = repair_price(&ctx.store, battery).await?.unwrap();
    assert_eq!(battery_price, 1);
    assert!(battery_manual);
    let (port_price, _, port_manual) = repair_price(&ctx.store, port).await?.unwrap();
    assert_eq!(port_price, original_port_price);
    assert!(!port_manual);
    Ok(())
}

#[tokio::test]
async fn targeted_seed_only_touches_matching_devices() -> Result<()> {
    let ctx = TestContext::new().await?;
    ctx.engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap();
    set_repair_price(&ctx, "apple-iphone-15-pro_battery_base", 1, false).await?;
    set_repair_price(&ctx, "apple-iphone-14_battery_base", 1, false).await?;

    let report = ctx
        .engine
        .sync(&SyncMode::Targeted("IPHONE-15-PRO".to_string()), &SyncScope::all())
        .await
        .unwrap();
    assert_eq!(report.processed_count, 1);

    let (pro_price, _, _) = repair_price(&ctx.store, "apple-iphone-15-pro_battery_base").await?.unwrap();
    assert!(pro_price > 1);
    let (old_price, _, _) = repair_price(&ctx.store, "apple-iphone-14_battery_base").await?.unwrap();
    assert_eq!(old_price, 1);
    Ok(())
}

#[tokio::test]
async fn market_values_replace_estimates() -> Result<()> {
    let ctx = TestContext::new().await?;
    ctx.market
        .upsert(&MarketValueRecord {
            device_id: PRO.to_string(),
            avg_price: Some(1000.0),
            part_costs: PartCosts {
                screen: Some(200.0),
                battery: None,
            },
        })
        .await?;

    let report = ctx.engine.sync(&SyncMode::Safe, &only(PRO)).await.unwrap();
    assert_eq!(report.market_overrides, 1);

    let (_, part_cost, _) = repair_price(&ctx.store, "apple-iphone-15-pro_screen_oled-soft").await?.unwrap();
    assert!((part_cost - 200.0).abs() < f64::EPSILON);

    let stored = ctx
        .store
        .get(PriceCollection::Buyback, "apple-iphone-15-pro_128GB_new")
        .await?
        .unwrap();
    let PriceDocument::Buyback(record) = stored.document else {
        panic!("expected buyback record");
    };
    assert_eq!(record.price, 530);
    assert_eq!(record.market_value, Some(1000.0));
    Ok(())
}

#[tokio::test]
async fn failed_commit_reports_what_was_already_written() {
    let store = Arc::new(RecordingStore::failing_after(1));
    let engine = PricingSyncEngine::new(Arc::new(fixture_catalog()), store.clone()).with_options(EngineOptions {
        max_batch_ops: 5,
        ..EngineOptions::default()
    });

    let abort = engine.sync(&SyncMode::Safe, &SyncScope::all()).await.unwrap_err();
    assert!(matches!(
        abort.error,
        SyncError::StoreWrite {
            committed_batches: 1,
            committed_ops: 5,
            ..
        }
    ));
    assert_eq!(abort.partial.final_phase, SyncPhase::Failed);
    assert_eq!(abort.partial.created_count, 5);
    assert_eq!(store.batch_sizes(), vec![5]);
}

#[tokio::test]
async fn rerun_after_partial_failure_fills_the_rest() -> Result<()> {
    let ctx = TestContext::new().await?;
    let options = EngineOptions {
        max_batch_ops: 5,
        ..EngineOptions::default()
    };

    // Simulate a run that stopped after its first batch
    let first_batch: Vec<BatchOp> = ["battery", "rear-camera"]
        .iter()
        .map(|issue| {
            let document = PriceDocument::Repair(repair_record(PRO, issue, Variants::none()));
            BatchOp::Upsert {
                key: document.expected_key(),
                document,
                merge: false,
            }
        })
        .collect();
    ctx.store.commit(WriteBatch::from(first_batch)).await?;

    let engine = PricingSyncEngine::new(Arc::new(fixture_catalog()), ctx.store.clone()).with_options(options);
    let report = engine.sync(&SyncMode::Safe, &only(PRO)).await.unwrap();
    assert_eq!(report.created_count, 7 + 15 - 2);
    assert_eq!(report.committed_batches, 4);
    Ok(())
}

#[tokio::test]
async fn deep_clean_converges() -> Result<()> {
    let ctx = TestContext::new().await?;
    let battery = PriceDocument::Repair(repair_record(PRO, "battery", Variants::none()));
    let like_new = PriceDocument::Buyback(buyback_record(PRO, "256GB", ConditionTier::LikeNew));
    let drifted = PriceDocument::Repair(repair_record(PRO, "screen", Variants::single("quality", "premium")));

    let seed = vec![
        BatchOp::Upsert {
            key: "apple-iphone-15-pro_battery_legacy".to_string(),
            document: battery.clone(),
            merge: false,
        },
        BatchOp::Upsert {
            key: like_new.expected_key(),
            document: like_new.clone(),
            merge: false,
        },
        BatchOp::Upsert {
            key: "apple-iphone-15-pro_256GB_likenew".to_string(),
            document: like_new.clone(),
            merge: false,
        },
        BatchOp::Upsert {
            key: drifted.expected_key(),
            document: drifted,
            merge: false,
        },
    ];
    ctx.store.commit(WriteBatch::from(seed)).await?;

    let report = ctx.engine.deep_clean(&SyncScope::brand(Brand::Apple)).await.unwrap();
    assert_eq!(report.rekeyed_count, 1);
    assert_eq!(report.deleted_count, 2);
    assert_eq!(report.final_phase, SyncPhase::Done);

    let repair_keys: Vec<String> = ctx
        .store
        .query_prefix(PriceCollection::Repair, "apple-")
        .await?
        .into_iter()
        .map(|s| s.key)
        .collect();
    assert_eq!(repair_keys, vec![battery.expected_key()]);
    assert_eq!(ctx.store.count(PriceCollection::Buyback).await?, 1);

    let second = ctx.engine.deep_clean(&SyncScope::brand(Brand::Apple)).await.unwrap();
    assert_eq!(second.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn pruning_follows_catalog_storage_changes() -> Result<()> {
    let ctx = TestContext::new().await?;
    ctx.engine.sync(&SyncMode::Safe, &only(PRO)).await.unwrap();
    assert_eq!(ctx.store.count(PriceCollection::Buyback).await?, 15);

    let trimmed = StaticCatalog::new().with_brand(
        Brand::Apple,
        BrandTables::new(DeviceCategory::Smartphone).with_model("iPhone 15 Pro", 780, &["128GB", "256GB"]),
    );
    let engine = PricingSyncEngine::new(Arc::new(trimmed), ctx.store.clone());
    let report = engine.prune_storage(&only(PRO)).await.unwrap();
    assert_eq!(report.deleted_count, 5);

    let remaining = ctx.store.query_prefix(PriceCollection::Buyback, "apple-iphone-15-pro_").await?;
    assert_eq!(remaining.len(), 10);
    assert!(remaining.iter().all(|s| !s.key.contains("_512GB_")));

    let again = engine.prune_storage(&only(PRO)).await.unwrap();
    assert_eq!(again.deleted_count, 0);
    Ok(())
}

#[tokio::test]
async fn operator_gap_workflow() -> Result<()> {
    let ctx = TestContext::new().await?;
    let engine = PricingSyncEngine::new(Arc::new(fixture_catalog()), ctx.store.clone());
    let actions = OperatorActions::new(Arc::new(engine));

    let analysis = actions.analyze_gaps(&SyncScope::all()).await;
    assert!(analysis.success);
    let gaps = analysis.gap_report.unwrap();
    assert_eq!(gaps.devices_checked, 4);
    assert_eq!(gaps.gaps.len(), 4);
    assert_eq!(gaps.skipped_models, 1);
    assert_eq!(ctx.store.count(PriceCollection::Repair).await?, 0);

    let filled = actions.generate_defaults_for_gaps(&SyncScope::all()).await;
    assert!(filled.success, "{:?}", filled.errors);
    assert_eq!(filled.created_count, gaps.total_missing());

    let after = actions.analyze_gaps(&SyncScope::all()).await;
    assert!(after.gap_report.unwrap().gaps.is_empty());

    let targeted = actions.seed_targeted("").await;
    assert!(!targeted.success);
    assert!(!targeted.errors.is_empty());
    Ok(())
}
