//! Storage pruning
//!
//! Buyback records for a capacity the catalog no longer lists for a model are
//! deleted, across all condition tiers.

use crate::domain::price_records::PriceDocument;
use crate::domain::repositories::{BatchOp, PriceCollection, StoredPrice};

/// Deletes for every buyback record of `device_id` whose storage is not in `allowed`.
#[must_use]
pub fn plan_storage_pruning(records: &[StoredPrice], device_id: &str, allowed: &[String]) -> Vec<BatchOp> {
    records
        .iter()
        .filter_map(|stored| match &stored.document {
            PriceDocument::Buyback(record)
                if record.device_id == device_id && !allowed.contains(&record.storage) =>
            {
                Some(BatchOp::Delete {
                    collection: PriceCollection::Buyback,
                    key: stored.key.clone(),
                })
            }
            _ => None,
        })
        .collect()
}
