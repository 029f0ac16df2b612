//! Ghost detection and schema-drift cleanup
//!
//! Planning is pure: given the persisted records of one collection and the
//! catalog, it decides which records to delete and which to move to their
//! recomputed key. The engine executes the plan through the batch queue.

use std::collections::{BTreeMap, BTreeSet};

use crate::application::batch_queue::WriteKind;
use crate::domain::catalog::CatalogProvider;
use crate::domain::generators::{DeviceBlueprint, generate_defaults};
use crate::domain::price_records::PriceDocument;
use crate::domain::repositories::{BatchOp, PriceCollection, StoredPrice};

#[derive(Debug, Clone, PartialEq)]
pub enum CleanAction {
    /// Variant combination is no longer produced by the generator
    DeleteDrift { collection: PriceCollection, key: String },
    /// Misplaced copy of a record that already exists under its expected key
    DeleteGhost {
        collection: PriceCollection,
        key: String,
        expected_key: String,
    },
    /// Misplaced record moved to its expected key
    Rekey {
        collection: PriceCollection,
        old_key: String,
        new_key: String,
        document: PriceDocument,
    },
}

impl CleanAction {
    pub fn into_ops(self) -> Vec<(WriteKind, BatchOp)> {
        match self {
            Self::DeleteDrift { collection, key } | Self::DeleteGhost { collection, key, .. } => {
                vec![(WriteKind::Delete, BatchOp::Delete { collection, key })]
            }
            Self::Rekey {
                collection,
                old_key,
                new_key,
                document,
            } => vec![
                (
                    WriteKind::Rekey,
                    BatchOp::Upsert {
                        key: new_key,
                        document,
                        merge: false,
                    },
                ),
                (
                    WriteKind::RekeySource,
                    BatchOp::Delete {
                        collection,
                        key: old_key,
                    },
                ),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeepCleanPlan {
    pub scanned: usize,
    pub actions: Vec<CleanAction>,
}

impl DeepCleanPlan {
    #[must_use]
    pub fn drift_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, CleanAction::DeleteDrift { .. }))
            .count()
    }

    #[must_use]
    pub fn ghost_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, CleanAction::DeleteGhost { .. }))
            .count()
    }

    #[must_use]
    pub fn rekey_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, CleanAction::Rekey { .. }))
            .count()
    }

    /// (collection, new key) of every planned rekey
    pub fn rekey_targets(&self) -> impl Iterator<Item = (PriceCollection, &str)> {
        self.actions.iter().filter_map(|action| match action {
            CleanAction::Rekey {
                collection, new_key, ..
            } => Some((*collection, new_key.as_str())),
            _ => None,
        })
    }

    /// Turns the rekey onto `new_key` into a ghost deletion, for targets found
    /// occupied outside the scanned range.
    pub fn demote_rekey_to_ghost(&mut self, new_key: &str) {
        for action in &mut self.actions {
            let ghost = match action {
                CleanAction::Rekey {
                    collection,
                    old_key,
                    new_key: target,
                    ..
                } if target.as_str() == new_key => CleanAction::DeleteGhost {
                    collection: *collection,
                    key: old_key.clone(),
                    expected_key: target.clone(),
                },
                _ => continue,
            };
            *action = ghost;
        }
    }
}

/// True when the generator prices this issue but not this variant combination.
fn has_schema_drift(blueprint: &DeviceBlueprint, document: &PriceDocument) -> bool {
    match document {
        PriceDocument::Repair(record) => {
            blueprint.covers_issue(&record.issue_id)
                && !blueprint.allows_variant(&record.issue_id, &record.variants)
        }
        PriceDocument::Buyback(_) => false,
    }
}

/// Plans the cleanup of one collection.
///
/// Records are visited in key order. Drifted records are deleted first; a
/// record stored under the wrong key is deleted when its expected key is
/// taken, otherwise moved there.
#[must_use]
pub fn plan_deep_clean(records: &[StoredPrice], catalog: &dyn CatalogProvider) -> DeepCleanPlan {
    let mut sorted: Vec<&StoredPrice> = records.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let mut occupied: BTreeSet<String> = sorted.iter().map(|r| r.key.clone()).collect();
    let mut blueprints: BTreeMap<String, DeviceBlueprint> = BTreeMap::new();
    let mut plan = DeepCleanPlan {
        scanned: sorted.len(),
        actions: Vec::new(),
    };

    for stored in sorted {
        let collection = stored.collection();
        let device_id = stored.document.device_id();
        let blueprint = blueprints
            .entry(device_id.to_string())
            .or_insert_with(|| generate_defaults(device_id, catalog));

        if has_schema_drift(blueprint, &stored.document) {
            occupied.remove(&stored.key);
            plan.actions.push(CleanAction::DeleteDrift {
                collection,
                key: stored.key.clone(),
            });
            continue;
        }

        let expected_key = stored.document.expected_key();
        if stored.key == expected_key {
            continue;
        }

        occupied.remove(&stored.key);
        if occupied.contains(&expected_key) {
            plan.actions.push(CleanAction::DeleteGhost {
                collection,
                key: stored.key.clone(),
                expected_key,
            });
        } else {
            occupied.insert(expected_key.clone());
            plan.actions.push(CleanAction::Rekey {
                collection,
                old_key: stored.key.clone(),
                new_key: expected_key,
                document: stored.document.clone(),
            });
        }
    }
    plan
}
