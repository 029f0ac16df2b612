//! Store interfaces for persisted price records
//!
//! The store is a key-value document store with two collections. It supports
//! point reads, prefix-range queries, small `key IN (...)` lookups and batched
//! writes that commit as a unit.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::price_records::PriceDocument;

/// Hard cap on operations in one committed batch
pub const MAX_BATCH_OPERATIONS: usize = 500;

/// Hard cap on keys in one `IN` lookup
pub const MAX_IN_QUERY_KEYS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceCollection {
    Repair,
    Buyback,
}

impl PriceCollection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Repair => "repair_prices",
            Self::Buyback => "buyback_prices",
        }
    }

    #[must_use]
    pub const fn of(document: &PriceDocument) -> Self {
        match document {
            PriceDocument::Repair(_) => Self::Repair,
            PriceDocument::Buyback(_) => Self::Buyback,
        }
    }
}

impl fmt::Display for PriceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted document together with the key it is stored under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrice {
    pub key: String,
    pub document: PriceDocument,
}

impl StoredPrice {
    #[must_use]
    pub fn collection(&self) -> PriceCollection {
        PriceCollection::of(&self.document)
    }

    /// True when the stored key is the one the record's own fields produce
    #[must_use]
    pub fn key_is_canonical(&self) -> bool {
        self.key == self.document.expected_key()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Writes `document` under `key`. With `merge`, an existing repair record
    /// keeps its `active` and `is_manual` flags.
    Upsert {
        key: String,
        document: PriceDocument,
        merge: bool,
    },
    Delete {
        collection: PriceCollection,
        key: String,
    },
}

impl BatchOp {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Upsert { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Operations committed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

impl From<Vec<BatchOp>> for WriteBatch {
    fn from(ops: Vec<BatchOp>) -> Self {
        Self { ops }
    }
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn get(&self, collection: PriceCollection, key: &str) -> Result<Option<StoredPrice>>;

    /// Every document whose key starts with `prefix`, ordered by key
    async fn query_prefix(&self, collection: PriceCollection, prefix: &str) -> Result<Vec<StoredPrice>>;

    /// Documents stored under any of `keys` (at most [`MAX_IN_QUERY_KEYS`])
    async fn keys_in(&self, collection: PriceCollection, keys: &[String]) -> Result<Vec<StoredPrice>>;

    /// Applies the whole batch or nothing (at most [`MAX_BATCH_OPERATIONS`])
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}
