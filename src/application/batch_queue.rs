//! Bounded write queue
//!
//! Operations accumulate until the commit limit is reached, then the pending
//! batch is committed and awaited before more are accepted. A failed commit
//! leaves earlier batches applied and drops the rest of the queue.

use std::sync::Arc;
use tracing::debug;

use crate::application::errors::SyncError;
use crate::domain::repositories::{BatchOp, MAX_BATCH_OPERATIONS, PriceStore, WriteBatch};

/// What a queued operation means for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Create,
    Update,
    Delete,
    /// Write under the recomputed key
    Rekey,
    /// Removal of the old key after a rekey
    RekeySource,
}

/// Counters of what the queue has committed so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub committed_batches: usize,
    pub committed_ops: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub rekeyed: usize,
}

impl QueueStats {
    fn record(&mut self, kind: WriteKind) {
        match kind {
            WriteKind::Create => self.created += 1,
            WriteKind::Update => self.updated += 1,
            WriteKind::Delete => self.deleted += 1,
            WriteKind::Rekey => self.rekeyed += 1,
            WriteKind::RekeySource => {}
        }
    }
}

pub struct BatchQueue {
    store: Arc<dyn PriceStore>,
    limit: usize,
    pending: WriteBatch,
    pending_kinds: Vec<WriteKind>,
    stats: QueueStats,
}

impl BatchQueue {
    /// `limit` is clamped to `1..=MAX_BATCH_OPERATIONS`.
    #[must_use]
    pub fn new(store: Arc<dyn PriceStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.clamp(1, MAX_BATCH_OPERATIONS),
            pending: WriteBatch::new(),
            pending_kinds: Vec::new(),
            stats: QueueStats::default(),
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub const fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Queues an operation, committing the pending batch once it is full.
    pub async fn push(&mut self, kind: WriteKind, op: BatchOp) -> Result<(), SyncError> {
        self.pending.push(op);
        self.pending_kinds.push(kind);
        if self.pending.len() >= self.limit {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), SyncError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let kinds = std::mem::take(&mut self.pending_kinds);
        let size = batch.len();

        if let Err(err) = self.store.commit(batch).await {
            return Err(SyncError::StoreWrite {
                committed_batches: self.stats.committed_batches,
                committed_ops: self.stats.committed_ops,
                message: format!("{err:#}"),
            });
        }

        self.stats.committed_batches += 1;
        self.stats.committed_ops += size;
        for kind in kinds {
            self.stats.record(kind);
        }
        debug!(
            batch = self.stats.committed_batches,
            ops = size,
            total_ops = self.stats.committed_ops,
            "committed batch"
        );
        Ok(())
    }

    /// Flushes what is left and returns the final counters.
    pub async fn finish(mut self) -> Result<QueueStats, SyncError> {
        self.flush().await?;
        Ok(self.stats)
    }
}
