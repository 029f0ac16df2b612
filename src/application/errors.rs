//! Sync error taxonomy
//!
//! Store failures never reach the operator raw: the engine maps them into
//! [`SyncError`] and hands back whatever was already committed in a
//! [`SyncAbort`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::sync_engine::SyncReport;
use crate::application::sync_state::SyncPhase;

pub use crate::domain::catalog::ValidationError;
pub use crate::domain::generators::GenerationError;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncError {
    #[error("Store read failed during {phase} after {attempted_ops} operations: {message}")]
    StoreRead {
        phase: SyncPhase,
        attempted_ops: usize,
        message: String,
    },

    #[error("Batch commit failed after {committed_batches} committed batches ({committed_ops} operations): {message}")]
    StoreWrite {
        committed_batches: usize,
        committed_ops: usize,
        message: String,
    },

    #[error("Invalid sync phase transition: {from} -> {to}")]
    InvalidTransition { from: SyncPhase, to: SyncPhase },

    #[error("Invalid sync options: {message}")]
    InvalidOptions { message: String },
}

impl SyncError {
    pub(crate) fn store_read(phase: SyncPhase, attempted_ops: usize, err: &anyhow::Error) -> Self {
        Self::StoreRead {
            phase,
            attempted_ops,
            message: format!("{err:#}"),
        }
    }
}

/// A run that stopped partway. `partial` reflects what was committed.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct SyncAbort {
    pub error: SyncError,
    pub partial: SyncReport,
}

impl SyncAbort {
    #[must_use]
    pub fn new(error: SyncError, partial: SyncReport) -> Self {
        Self { error, partial }
    }
}
