//! Application layer - sync engine and operator actions
//!
//! Orchestrates the domain generators against the persisted price store.

pub mod batch_queue;
pub mod deep_clean;
pub mod errors;
pub mod operator_actions;
pub mod storage_pruning;
pub mod sync_engine;
pub mod sync_state;

pub use errors::{SyncAbort, SyncError};
pub use operator_actions::{OperatorActions, SyncSummary};
pub use sync_engine::{EngineOptions, GapReport, PricingSyncEngine, SyncMode, SyncReport, SyncScope};
pub use sync_state::{SyncPhase, SyncStateMachine};
