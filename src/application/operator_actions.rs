//! Operator-facing triggers
//!
//! Thin wrappers over [`PricingSyncEngine`]. Each action runs one engine
//! operation and folds the outcome, success or abort, into a [`SyncSummary`].
//! Nothing here retries; re-running an action is the retry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::errors::{SyncAbort, SyncError};
use crate::application::sync_engine::{GapReport, PricingSyncEngine, SyncMode, SyncReport, SyncScope};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    pub processed_count: usize,
    pub created_count: usize,
    pub updated_count: usize,
    pub deleted_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_report: Option<GapReport>,
}

impl SyncSummary {
    fn from_report(report: SyncReport) -> Self {
        let mut message = format!(
            "{}: {} processed, {} created, {} updated, {} deleted",
            report.operation,
            report.processed_count,
            report.created_count,
            report.updated_count,
            report.deleted_count
        );
        if report.rekeyed_count > 0 {
            message.push_str(&format!(", {} re-keyed", report.rekeyed_count));
        }
        if report.skipped_manual > 0 {
            message.push_str(&format!(", {} manual kept", report.skipped_manual));
        }
        Self {
            success: true,
            processed_count: report.processed_count,
            created_count: report.created_count,
            updated_count: report.updated_count,
            deleted_count: report.deleted_count,
            errors: Vec::new(),
            warnings: report.warnings,
            message,
            gap_report: None,
        }
    }

    fn from_abort(abort: SyncAbort) -> Self {
        let partial = abort.partial;
        Self {
            success: false,
            processed_count: partial.processed_count,
            created_count: partial.created_count,
            updated_count: partial.updated_count,
            deleted_count: partial.deleted_count,
            errors: vec![abort.error.to_string()],
            warnings: partial.warnings,
            message: format!(
                "{} aborted after {} committed batches; re-run to continue",
                partial.operation, partial.committed_batches
            ),
            gap_report: None,
        }
    }

    fn from_outcome(outcome: Result<SyncReport, SyncAbort>) -> Self {
        match outcome {
            Ok(report) => Self::from_report(report),
            Err(abort) => Self::from_abort(abort),
        }
    }

    fn empty() -> Self {
        Self {
            success: true,
            processed_count: 0,
            created_count: 0,
            updated_count: 0,
            deleted_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            message: String::new(),
            gap_report: None,
        }
    }

    fn read_failure(operation: &str, err: &SyncError) -> Self {
        Self {
            success: false,
            errors: vec![err.to_string()],
            message: format!("{operation} failed"),
            ..Self::empty()
        }
    }
}

pub struct OperatorActions {
    engine: Arc<PricingSyncEngine>,
}

impl OperatorActions {
    pub fn new(engine: Arc<PricingSyncEngine>) -> Self {
        Self { engine }
    }

    /// Lists missing default records without writing anything.
    pub async fn analyze_gaps(&self, scope: &SyncScope) -> SyncSummary {
        match self.engine.analyze_gaps(scope).await {
            Ok(gaps) => SyncSummary {
                processed_count: gaps.devices_checked,
                warnings: gaps.warnings.clone(),
                message: format!(
                    "{} of {} devices have gaps ({} missing records)",
                    gaps.gaps.len(),
                    gaps.devices_checked,
                    gaps.total_missing()
                ),
                gap_report: Some(gaps),
                ..SyncSummary::empty()
            },
            Err(err) => SyncSummary::read_failure("analyze_gaps", &err),
        }
    }

    /// Analyzes gaps, then fills them with a safe sync of the affected devices.
    pub async fn generate_defaults_for_gaps(&self, scope: &SyncScope) -> SyncSummary {
        let gaps = match self.engine.analyze_gaps(scope).await {
            Ok(gaps) => gaps,
            Err(err) => return SyncSummary::read_failure("generate_defaults_for_gaps", &err),
        };
        if gaps.gaps.is_empty() {
            return SyncSummary {
                message: "No gaps found".to_string(),
                processed_count: gaps.devices_checked,
                warnings: gaps.warnings.clone(),
                gap_report: Some(gaps),
                ..SyncSummary::empty()
            };
        }
        let mut summary = SyncSummary::from_outcome(self.engine.generate_defaults_for_gaps(&gaps).await);
        summary.gap_report = Some(gaps);
        summary
    }

    /// Seeds every catalog model, either safe (insert only) or overwrite.
    pub async fn seed_all(&self, overwrite: bool) -> SyncSummary {
        let mode = if overwrite { SyncMode::Overwrite } else { SyncMode::Safe };
        SyncSummary::from_outcome(self.engine.sync(&mode, &SyncScope::all()).await)
    }

    /// Overwrites the models whose device id contains `filter`.
    pub async fn seed_targeted(&self, filter: &str) -> SyncSummary {
        let mode = SyncMode::Targeted(filter.to_string());
        SyncSummary::from_outcome(self.engine.sync(&mode, &SyncScope::all()).await)
    }

    pub async fn deep_clean(&self, scope: &SyncScope) -> SyncSummary {
        SyncSummary::from_outcome(self.engine.deep_clean(scope).await)
    }

    pub async fn prune_storage(&self, scope: &SyncScope) -> SyncSummary {
        SyncSummary::from_outcome(self.engine.prune_storage(scope).await)
    }
}
