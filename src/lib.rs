//! pricing-sync - catalog-driven repair and buyback price synchronization
//!
//! Derives repair and trade-in price records from a device catalog and brand
//! heuristics, optionally patched with market data, and reconciles them
//! against a persisted price store.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use application::{OperatorActions, PricingSyncEngine, SyncMode, SyncReport, SyncScope, SyncSummary};
pub use domain::catalog_data::builtin_catalog;
