//! Domain module - pricing rules, catalog, generators and store interfaces
//!
//! Everything in here is pure except the provider/store traits, which the
//! infrastructure layer implements.

pub mod catalog;
pub mod catalog_data;
pub mod descriptor;
pub mod generators;
pub mod market;
pub mod price_records;
pub mod pricing;
pub mod repositories;
pub mod variants;

pub use catalog::{Brand, CatalogProvider, DeviceCatalogEntry, StaticCatalog, ValidationError};
pub use descriptor::DeviceDescriptor;
pub use generators::{DeviceBlueprint, GenerationError, generate_defaults};
pub use market::{MarketDataProvider, MarketValueRecord};
pub use price_records::{BuybackPriceRecord, ConditionTier, PriceDocument, RepairPriceRecord};
pub use repositories::{BatchOp, PriceCollection, PriceStore, StoredPrice, WriteBatch};
pub use variants::Variants;
