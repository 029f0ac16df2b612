//! Device catalog
//!
//! The catalog is the static input of every sync run: per-brand tables of
//! `model → base value` and `model → valid storage capacities`. It is injected
//! through [`CatalogProvider`] so tests can substitute fixtures, and it is
//! never mutated once built.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::generators::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Apple,
    Samsung,
    Google,
    Xiaomi,
    OnePlus,
}

impl Brand {
    pub const ALL: [Self; 5] = [Self::Apple, Self::Samsung, Self::Google, Self::Xiaomi, Self::OnePlus];

    /// Lowercase slug used as the first segment of every device id
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Apple => "apple",
            Self::Samsung => "samsung",
            Self::Google => "google",
            Self::Xiaomi => "xiaomi",
            Self::OnePlus => "oneplus",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Apple => "Apple",
            Self::Samsung => "Samsung",
            Self::Google => "Google",
            Self::Xiaomi => "Xiaomi",
            Self::OnePlus => "OnePlus",
        }
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.slug() == slug)
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slug(&s.trim().to_ascii_lowercase()).ok_or_else(|| format!("unknown brand '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Smartphone,
    Tablet,
}

impl DeviceCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smartphone => "smartphone",
            Self::Tablet => "tablet",
        }
    }
}

/// Malformed catalog input. The affected model is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Catalog entry '{model}' ({brand}) has no base value")]
    MissingBaseValue { brand: Brand, model: String },

    #[error("Catalog entry '{model}' ({brand}) has a zero base value")]
    ZeroBaseValue { brand: Brand, model: String },

    #[error("Catalog entry for {brand} has an empty model name")]
    EmptyModelName { brand: Brand },
}

/// One model of the catalog, assembled from both brand tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCatalogEntry {
    pub brand: Brand,
    pub category: DeviceCategory,
    pub model: String,
    pub base_value: Option<u32>,
    pub storage: Vec<String>,
}

impl DeviceCatalogEntry {
    #[must_use]
    pub fn device_id(&self) -> String {
        device_slug(self.brand, &self.model)
    }

    /// Returns the base value of a well-formed entry.
    pub fn validate(&self) -> Result<u32, ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::EmptyModelName { brand: self.brand });
        }
        match self.base_value {
            None => Err(ValidationError::MissingBaseValue {
                brand: self.brand,
                model: self.model.clone(),
            }),
            Some(0) => Err(ValidationError::ZeroBaseValue {
                brand: self.brand,
                model: self.model.clone(),
            }),
            Some(value) => Ok(value),
        }
    }
}

/// Lowercase, hyphen-separated slug. `+` is spelled out as `plus`.
#[must_use]
pub fn slugify(text: &str) -> String {
    let expanded = text.replace('+', " plus ");
    let mut slug = String::with_capacity(expanded.len());
    for ch in expanded.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Device id for a brand + model name, e.g. `apple-iphone-15-pro`
#[must_use]
pub fn device_slug(brand: Brand, model: &str) -> String {
    format!("{}-{}", brand.slug(), slugify(model))
}

/// True when `device_id` names `model` exactly, or ends with it on a token boundary.
#[must_use]
pub fn matches_model(device_id: &str, model: &str) -> bool {
    let model_slug = slugify(model);
    if model_slug.is_empty() {
        return false;
    }
    device_id == model_slug || device_id.ends_with(&format!("-{model_slug}"))
}

/// Static tables of one brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandTables {
    pub category: DeviceCategory,
    pub base_values: BTreeMap<String, u32>,
    pub storage: BTreeMap<String, Vec<String>>,
}

impl BrandTables {
    #[must_use]
    pub fn new(category: DeviceCategory) -> Self {
        Self {
            category,
            base_values: BTreeMap::new(),
            storage: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: &str, base_value: u32, storage: &[&str]) -> Self {
        self.base_values.insert(model.to_string(), base_value);
        self.storage
            .insert(model.to_string(), storage.iter().map(ToString::to_string).collect());
        self
    }

    /// Models ordered longest name first, so "iPhone 15 Pro Max" wins over "iPhone 15".
    fn models_longest_first<'a, V>(table: &'a BTreeMap<String, V>) -> Vec<(&'a String, &'a V)> {
        let mut models: Vec<_> = table.iter().collect();
        models.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        models
    }
}

/// Read-only access to the device catalog
pub trait CatalogProvider: Send + Sync {
    /// Brands the catalog has tables for
    fn brands(&self) -> Vec<Brand>;

    fn tables(&self, brand: Brand) -> Option<&BrandTables>;

    /// Every model of a brand; a model present in only one table still appears.
    fn entries(&self, brand: Brand) -> Vec<DeviceCatalogEntry> {
        let Some(tables) = self.tables(brand) else {
            return Vec::new();
        };
        let models: BTreeSet<&String> = tables.base_values.keys().chain(tables.storage.keys()).collect();
        models
            .into_iter()
            .map(|model| DeviceCatalogEntry {
                brand,
                category: tables.category,
                model: model.clone(),
                base_value: tables.base_values.get(model).copied(),
                storage: tables.storage.get(model).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Storage capacities for a device id, matched longest-model-name-first.
    fn resolve_storage(&self, brand: Brand, device_id: &str) -> Result<Vec<String>, GenerationError> {
        let tables = self
            .tables(brand)
            .ok_or_else(|| GenerationError::NoStorageMatch { device_id: device_id.to_string() })?;

        BrandTables::models_longest_first(&tables.storage)
            .into_iter()
            .find(|(model, capacities)| !capacities.is_empty() && matches_model(device_id, model))
            .map(|(_, capacities)| capacities.clone())
            .ok_or_else(|| GenerationError::NoStorageMatch { device_id: device_id.to_string() })
    }

    /// Base value for a device id, matched the same way as storage.
    fn resolve_base_value(&self, brand: Brand, device_id: &str) -> Option<u32> {
        let tables = self.tables(brand)?;
        BrandTables::models_longest_first(&tables.base_values)
            .into_iter()
            .find(|(model, _)| matches_model(device_id, model))
            .map(|(_, value)| *value)
    }

    /// Fingerprint of the catalog content. Identical tables give identical versions.
    fn version(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for brand in self.brands() {
            let Some(tables) = self.tables(brand) else { continue };
            hasher.update(brand.slug().as_bytes());
            hasher.update(tables.category.as_str().as_bytes());
            for (model, value) in &tables.base_values {
                hasher.update(format!("b|{model}|{value}\n").as_bytes());
            }
            for (model, capacities) in &tables.storage {
                hasher.update(format!("s|{model}|{}\n", capacities.join(",")).as_bytes());
            }
        }
        hasher.finalize().to_hex()[..16].to_string()
    }
}

/// In-memory catalog built from static tables
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    brands: BTreeMap<Brand, BrandTables>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_brand(mut self, brand: Brand, tables: BrandTables) -> Self {
        self.brands.insert(brand, tables);
        self
    }
}

impl CatalogProvider for StaticCatalog {
    fn brands(&self) -> Vec<Brand> {
        self.brands.keys().copied().collect()
    }

    fn tables(&self, brand: Brand) -> Option<&BrandTables> {
        self.brands.get(&brand)
    }
}
