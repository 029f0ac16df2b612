//! Variant dimensions of a repair price (e.g. `quality = oled-soft`).
//!
//! Variants are kept in a `BTreeMap` so iteration order is always the sorted
//! key order. That order is the canonical form used to derive identity keys;
//! nothing else should branch on the serialized form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity fragment used when a record has no variant dimensions
pub const BASE_VARIANT: &str = "base";

/// Separator between identity key segments
pub const KEY_SEPARATOR: &str = "_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variants(BTreeMap<String, String>);

impl Variants {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Single-dimension variant set
    #[must_use]
    pub fn single(dimension: &str, value: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert(dimension.to_string(), value.to_string());
        Self(map)
    }

    #[must_use]
    pub fn with(mut self, dimension: &str, value: &str) -> Self {
        self.0.insert(dimension.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.0.get(dimension).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values in sorted-key order joined by `_`, or `base` when empty.
    #[must_use]
    pub fn identity_fragment(&self) -> String {
        if self.0.is_empty() {
            return BASE_VARIANT.to_string();
        }
        let values: Vec<&str> = self.0.values().map(String::as_str).collect();
        values.join(KEY_SEPARATOR)
    }

    /// Canonical JSON form (sorted keys) used for persistence.
    #[must_use]
    pub fn to_canonical_json(&self) -> String {
        // A map of strings always serializes
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::none());
        }
        serde_json::from_str(raw)
    }
}

impl fmt::Display for Variants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity_fragment())
    }
}

impl FromIterator<(String, String)> for Variants {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
