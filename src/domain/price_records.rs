//! Persisted price records and their identity keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::variants::{KEY_SEPARATOR, Variants};

/// Trade-in condition tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionTier {
    New,
    LikeNew,
    Good,
    Fair,
    Damaged,
}

impl ConditionTier {
    pub const ALL: [Self; 5] = [Self::New, Self::LikeNew, Self::Good, Self::Fair, Self::Damaged];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::LikeNew => "like-new",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Damaged => "damaged",
        }
    }
}

impl fmt::Display for ConditionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| format!("unknown condition tier '{s}'"))
    }
}

/// Identity key of a repair price: `device_issue_variants`
#[must_use]
pub fn repair_key(device_id: &str, issue_id: &str, variants: &Variants) -> String {
    format!(
        "{device_id}{KEY_SEPARATOR}{issue_id}{KEY_SEPARATOR}{}",
        variants.identity_fragment()
    )
}

/// Identity key of a buyback price: `device_storage_condition`
#[must_use]
pub fn buyback_key(device_id: &str, storage: &str, condition: ConditionTier) -> String {
    format!("{device_id}{KEY_SEPARATOR}{storage}{KEY_SEPARATOR}{condition}")
}

/// Key prefix shared by every record of one device
#[must_use]
pub fn device_key_prefix(device_id: &str) -> String {
    format!("{device_id}{KEY_SEPARATOR}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPriceRecord {
    pub device_id: String,
    pub issue_id: String,
    pub variants: Variants,
    pub price: u32,
    pub currency: String,
    pub part_cost: f64,
    pub labor_minutes: u32,
    pub active: bool,
    /// Set by an operator; excludes the record from default overwrites
    pub is_manual: bool,
    pub updated_at: DateTime<Utc>,
}

impl RepairPriceRecord {
    #[must_use]
    pub fn identity_key(&self) -> String {
        repair_key(&self.device_id, &self.issue_id, &self.variants)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuybackPriceRecord {
    pub device_id: String,
    pub storage: String,
    pub condition: ConditionTier,
    pub price: u32,
    pub market_value: Option<f64>,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl BuybackPriceRecord {
    #[must_use]
    pub fn identity_key(&self) -> String {
        buyback_key(&self.device_id, &self.storage, self.condition)
    }
}

/// Either kind of price record, as written to or read from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceDocument {
    Repair(RepairPriceRecord),
    Buyback(BuybackPriceRecord),
}

impl PriceDocument {
    #[must_use]
    pub fn device_id(&self) -> &str {
        match self {
            Self::Repair(r) => &r.device_id,
            Self::Buyback(b) => &b.device_id,
        }
    }

    /// Key recomputed from the record's own fields
    #[must_use]
    pub fn expected_key(&self) -> String {
        match self {
            Self::Repair(r) => r.identity_key(),
            Self::Buyback(b) => b.identity_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_key_uses_base_without_variants() {
        assert_eq!(
            repair_key("apple-iphone-15-pro", "battery", &Variants::none()),
            "apple-iphone-15-pro_battery_base"
        );
        assert_eq!(
            repair_key("apple-iphone-15-pro", "screen", &Variants::single("quality", "oled-soft")),
            "apple-iphone-15-pro_screen_oled-soft"
        );
    }

    #[test]
    fn buyback_key_includes_condition() {
        assert_eq!(
            buyback_key("google-pixel-8", "128GB", ConditionTier::LikeNew),
            "google-pixel-8_128GB_like-new"
        );
    }

    #[test]
    fn condition_tier_parses_its_own_labels() {
        for tier in ConditionTier::ALL {
            assert_eq!(tier.as_str().parse::<ConditionTier>().unwrap(), tier);
        }
        assert!("mint".parse::<ConditionTier>().is_err());
    }

    #[test]
    fn device_prefix_does_not_match_longer_device_ids() {
        let prefix = device_key_prefix("apple-iphone-15");
        assert!(!"apple-iphone-15-pro_screen_base".starts_with(&prefix));
        assert!("apple-iphone-15_screen_base".starts_with(&prefix));
    }
}
