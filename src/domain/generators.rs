//! Default price generators
//!
//! Turns a device id into its canonical blueprint set: one repair blueprint per
//! priced (issue, variant) combination and one buyback offer per valid storage
//! capacity, each expanded over the five condition tiers.
//!
//! Generation is pure. The same device id against the same catalog version
//! always yields the same blueprint set, which is what makes re-running a sync
//! safe.

pub mod apple;
pub mod generic;
pub mod google;
pub mod samsung;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::catalog::{Brand, CatalogProvider};
use crate::domain::descriptor::DeviceDescriptor;
use crate::domain::price_records::{
    BuybackPriceRecord, ConditionTier, RepairPriceRecord, buyback_key, repair_key,
};
use crate::domain::pricing::{
    BuybackDeduction, CONDITION_DEDUCTIONS, calculate_buyback_offer, calculate_repair_price,
    storage_multiplier,
};
use crate::domain::variants::Variants;

/// Storage tiers used when the catalog has no spec for a model
pub const DEFAULT_STORAGE: [&str; 2] = ["128GB", "256GB"];

/// Variant dimension carried by screen repairs
pub const QUALITY_DIMENSION: &str = "quality";

pub mod issues {
    pub const SCREEN: &str = "screen";
    pub const BATTERY: &str = "battery";
    pub const CHARGING_PORT: &str = "charging-port";
    pub const REAR_CAMERA: &str = "rear-camera";
    pub const BACK_GLASS: &str = "back-glass";
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationError {
    #[error("No storage spec matches '{device_id}', using default tiers")]
    NoStorageMatch { device_id: String },
}

/// Part cost per component before any market override
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentCosts {
    pub screen: f64,
    pub battery: f64,
    pub charging_port: f64,
    pub rear_camera: f64,
    pub back_glass: f64,
}

impl ComponentCosts {
    #[must_use]
    pub const fn new(screen: f64, battery: f64, charging_port: f64, rear_camera: f64, back_glass: f64) -> Self {
        Self {
            screen,
            battery,
            charging_port,
            rear_camera,
            back_glass,
        }
    }

    /// (issue id, cost, labor minutes) in emission order
    fn issues(&self) -> [(&'static str, f64, u32); 5] {
        [
            (issues::SCREEN, self.screen, 60),
            (issues::BATTERY, self.battery, 30),
            (issues::CHARGING_PORT, self.charging_port, 45),
            (issues::REAR_CAMERA, self.rear_camera, 40),
            (issues::BACK_GLASS, self.back_glass, 90),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenTech {
    Oled,
    Lcd,
}

impl ScreenTech {
    /// Screen qualities and their cost factor relative to the band cost
    #[must_use]
    pub const fn qualities(self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Oled => &[("original", 1.5), ("oled-soft", 1.0), ("incell", 0.6)],
            Self::Lcd => &[("original", 1.0), ("aftermarket-lcd", 0.6)],
        }
    }

    #[must_use]
    pub fn factor_for(self, quality: &str) -> Option<f64> {
        self.qualities()
            .iter()
            .find(|(name, _)| *name == quality)
            .map(|(_, factor)| *factor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairBlueprint {
    pub issue_id: String,
    pub variants: Variants,
    pub part_cost: f64,
    pub labor_minutes: u32,
    pub price: u32,
}

impl RepairBlueprint {
    fn new(issue_id: &str, variants: Variants, part_cost: f64, labor_minutes: u32) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            variants,
            part_cost,
            labor_minutes,
            price: calculate_repair_price(part_cost, labor_minutes),
        }
    }

    /// Replaces the part cost and recomputes the price.
    pub fn reprice(&mut self, part_cost: f64) {
        self.part_cost = part_cost;
        self.price = calculate_repair_price(part_cost, self.labor_minutes);
    }

    #[must_use]
    pub fn key(&self, device_id: &str) -> String {
        repair_key(device_id, &self.issue_id, &self.variants)
    }

    #[must_use]
    pub fn to_record(&self, device_id: &str, currency: &str, now: DateTime<Utc>) -> RepairPriceRecord {
        RepairPriceRecord {
            device_id: device_id.to_string(),
            issue_id: self.issue_id.clone(),
            variants: self.variants.clone(),
            price: self.price,
            currency: currency.to_string(),
            part_cost: self.part_cost,
            labor_minutes: self.labor_minutes,
            active: true,
            is_manual: false,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionOffer {
    pub condition: ConditionTier,
    pub deduction: f64,
    pub price: u32,
}

/// Base trade-in offer for one storage capacity, expanded over all tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuybackDefaultOffer {
    pub storage: String,
    pub resale_value: f64,
    pub base_offer: u32,
    pub market_value: Option<f64>,
    pub conditions: Vec<ConditionOffer>,
}

impl BuybackDefaultOffer {
    /// Offer priced from a resale value; deductions are taken off `deduction_basis`.
    #[must_use]
    pub fn price(storage: &str, resale_value: f64, deduction_basis: Option<f64>) -> Self {
        let base_offer = calculate_buyback_offer(resale_value, &[]);
        let basis = deduction_basis.unwrap_or_else(|| f64::from(base_offer));
        let conditions = CONDITION_DEDUCTIONS
            .iter()
            .map(|(condition, rate)| {
                let deduction = (basis * rate).round();
                ConditionOffer {
                    condition: *condition,
                    deduction,
                    price: calculate_buyback_offer(
                        resale_value,
                        &[BuybackDeduction::new(condition.as_str(), deduction)],
                    ),
                }
            })
            .collect();

        Self {
            storage: storage.to_string(),
            resale_value,
            base_offer,
            market_value: None,
            conditions,
        }
    }

    /// Default offer from the catalog base value and the storage multiplier.
    #[must_use]
    pub fn from_base_value(storage: &str, base_value: u32) -> Self {
        Self::price(storage, f64::from(base_value) * storage_multiplier(storage), None)
    }

    #[must_use]
    pub fn to_records(&self, device_id: &str, currency: &str, now: DateTime<Utc>) -> Vec<BuybackPriceRecord> {
        self.conditions
            .iter()
            .map(|offer| BuybackPriceRecord {
                device_id: device_id.to_string(),
                storage: self.storage.clone(),
                condition: offer.condition,
                price: offer.price,
                market_value: self.market_value,
                currency: currency.to_string(),
                updated_at: now,
            })
            .collect()
    }
}

/// Canonical generator output for one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceBlueprint {
    pub descriptor: DeviceDescriptor,
    pub screen_tech: ScreenTech,
    pub repairs: Vec<RepairBlueprint>,
    pub buyback_offers: Vec<BuybackDefaultOffer>,
    /// Set when storage fell back to [`DEFAULT_STORAGE`]
    pub storage_warning: Option<GenerationError>,
}

impl DeviceBlueprint {
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.descriptor.device_id
    }

    #[must_use]
    pub fn covers_issue(&self, issue_id: &str) -> bool {
        self.repairs.iter().any(|r| r.issue_id == issue_id)
    }

    /// True when (issue, variants) is a member of the blueprint set
    #[must_use]
    pub fn allows_variant(&self, issue_id: &str, variants: &Variants) -> bool {
        self.repairs
            .iter()
            .any(|r| r.issue_id == issue_id && &r.variants == variants)
    }

    #[must_use]
    pub fn storage_capacities(&self) -> Vec<&str> {
        self.buyback_offers.iter().map(|o| o.storage.as_str()).collect()
    }

    #[must_use]
    pub fn repair_keys(&self) -> Vec<String> {
        self.repairs.iter().map(|r| r.key(self.device_id())).collect()
    }

    #[must_use]
    pub fn buyback_keys(&self) -> Vec<String> {
        self.buyback_offers
            .iter()
            .flat_map(|offer| {
                offer
                    .conditions
                    .iter()
                    .map(|c| buyback_key(self.device_id(), &offer.storage, c.condition))
            })
            .collect()
    }
}

fn component_costs(descriptor: &DeviceDescriptor, base_value: Option<u32>) -> (ComponentCosts, ScreenTech) {
    match descriptor.brand {
        Some(Brand::Apple) => (apple::component_costs(descriptor), apple::screen_tech(descriptor)),
        Some(Brand::Samsung) => (samsung::component_costs(descriptor), ScreenTech::Oled),
        Some(Brand::Google) => (google::component_costs(descriptor), ScreenTech::Oled),
        Some(Brand::Xiaomi | Brand::OnePlus) | None => {
            (generic::component_costs(descriptor, base_value), ScreenTech::Oled)
        }
    }
}

fn repair_blueprints(costs: &ComponentCosts, screen_tech: ScreenTech) -> Vec<RepairBlueprint> {
    let mut repairs = Vec::new();
    for (issue_id, cost, labor_minutes) in costs.issues() {
        if cost <= 0.0 {
            continue;
        }
        if issue_id == issues::SCREEN {
            for (quality, factor) in screen_tech.qualities() {
                let part_cost = (cost * factor).round();
                if part_cost > 0.0 {
                    repairs.push(RepairBlueprint::new(
                        issue_id,
                        Variants::single(QUALITY_DIMENSION, quality),
                        part_cost,
                        labor_minutes,
                    ));
                }
            }
        } else {
            repairs.push(RepairBlueprint::new(issue_id, Variants::none(), cost, labor_minutes));
        }
    }
    repairs
}

/// Generates the default blueprint set for a device id.
#[must_use]
pub fn generate_defaults(device_id: &str, catalog: &dyn CatalogProvider) -> DeviceBlueprint {
    let descriptor = DeviceDescriptor::parse(device_id);
    let base_value = descriptor
        .brand
        .and_then(|brand| catalog.resolve_base_value(brand, &descriptor.device_id));

    let (costs, screen_tech) = component_costs(&descriptor, base_value);
    let repairs = repair_blueprints(&costs, screen_tech);

    let resolved = match descriptor.brand {
        Some(brand) => catalog.resolve_storage(brand, &descriptor.device_id),
        None => Err(GenerationError::NoStorageMatch {
            device_id: descriptor.device_id.clone(),
        }),
    };
    let (storage, storage_warning) = match resolved {
        Ok(capacities) => (capacities, None),
        Err(err) => (DEFAULT_STORAGE.iter().map(ToString::to_string).collect(), Some(err)),
    };

    let mut seen = BTreeSet::new();
    let buyback_offers = match base_value {
        Some(value) if value > 0 => storage
            .iter()
            .filter(|capacity| seen.insert(capacity.as_str()))
            .map(|capacity| BuybackDefaultOffer::from_base_value(capacity, value))
            .collect(),
        _ => Vec::new(),
    };

    DeviceBlueprint {
        descriptor,
        screen_tech,
        repairs,
        buyback_offers,
        storage_warning,
    }
}
