//! Market data override
//!
//! When a market value record exists for a device, observed prices replace
//! the generator's estimates: part costs for the screen and battery repairs,
//! and the resale value used for buyback offers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::generators::{BuybackDefaultOffer, DeviceBlueprint, QUALITY_DIMENSION, issues};
use crate::domain::pricing::storage_multiplier;

/// Observed part costs. Absent or non-positive values keep the estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartCosts {
    pub screen: Option<f64>,
    pub battery: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketValueRecord {
    pub device_id: String,
    /// Average resale price at the 128GB tier
    pub avg_price: Option<f64>,
    pub part_costs: PartCosts,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn market_value(&self, device_id: &str) -> anyhow::Result<Option<MarketValueRecord>>;
}

/// Provider that never has data
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarketData;

#[async_trait]
impl MarketDataProvider for NoMarketData {
    async fn market_value(&self, _device_id: &str) -> anyhow::Result<Option<MarketValueRecord>> {
        Ok(None)
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Applies a market record to a generated blueprint. Returns true when
/// anything was overridden.
pub fn apply_market_override(blueprint: &mut DeviceBlueprint, market: Option<&MarketValueRecord>) -> bool {
    let Some(market) = market else {
        return false;
    };
    let mut applied = false;

    if let Some(screen) = positive(market.part_costs.screen) {
        let tech = blueprint.screen_tech;
        for repair in blueprint.repairs.iter_mut().filter(|r| r.issue_id == issues::SCREEN) {
            let factor = repair
                .variants
                .get(QUALITY_DIMENSION)
                .and_then(|quality| tech.factor_for(quality))
                .unwrap_or(1.0);
            repair.reprice((screen * factor).round());
            applied = true;
        }
    }

    if let Some(battery) = positive(market.part_costs.battery) {
        for repair in blueprint.repairs.iter_mut().filter(|r| r.issue_id == issues::BATTERY) {
            repair.reprice(battery);
            applied = true;
        }
    }

    if let Some(avg) = positive(market.avg_price) {
        for offer in &mut blueprint.buyback_offers {
            let resale = avg * storage_multiplier(&offer.storage);
            let mut priced = BuybackDefaultOffer::price(&offer.storage, resale, Some(avg));
            priced.market_value = Some(avg);
            *offer = priced;
            applied = true;
        }
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog_data::builtin_catalog;
    use crate::domain::generators::generate_defaults;
    use crate::domain::price_records::ConditionTier;
    use crate::domain::pricing::calculate_repair_price;

    fn record(screen: Option<f64>, battery: Option<f64>, avg: Option<f64>) -> MarketValueRecord {
        MarketValueRecord {
            device_id: "apple-iphone-15-pro".to_string(),
            avg_price: avg,
            part_costs: PartCosts { screen, battery },
        }
    }

    #[test]
    fn screen_cost_is_scaled_per_quality() {
        let catalog = builtin_catalog();
        let mut blueprint = generate_defaults("apple-iphone-15-pro", &catalog);
        assert!(apply_market_override(&mut blueprint, Some(&record(Some(200.0), None, None))));

        let cost_of = |quality: &str| {
            blueprint
                .repairs
                .iter()
                .find(|r| r.variants.get(QUALITY_DIMENSION) == Some(quality))
                .map(|r| (r.part_cost, r.price))
                .unwrap()
        };
        assert_eq!(cost_of("original"), (300.0, calculate_repair_price(300.0, 60)));
        assert_eq!(cost_of("oled-soft"), (200.0, calculate_repair_price(200.0, 60)));
        assert_eq!(cost_of("incell"), (120.0, calculate_repair_price(120.0, 60)));
    }

    #[test]
    fn average_price_drives_buyback_deductions() {
        let catalog = builtin_catalog();
        let mut blueprint = generate_defaults("apple-iphone-15-pro", &catalog);
        apply_market_override(&mut blueprint, Some(&record(None, None, Some(1000.0))));

        let offer = blueprint.buyback_offers.iter().find(|o| o.storage == "128GB").unwrap();
        assert_eq!(offer.market_value, Some(1000.0));
        assert_eq!(offer.base_offer, 530);
        let good = offer.conditions.iter().find(|c| c.condition == ConditionTier::Good).unwrap();
        assert!((good.deduction - 200.0).abs() < f64::EPSILON);
        assert_eq!(good.price, 330);
    }

    #[test]
    fn extreme_market_costs_saturate_prices() {
        let catalog = builtin_catalog();
        let mut blueprint = generate_defaults("apple-iphone-15-pro", &catalog);
        assert!(apply_market_override(
            &mut blueprint,
            Some(&record(Some(1e18), Some(1e18), Some(1e18)))
        ));

        let battery = blueprint.repairs.iter().find(|r| r.issue_id == issues::BATTERY).unwrap();
        assert_eq!(battery.price, u32::MAX);
        for screen in blueprint.repairs.iter().filter(|r| r.issue_id == issues::SCREEN) {
            assert_eq!(screen.price, u32::MAX);
        }
        assert!(blueprint.buyback_offers.iter().all(|o| o.base_offer == u32::MAX));
    }

    #[test]
    fn non_positive_values_are_ignored() {
        let catalog = builtin_catalog();
        let original = generate_defaults("apple-iphone-15-pro", &catalog);
        let mut blueprint = original.clone();
        assert!(!apply_market_override(&mut blueprint, Some(&record(Some(0.0), Some(-5.0), None))));
        assert!(!apply_market_override(&mut blueprint, None));
        assert_eq!(blueprint, original);
    }
}
