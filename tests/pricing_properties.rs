//! Property tests for pricing monotonicity and identity key uniqueness
use std::collections::HashSet;

use pricing_sync_lib::domain::catalog::CatalogProvider;
use pricing_sync_lib::domain::catalog_data::builtin_catalog;
use pricing_sync_lib::domain::generate_defaults;
use pricing_sync_lib::domain::generators::BuybackDefaultOffer;
use pricing_sync_lib::domain::pricing::{calculate_buyback_offer, calculate_repair_price};
use proptest::prelude::*;

proptest! {
    #[test]
    fn larger_storage_never_lowers_the_offer(base in 200u32..5_000) {
        let offers: Vec<u32> = ["64GB", "128GB", "256GB", "512GB", "1TB"]
            .iter()
            .map(|storage| BuybackDefaultOffer::from_base_value(storage, base).base_offer)
            .collect();
        for pair in offers.windows(2) {
            prop_assert!(pair[0] <= pair[1], "{:?}", offers);
        }
    }

    #[test]
    fn condition_tiers_never_raise_the_price(base in 200u32..5_000, storage in prop::sample::select(vec!["64GB", "128GB", "256GB"])) {
        let offer = BuybackDefaultOffer::from_base_value(storage, base);
        for pair in offer.conditions.windows(2) {
            prop_assert!(pair[0].price >= pair[1].price);
        }
    }

    #[test]
    fn buyback_offer_is_monotonic_in_resale(resale in 0.0f64..10_000.0, bump in 0.0f64..1_000.0) {
        prop_assert!(calculate_buyback_offer(resale, &[]) <= calculate_buyback_offer(resale + bump, &[]));
    }

    #[test]
    fn repair_price_covers_parts_and_fee(part_cost in 1u32..1_000, minutes in 0u32..240) {
        let part_cost = f64::from(part_cost);
        let price = f64::from(calculate_repair_price(part_cost, minutes));
        prop_assert!(price + 1e-9 >= part_cost * 1.10 + 30.0);
    }

    #[test]
    fn generated_keys_are_unique(
        brand in prop::sample::select(vec!["apple-iphone", "samsung-galaxy-s", "google-pixel", "xiaomi", "oneplus"]),
        series in 5u32..30,
        tier in prop::sample::select(vec!["", "-pro", "-pro-max", "-plus", "-ultra", "-mini", "a", "-lite"]),
    ) {
        let catalog = builtin_catalog();
        let device_id = if brand == "samsung-galaxy-s" {
            format!("{brand}{series}{tier}")
        } else {
            format!("{brand}-{series}{tier}")
        };
        let blueprint = generate_defaults(&device_id, &catalog);

        let repair_keys = blueprint.repair_keys();
        let unique: HashSet<_> = repair_keys.iter().collect();
        prop_assert_eq!(unique.len(), repair_keys.len());

        let buyback_keys = blueprint.buyback_keys();
        let unique: HashSet<_> = buyback_keys.iter().collect();
        prop_assert_eq!(unique.len(), buyback_keys.len());
    }
}

#[test]
fn keys_are_unique_across_the_builtin_catalog() {
    let catalog = builtin_catalog();
    let mut seen = HashSet::new();
    for brand in catalog.brands() {
        for entry in catalog.entries(brand) {
            let blueprint = generate_defaults(&entry.device_id(), &catalog);
            for key in blueprint.repair_keys().into_iter().chain(blueprint.buyback_keys()) {
                assert!(seen.insert(key.clone()), "duplicate key {key}");
            }
        }
    }
}
