//! Cost bands for brands without a dedicated table (Xiaomi, OnePlus, unknown).
//!
//! Part costs scale with the catalog base value, which already reflects the
//! model tier.

use crate::domain::descriptor::DeviceDescriptor;
use crate::domain::generators::ComponentCosts;

const FALLBACK: ComponentCosts = ComponentCosts::new(80.0, 30.0, 30.0, 45.0, 30.0);

fn share(base_value: u32, rate: f64, floor: f64) -> f64 {
    (f64::from(base_value) * rate).round().max(floor)
}

#[must_use]
pub fn component_costs(descriptor: &DeviceDescriptor, base_value: Option<u32>) -> ComponentCosts {
    let mut costs = match base_value {
        Some(value) if value > 0 => ComponentCosts::new(
            share(value, 0.22, 40.0),
            share(value, 0.06, 20.0),
            share(value, 0.05, 20.0),
            share(value, 0.09, 25.0),
            share(value, 0.06, 20.0),
        ),
        _ => FALLBACK,
    };
    if descriptor.tiers.lite {
        costs.back_glass = 0.0;
    }
    costs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs_scale_with_base_value() {
        let d = DeviceDescriptor::parse("xiaomi-14");
        let cheap = component_costs(&d, Some(300));
        let pricey = component_costs(&d, Some(900));
        assert!(cheap.screen < pricey.screen);
        assert!((pricey.screen - 198.0).abs() < f64::EPSILON);
    }

    #[test]
    fn floors_apply_to_cheap_devices() {
        let costs = component_costs(&DeviceDescriptor::parse("oneplus-nord-ce"), Some(100));
        assert!((costs.screen - 40.0).abs() < f64::EPSILON);
        assert!((costs.battery - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_base_value_uses_fallback_band() {
        assert_eq!(component_costs(&DeviceDescriptor::parse("nokia-3310"), None), FALLBACK);
    }
}
