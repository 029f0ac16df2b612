//! Google Pixel cost bands.

use crate::domain::descriptor::DeviceDescriptor;
use crate::domain::generators::ComponentCosts;

#[must_use]
pub fn component_costs(descriptor: &DeviceDescriptor) -> ComponentCosts {
    let series = descriptor.series.unwrap_or(0);
    let tiers = descriptor.tiers;

    if tiers.fold {
        return ComponentCosts::new(300.0, 55.0, 50.0, 80.0, 60.0);
    }

    let mut costs = match series {
        s if s >= 8 => ComponentCosts::new(130.0, 45.0, 40.0, 70.0, 50.0),
        6..=7 => ComponentCosts::new(105.0, 40.0, 35.0, 60.0, 45.0),
        _ => ComponentCosts::new(85.0, 35.0, 30.0, 50.0, 40.0),
    };
    if tiers.pro {
        costs.screen += 40.0;
        costs.rear_camera += 25.0;
    }
    if tiers.max {
        costs.screen += 20.0;
    }
    if tiers.lite {
        // "a" models: cheaper panel, plastic back
        costs.screen -= 30.0;
        costs.rear_camera -= 10.0;
        costs.back_glass = 0.0;
    }
    costs
}
