//! Samsung Galaxy cost bands (S, A and Z lines).

use crate::domain::descriptor::DeviceDescriptor;
use crate::domain::generators::ComponentCosts;

#[must_use]
pub fn component_costs(descriptor: &DeviceDescriptor) -> ComponentCosts {
    let series = descriptor.series.unwrap_or(0);
    let tiers = descriptor.tiers;

    if tiers.fold {
        let screen = if series >= 5 { 360.0 } else { 320.0 };
        return ComponentCosts::new(screen, 60.0, 55.0, 90.0, 70.0);
    }
    if tiers.flip {
        let screen = if series >= 5 { 250.0 } else { 230.0 };
        return ComponentCosts::new(screen, 55.0, 50.0, 70.0, 60.0);
    }

    match descriptor.line {
        Some('a' | 'm') => {
            // Plastic backs, no back glass repair
            if series >= 50 {
                ComponentCosts::new(75.0, 30.0, 30.0, 40.0, 0.0)
            } else {
                ComponentCosts::new(55.0, 25.0, 25.0, 30.0, 0.0)
            }
        }
        _ => {
            let mut costs = match series {
                s if s >= 23 => ComponentCosts::new(160.0, 45.0, 45.0, 80.0, 55.0),
                21..=22 => ComponentCosts::new(130.0, 40.0, 40.0, 70.0, 50.0),
                _ => ComponentCosts::new(100.0, 35.0, 35.0, 60.0, 45.0),
            };
            if tiers.ultra {
                costs.screen += 60.0;
                costs.rear_camera += 40.0;
            }
            if tiers.plus {
                costs.screen += 20.0;
                costs.battery += 5.0;
            }
            costs
        }
    }
}
