//! Apple (iPhone) cost bands.

use crate::domain::descriptor::DeviceDescriptor;
use crate::domain::generators::{ComponentCosts, ScreenTech};

/// Series assumed when the identifier carries none (SE and legacy models)
const FALLBACK_SERIES: u32 = 8;

#[must_use]
pub fn component_costs(descriptor: &DeviceDescriptor) -> ComponentCosts {
    let series = descriptor.series.unwrap_or(FALLBACK_SERIES);
    let tiers = descriptor.tiers;

    let mut costs = match series {
        s if s >= 15 => ComponentCosts::new(150.0, 45.0, 40.0, 70.0, 60.0),
        13..=14 => ComponentCosts::new(120.0, 40.0, 35.0, 60.0, 50.0),
        11..=12 => ComponentCosts::new(90.0, 35.0, 30.0, 50.0, 40.0),
        _ => ComponentCosts::new(60.0, 28.0, 25.0, 40.0, 30.0),
    };

    if tiers.is_pro_max() {
        costs.screen += 80.0;
        costs.battery += 10.0;
        costs.rear_camera += 40.0;
    } else if tiers.pro {
        costs.screen += 40.0;
        costs.battery += 5.0;
        costs.rear_camera += 30.0;
    } else if tiers.max {
        // XS Max
        costs.screen += 30.0;
    }
    if tiers.plus {
        costs.screen += 20.0;
        costs.battery += 5.0;
    }
    if tiers.mini {
        costs.screen -= 10.0;
    }
    // Aluminium backs before the iPhone 8
    if series < 8 && !tiers.lite {
        costs.back_glass = 0.0;
    }
    costs
}

#[must_use]
pub fn screen_tech(descriptor: &DeviceDescriptor) -> ScreenTech {
    let series = descriptor.series.unwrap_or(FALLBACK_SERIES);
    let lcd = descriptor.tiers.lite
        || descriptor.line == Some('r')
        || series <= 8
        || (series == 11 && !descriptor.tiers.pro);
    if lcd { ScreenTech::Lcd } else { ScreenTech::Oled }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn costs(id: &str) -> ComponentCosts {
        component_costs(&DeviceDescriptor::parse(id))
    }

    #[test]
    fn pro_max_screen_carries_the_largest_surcharge() {
        assert!((costs("apple-iphone-15").screen - 150.0).abs() < f64::EPSILON);
        assert!((costs("apple-iphone-15-pro").screen - 190.0).abs() < f64::EPSILON);
        assert!((costs("apple-iphone-15-pro-max").screen - 230.0).abs() < f64::EPSILON);
        assert!((costs("apple-iphone-15-plus").screen - 170.0).abs() < f64::EPSILON);
    }

    #[test]
    fn older_series_use_lower_bands() {
        assert!(costs("apple-iphone-12").screen < costs("apple-iphone-13").screen);
        assert!(costs("apple-iphone-7").back_glass <= 0.0);
        assert!(costs("apple-iphone-se-2022").back_glass > 0.0);
    }

    #[test]
    fn screen_technology_by_model() {
        let tech = |id: &str| screen_tech(&DeviceDescriptor::parse(id));
        assert_eq!(tech("apple-iphone-xr"), ScreenTech::Lcd);
        assert_eq!(tech("apple-iphone-xs"), ScreenTech::Oled);
        assert_eq!(tech("apple-iphone-11"), ScreenTech::Lcd);
        assert_eq!(tech("apple-iphone-11-pro"), ScreenTech::Oled);
        assert_eq!(tech("apple-iphone-se-2022"), ScreenTech::Lcd);
        assert_eq!(tech("apple-iphone-14"), ScreenTech::Oled);
    }
}
