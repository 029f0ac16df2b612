//! Pricing engine
//!
//! Pure price formulas shared by every generator and by the market override.
//! Nothing in here touches the store or the catalog.

use serde::{Deserialize, Serialize};

use crate::domain::price_records::ConditionTier;

/// Share of the resale value kept as margin on a buyback offer
pub const BUYBACK_MARGIN_RATE: f64 = 0.45;

/// Flat handling overhead subtracted from every buyback offer
pub const BUYBACK_OVERHEAD: f64 = 20.0;

/// Markup applied to the part cost of a repair
pub const PART_MARKUP_RATE: f64 = 1.10;

/// Hourly labor rate in currency units
pub const LABOR_RATE_PER_HOUR: u32 = 50;

/// Flat service fee added to every repair
pub const REPAIR_SERVICE_FEE: u32 = 30;

/// Fixed deduction percentage per condition tier, applied off a base offer.
pub const CONDITION_DEDUCTIONS: [(ConditionTier, f64); 5] = [
    (ConditionTier::New, 0.0),
    (ConditionTier::LikeNew, 0.10),
    (ConditionTier::Good, 0.20),
    (ConditionTier::Fair, 0.35),
    (ConditionTier::Damaged, 0.60),
];

/// A single deduction off a buyback offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuybackDeduction {
    pub label: String,
    pub amount: f64,
}

impl BuybackDeduction {
    pub fn new(label: impl Into<String>, amount: f64) -> Self {
        Self { label: label.into(), amount }
    }
}

/// Maximum trade-in offer for a device with the given resale value.
///
/// `margin = resale * 0.45`, `overhead = 20`, then every deduction is
/// subtracted. The result is clamped at zero and rounded to the nearest unit.
#[must_use]
pub fn calculate_buyback_offer(resale_value: f64, deductions: &[BuybackDeduction]) -> u32 {
    if resale_value <= 0.0 {
        return 0;
    }

    let margin = resale_value * BUYBACK_MARGIN_RATE;
    let max_offer = resale_value - BUYBACK_OVERHEAD - margin;
    let total_deductions: f64 = deductions.iter().map(|d| d.amount).sum();

    let offer = (max_offer - total_deductions).max(0.0);
    offer.round() as u32
}

/// Customer price for a repair.
///
/// `part_cost * 1.10 + labor_minutes / 60 * 50 + 30`, rounded up.
///
/// The sum is evaluated in 1/6000ths of a unit. Only the part term is
/// fractional there; it is rounded up unless float error is all that
/// separates it from a whole number, so exact totals (e.g. 165.0) stay put.
/// Negative part costs are treated as zero and totals past `u32::MAX`
/// saturate.
#[must_use]
pub fn calculate_repair_price(part_cost: f64, labor_minutes: u32) -> u32 {
    // total * 6000 = part_cost * 6600 + minutes * 5000 + fee * 6000
    let scaled = part_cost.max(0.0) * 6600.0;
    let nearest = scaled.round();
    let part_term = if (scaled - nearest).abs() <= nearest * 1e-12 {
        nearest
    } else {
        scaled.ceil()
    };

    let numerator = (part_term as u64)
        .checked_add(u64::from(labor_minutes) * u64::from(LABOR_RATE_PER_HOUR) * 100)
        .and_then(|n| n.checked_add(u64::from(REPAIR_SERVICE_FEE) * 6000));

    numerator.map_or(u32::MAX, |n| u32::try_from(n.div_ceil(6000)).unwrap_or(u32::MAX))
}

/// Capacity in gigabytes, used for ordering ("1TB" → 1024).
#[must_use]
pub fn storage_capacity_gb(storage: &str) -> Option<u32> {
    let normalized = storage.trim().to_ascii_uppercase();
    if let Some(tb) = normalized.strip_suffix("TB") {
        return tb.trim().parse::<u32>().ok().map(|v| v * 1024);
    }
    normalized
        .strip_suffix("GB")
        .and_then(|gb| gb.trim().parse::<u32>().ok())
}

/// Resale multiplier for a storage capacity, relative to 128GB.
#[must_use]
pub fn storage_multiplier(storage: &str) -> f64 {
    match storage_capacity_gb(storage) {
        Some(gb) if gb <= 32 => 0.85,
        Some(gb) if gb <= 64 => 0.90,
        Some(gb) if gb <= 128 => 1.00,
        Some(gb) if gb <= 256 => 1.15,
        Some(gb) if gb <= 512 => 1.30,
        Some(_) => 1.50,
        None => 1.00,
    }
}
