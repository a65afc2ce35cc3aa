//! Deterministic financial arithmetic for upgrade recommendations
//!
//! Pure functions, no external calls. These values are the only numeric
//! fields guaranteed to be exact rather than model-estimated.

use serde::{Deserialize, Serialize};

/// Sentinel ROI for upgrades with no positive annual savings.
pub const NO_PAYBACK_YEARS: f64 = 999.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiMetrics {
    pub net_cost: f64,
    pub annual_savings: f64,
    pub roi_years: f64,
    pub ten_year_savings: f64,
    pub initial_cost: f64,
    pub total_incentives: f64,
}

/// Calculate ROI metrics for an energy upgrade.
///
/// Net cost is clamped at zero when incentives exceed cost, so ROI can
/// never go negative. Given the same four inputs the same four derived
/// values always come back.
pub fn calculate_roi(
    upfront_cost: f64,
    rebate_amount: f64,
    federal_credit: f64,
    monthly_savings: f64,
) -> RoiMetrics {
    let net_cost = (upfront_cost - rebate_amount - federal_credit).max(0.0);
    let annual_savings = monthly_savings * 12.0;

    let roi_years = if annual_savings > 0.0 {
        round_tenth(net_cost / annual_savings)
    } else {
        NO_PAYBACK_YEARS
    };

    let ten_year_savings = annual_savings * 10.0 - net_cost;

    RoiMetrics {
        net_cost,
        annual_savings,
        roi_years,
        ten_year_savings,
        initial_cost: upfront_cost,
        total_incentives: rebate_amount + federal_credit,
    }
}

/// Approximate annual CO2 offset in tons from a monthly dollar saving,
/// keyed by the energy source the upgrade likely displaces.
pub fn estimate_co2_offset_tons(item_name: &str, monthly_savings: f64) -> f64 {
    const LBS_PER_TON: f64 = 2000.0;

    let lowered = item_name.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    let co2_per_dollar = if has_any(&["insulation", "window", "door", "weatherization"]) {
        12.0
    } else if has_any(&["heat pump", "water heater", "hvac"]) {
        8.0
    } else if lowered.contains("solar") {
        10.0
    } else if has_any(&["vehicle", "ev", "charger"]) {
        6.0
    } else {
        10.0
    };

    let annual_savings = monthly_savings * 12.0;
    let annual_co2_tons = annual_savings * co2_per_dollar / LBS_PER_TON;

    round_hundredth(annual_co2_tons)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_hundredth(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
