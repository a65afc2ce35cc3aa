//! Core data models for the energy roadmap agent

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Profile =================
//

/// Household survey profile. Immutable input for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub zip_code: String,
    pub ownership_status: String,
    pub home_type: String,
    pub income_range: String,
    pub heating_system: String,
    pub home_age_year: Option<i32>,
    #[serde(default)]
    pub monthly_electric_bill: Option<f64>,
    #[serde(default)]
    pub monthly_gas_bill: Option<f64>,
}

impl Profile {
    /// Best-effort dollar figure for the household income range.
    ///
    /// Survey values arrive as free text ("under_50k", "$80,000 - $120,000").
    /// Returns the midpoint when the range has two bounds, the single bound
    /// otherwise, `None` when nothing numeric can be read.
    pub fn representative_income(&self) -> Option<f64> {
        let figures = parse_income_figures(&self.income_range);
        match figures.len() {
            0 => None,
            1 => Some(figures[0]),
            _ => Some((figures[0] + figures[1]) / 2.0),
        }
    }

    pub fn income_tier(&self) -> IncomeTier {
        IncomeTier::resolve(self.representative_income())
    }
}

fn parse_income_figures(raw: &str) -> Vec<f64> {
    let mut figures = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            continue;
        }
        let mut token = String::new();
        token.push(c);
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || next == ',' || next == '.' {
                token.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let multiplier = match chars.peek() {
            Some('k') | Some('K') => {
                chars.next();
                1_000.0
            }
            _ => 1.0,
        };
        let cleaned: String = token.chars().filter(|c| *c != ',').collect();
        if let Ok(value) = cleaned.parse::<f64>() {
            figures.push(value * multiplier);
        }
    }

    figures
}

/// Income tier for rebate-program coverage.
///
/// Unresolvable income always maps to `Moderate` — full grant coverage is
/// never assumed without certainty of low-income status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IncomeTier {
    Low,
    Moderate,
    High,
}

impl IncomeTier {
    pub fn resolve(income: Option<f64>) -> Self {
        match income {
            None => IncomeTier::Moderate,
            Some(i) if i < 50_000.0 => IncomeTier::Low,
            Some(i) if i <= 150_000.0 => IncomeTier::Moderate,
            Some(_) => IncomeTier::High,
        }
    }

    /// Fraction of project cost the grant program covers for this tier.
    pub fn grant_coverage_rate(&self) -> f64 {
        match self {
            IncomeTier::Low => 1.0,
            IncomeTier::Moderate => 0.5,
            IncomeTier::High => 0.0,
        }
    }
}

//
// ================= Retrieval Context =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    UtilityRebate,
    Federal,
    Web,
    Unknown,
}

/// One retrieved text blob plus provenance. Context items accumulate
/// append-only across retrieval calls within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub text: String,
    pub source: String,
    pub kind: ContextKind,
    pub url: Option<String>,
}

impl ContextItem {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            source: String::new(),
            kind: ContextKind::Unknown,
            url: None,
        }
    }
}

impl fmt::Display for ContextItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Type: {:?}", self.kind)?;
        writeln!(f, "URL: {}", self.url.as_deref().unwrap_or("N/A"))?;
        write!(f, "Content: {}", self.text)
    }
}

/// One live web search result, reduced to URL + excerpt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub excerpt: String,
}

//
// ================= Query Planning =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    Model,
    Fallback,
}

/// Ordered search queries plus how they were produced, so callers can
/// distinguish "model answered" from "deterministic fallback used".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub queries: Vec<String>,
    pub source: QuerySource,
}

//
// ================= Routing =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Local,
    Hybrid,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Local => write!(f, "local"),
            Route::Hybrid => write!(f, "hybrid"),
        }
    }
}

//
// ================= Grading =================
//

/// Structured response from the grading model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeResult {
    pub binary_score: String,
    pub explanation: String,
}

impl GradeResult {
    pub fn is_pass(&self) -> bool {
        self.binary_score.eq_ignore_ascii_case("yes")
    }
}

/// Transient grading verdict. `HeuristicPass` marks the currency-symbol
/// fallback taken when the grading call itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeOutcome {
    Pass,
    HeuristicPass,
    Fail,
}

//
// ================= Roadmap =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FundingSourceType {
    InstantRebate,
    TaxCredit,
    FutureGrant,
}

/// One incentive source attached to a single recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingItem {
    pub source_type: FundingSourceType,
    pub provider: String,
    pub amount: f64,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    QuickWin,
    BigBet,
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationKind::QuickWin => write!(f, "quick_win"),
            RecommendationKind::BigBet => write!(f, "big_bet"),
        }
    }
}

/// Upgrade category, derived from the recommendation name. Drives the
/// federal credit caps and learn-more URL integrity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeCategory {
    HeatPump,
    Biomass,
    Boiler,
    Windows,
    Doors,
    Insulation,
    Electrical,
    Solar,
    WaterHeater,
    Weatherization,
    Other,
}

impl UpgradeCategory {
    pub fn from_name(name: &str) -> Self {
        let lowered = name.to_lowercase();
        let has_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

        // "heat pump water heater" is a water heater, so check that first.
        if has_any(&["water heater"]) {
            UpgradeCategory::WaterHeater
        } else if has_any(&["heat pump", "mini-split", "mini split", "hvac"]) {
            UpgradeCategory::HeatPump
        } else if has_any(&["biomass", "wood stove", "pellet"]) {
            UpgradeCategory::Biomass
        } else if has_any(&["boiler", "furnace"]) {
            UpgradeCategory::Boiler
        } else if has_any(&["window"]) {
            UpgradeCategory::Windows
        } else if has_any(&["door"]) {
            UpgradeCategory::Doors
        } else if has_any(&["insulation", "air seal", "air-seal"]) {
            UpgradeCategory::Insulation
        } else if has_any(&["panel upgrade", "electrical", "wiring", "breaker"]) {
            UpgradeCategory::Electrical
        } else if has_any(&["solar"]) {
            UpgradeCategory::Solar
        } else if has_any(&["weatherization", "weatherstrip", "thermostat"]) {
            UpgradeCategory::Weatherization
        } else {
            UpgradeCategory::Other
        }
    }

    /// Keywords that must appear in a learn-more URL for it to plausibly
    /// belong to this category.
    pub fn url_keywords(&self) -> &'static [&'static str] {
        match self {
            UpgradeCategory::HeatPump => &["heat-pump", "heatpump", "hvac"],
            UpgradeCategory::Biomass => &["biomass", "wood", "pellet"],
            UpgradeCategory::Boiler => &["boiler", "furnace"],
            UpgradeCategory::Windows => &["window"],
            UpgradeCategory::Doors => &["door"],
            UpgradeCategory::Insulation => &["insulation", "seal"],
            UpgradeCategory::Electrical => &["electrical", "panel", "wiring"],
            UpgradeCategory::Solar => &["solar"],
            UpgradeCategory::WaterHeater => &["water-heater", "waterheater", "water_heater"],
            UpgradeCategory::Weatherization => &["weatherization", "thermostat", "weather"],
            UpgradeCategory::Other => &[],
        }
    }
}

/// A single recommended upgrade.
///
/// The scalar `rebate_amount`/`federal_credit` fields are the primary
/// schema; `funding_breakdown` carries the per-source detail when the
/// generator provides it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub description: String,
    pub estimated_cost: f64,
    pub rebate_amount: f64,
    pub federal_credit: f64,
    pub estimated_monthly_savings: f64,
    #[serde(default)]
    pub roi_years: Option<f64>,
    #[serde(default)]
    pub source_citation: String,
    #[serde(default)]
    pub learn_more_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funding_breakdown: Vec<FundingItem>,
}

impl Recommendation {
    pub fn category(&self) -> UpgradeCategory {
        UpgradeCategory::from_name(&self.name)
    }
}

/// Final roadmap. Produced at most once per run; absence is an explicit
/// `None` at the pipeline boundary, never a partially filled object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roadmap {
    pub total_projected_savings_yearly: f64,
    pub recommendations: Vec<Recommendation>,
    pub summary_text: String,
    #[serde(default)]
    pub disclosure: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with_income(income_range: &str) -> Profile {
        Profile {
            zip_code: "78704".to_string(),
            ownership_status: "own".to_string(),
            home_type: "single_family".to_string(),
            income_range: income_range.to_string(),
            heating_system: "gas furnace".to_string(),
            home_age_year: Some(1985),
            monthly_electric_bill: None,
            monthly_gas_bill: None,
        }
    }

    #[test]
    fn test_income_parsing_variants() {
        assert_eq!(
            profile_with_income("under_50k").representative_income(),
            Some(50_000.0)
        );
        assert_eq!(
            profile_with_income("$80,000 - $120,000").representative_income(),
            Some(100_000.0)
        );
        assert_eq!(
            profile_with_income("prefer not to say").representative_income(),
            None
        );
    }

    #[test]
    fn test_income_tier_defaults_to_moderate() {
        assert_eq!(IncomeTier::resolve(None), IncomeTier::Moderate);
        assert_eq!(IncomeTier::resolve(Some(40_000.0)), IncomeTier::Low);
        assert_eq!(IncomeTier::resolve(Some(100_000.0)), IncomeTier::Moderate);
        assert_eq!(IncomeTier::resolve(Some(200_000.0)), IncomeTier::High);
    }

    #[test]
    fn test_upgrade_category_from_name() {
        assert_eq!(
            UpgradeCategory::from_name("Ducted Heat Pump"),
            UpgradeCategory::HeatPump
        );
        assert_eq!(
            UpgradeCategory::from_name("Attic Insulation & Air Sealing"),
            UpgradeCategory::Insulation
        );
        assert_eq!(
            UpgradeCategory::from_name("Smart Thermostat"),
            UpgradeCategory::Weatherization
        );
        assert_eq!(
            UpgradeCategory::from_name("Mystery Gadget"),
            UpgradeCategory::Other
        );
    }

    #[test]
    fn test_recommendation_type_field_round_trip() {
        let json = serde_json::json!({
            "name": "Heat Pump Water Heater",
            "type": "big_bet",
            "description": "Replace the gas water heater",
            "estimated_cost": 3200.0,
            "rebate_amount": 800.0,
            "federal_credit": 600.0,
            "estimated_monthly_savings": 30.0
        });

        let rec: Recommendation = serde_json::from_value(json).unwrap();
        assert_eq!(rec.kind, RecommendationKind::BigBet);
        assert!(rec.funding_breakdown.is_empty());
        assert_eq!(rec.category(), UpgradeCategory::WaterHeater);
    }
}
