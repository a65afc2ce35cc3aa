//! Financial policy engine for generated roadmaps
//!
//! The roadmap synthesis prompt encodes the incentive-stacking rules, but
//! model compliance is not trusted: every generated roadmap passes through
//! this engine, which validates the numbers against the rules and repairs
//! violations in place. Each repair is recorded so callers can see exactly
//! what was corrected.

use crate::models::{FundingSourceType, Profile, Recommendation, Roadmap, UpgradeCategory};
use tracing::{info, warn};

/// Fixed learn-more URL used when no upgrade-specific URL is available.
pub const FALLBACK_LEARN_MORE_URL: &str =
    "https://savings.austinenergy.com/rebates/residential-rebates";

/// Federal credit percentage applied to the rebate-reduced basis.
pub const FEDERAL_CREDIT_RATE: f64 = 0.30;

/// Annual federal credit cap for heat-pump / biomass / boiler upgrades.
pub const HEAT_EQUIPMENT_CREDIT_CAP: f64 = 2_000.0;

/// Combined annual federal credit cap shared by all other eligible
/// categories (windows, doors, insulation, electrical, ...).
pub const ENVELOPE_CREDIT_CAP: f64 = 1_200.0;

/// Per-project ceiling of the income-qualified grant program.
pub const GRANT_PROGRAM_CAP: f64 = 14_000.0;

/// Households above this income never receive free-weatherization
/// full-coverage recommendations.
pub const FREE_WEATHERIZATION_INCOME_CEILING: f64 = 60_000.0;

/// Mandatory statement carried by every roadmap.
pub const CREDIT_DISCLOSURE: &str = "Federal tax credits are non-refundable: they \
require sufficient tax liability in the year the upgrade is placed in service \
and do not carry over to future years.";

const EPSILON: f64 = 0.01;

/// One correction applied to a generated roadmap.
#[derive(Debug, Clone)]
pub struct PolicyRepair {
    pub rule_name: &'static str,
    pub item: String,
    pub details: String,
}

#[derive(Debug, Clone)]
pub struct PolicyReport {
    pub repairs: Vec<PolicyRepair>,
}

impl PolicyReport {
    pub fn compliant(&self) -> bool {
        self.repairs.is_empty()
    }
}

/// Trait for one policy rule. Rules may mutate the roadmap to bring it
/// back into compliance and report what they changed.
pub trait PolicyRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, profile: &Profile, roadmap: &mut Roadmap) -> Vec<PolicyRepair>;
}

/// Policy engine that enforces rules in registration order.
pub struct PolicyEngine {
    rules: Vec<Box<dyn PolicyRule>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn PolicyRule>) {
        self.rules.push(rule);
    }

    /// Validate and repair a roadmap. Never rejects; structural emptiness
    /// is the caller's call.
    pub fn enforce(&self, profile: &Profile, roadmap: &mut Roadmap) -> PolicyReport {
        let mut repairs = Vec::new();

        for rule in &self.rules {
            let rule_repairs = rule.apply(profile, roadmap);
            for repair in &rule_repairs {
                warn!(
                    rule = repair.rule_name,
                    item = %repair.item,
                    details = %repair.details,
                    "Policy repair applied"
                );
            }
            repairs.extend(rule_repairs);
        }

        info!(
            rule_count = self.rules.len(),
            repair_count = repairs.len(),
            "Policy enforcement completed"
        );

        PolicyReport { repairs }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn credit_cap(category: UpgradeCategory) -> Option<f64> {
    match category {
        UpgradeCategory::HeatPump | UpgradeCategory::Biomass | UpgradeCategory::Boiler => {
            Some(HEAT_EQUIPMENT_CREDIT_CAP)
        }
        // Residential clean energy credit: 30% of basis, no annual cap.
        UpgradeCategory::Solar => None,
        _ => Some(ENVELOPE_CREDIT_CAP),
    }
}

fn uses_shared_envelope_cap(category: UpgradeCategory) -> bool {
    !matches!(
        category,
        UpgradeCategory::HeatPump
            | UpgradeCategory::Biomass
            | UpgradeCategory::Boiler
            | UpgradeCategory::Solar
    )
}

//
// ========== Rules ==========
//

/// Grant amounts must respect the household's income tier: low income up
/// to 100% of cost, moderate 50%, high nothing, all capped per project.
/// When a funding breakdown is present the scalar fields are resynced from
/// it afterwards so the two schemas cannot drift apart.
pub struct GrantCoverageRule;

impl PolicyRule for GrantCoverageRule {
    fn name(&self) -> &'static str {
        "grant_coverage_by_income_tier"
    }

    fn apply(&self, profile: &Profile, roadmap: &mut Roadmap) -> Vec<PolicyRepair> {
        let tier = profile.income_tier();
        let rate = tier.grant_coverage_rate();
        let mut repairs = Vec::new();

        for rec in &mut roadmap.recommendations {
            if rec.funding_breakdown.is_empty() {
                continue;
            }

            let allowed = (rec.estimated_cost * rate).min(GRANT_PROGRAM_CAP);
            let mut changed = false;

            for item in &mut rec.funding_breakdown {
                if item.source_type == FundingSourceType::FutureGrant
                    && item.amount > allowed + EPSILON
                {
                    repairs.push(PolicyRepair {
                        rule_name: self.name(),
                        item: rec.name.clone(),
                        details: format!(
                            "grant {} clamped from ${:.0} to ${:.0} ({:?} tier)",
                            item.provider, item.amount, allowed, tier
                        ),
                    });
                    item.amount = allowed;
                    changed = true;
                }
            }

            if changed {
                rec.rebate_amount = rec
                    .funding_breakdown
                    .iter()
                    .filter(|i| i.source_type != FundingSourceType::TaxCredit)
                    .map(|i| i.amount)
                    .sum();
            }
        }

        repairs
    }
}

/// Households above the income ceiling must not receive a fully covered
/// ("free") weatherization recommendation; coverage drops to the moderate
/// 50% rate instead.
pub struct WeatherizationEligibilityRule;

impl PolicyRule for WeatherizationEligibilityRule {
    fn name(&self) -> &'static str {
        "weatherization_income_eligibility"
    }

    fn apply(&self, profile: &Profile, roadmap: &mut Roadmap) -> Vec<PolicyRepair> {
        let eligible = matches!(
            profile.representative_income(),
            Some(income) if income <= FREE_WEATHERIZATION_INCOME_CEILING
        );
        if eligible {
            return Vec::new();
        }

        let mut repairs = Vec::new();

        for rec in &mut roadmap.recommendations {
            let full_coverage = rec.estimated_cost > 0.0
                && rec.rebate_amount + EPSILON >= rec.estimated_cost;

            if rec.category() == UpgradeCategory::Weatherization && full_coverage {
                let clamped = rec.estimated_cost * 0.5;
                repairs.push(PolicyRepair {
                    rule_name: self.name(),
                    item: rec.name.clone(),
                    details: format!(
                        "full coverage removed for income above ${:.0}; rebate clamped to ${:.0}",
                        FREE_WEATHERIZATION_INCOME_CEILING, clamped
                    ),
                });
                rec.rebate_amount = clamped;
            }
        }

        repairs
    }
}

/// Federal credit must be 30% of the rebate-reduced basis, capped per
/// category, with the non-heat categories sharing one $1,200 annual
/// bucket across the whole roadmap.
pub struct FederalCreditRule;

impl FederalCreditRule {
    fn allowed_credit(rec: &Recommendation, envelope_remaining: f64) -> f64 {
        let basis = (rec.estimated_cost - rec.rebate_amount).max(0.0);
        let by_basis = FEDERAL_CREDIT_RATE * basis;

        let category = rec.category();
        match credit_cap(category) {
            None => by_basis,
            Some(cap) if uses_shared_envelope_cap(category) => {
                by_basis.min(cap).min(envelope_remaining)
            }
            Some(cap) => by_basis.min(cap),
        }
    }
}

impl PolicyRule for FederalCreditRule {
    fn name(&self) -> &'static str {
        "federal_credit_basis_and_caps"
    }

    fn apply(&self, _profile: &Profile, roadmap: &mut Roadmap) -> Vec<PolicyRepair> {
        let mut repairs = Vec::new();
        let mut envelope_remaining = ENVELOPE_CREDIT_CAP;

        for rec in &mut roadmap.recommendations {
            let allowed = Self::allowed_credit(rec, envelope_remaining);

            if rec.federal_credit > allowed + EPSILON {
                repairs.push(PolicyRepair {
                    rule_name: self.name(),
                    item: rec.name.clone(),
                    details: format!(
                        "federal credit ${:.0} exceeds allowed ${:.0} (30% of reduced basis, capped)",
                        rec.federal_credit, allowed
                    ),
                });
                rec.federal_credit = allowed;
            }

            if uses_shared_envelope_cap(rec.category()) {
                envelope_remaining = (envelope_remaining - rec.federal_credit).max(0.0);
            }
        }

        repairs
    }
}

/// A learn-more URL must belong to the recommendation's own upgrade
/// category. A URL that plainly points at a different category is
/// replaced with the fixed fallback; a missing URL gets the fallback too.
pub struct UrlIntegrityRule;

impl UrlIntegrityRule {
    fn url_belongs_elsewhere(url: &str, own: UpgradeCategory) -> bool {
        let lowered = url.to_lowercase();

        if own.url_keywords().iter().any(|k| lowered.contains(k)) {
            return false;
        }

        const ALL: &[UpgradeCategory] = &[
            UpgradeCategory::HeatPump,
            UpgradeCategory::Biomass,
            UpgradeCategory::Boiler,
            UpgradeCategory::Windows,
            UpgradeCategory::Doors,
            UpgradeCategory::Insulation,
            UpgradeCategory::Electrical,
            UpgradeCategory::Solar,
            UpgradeCategory::WaterHeater,
            UpgradeCategory::Weatherization,
        ];

        ALL.iter()
            .filter(|c| **c != own)
            .any(|c| c.url_keywords().iter().any(|k| lowered.contains(k)))
    }
}

impl PolicyRule for UrlIntegrityRule {
    fn name(&self) -> &'static str {
        "learn_more_url_integrity"
    }

    fn apply(&self, _profile: &Profile, roadmap: &mut Roadmap) -> Vec<PolicyRepair> {
        let mut repairs = Vec::new();

        for rec in &mut roadmap.recommendations {
            let category = rec.category();

            match &rec.learn_more_url {
                Some(url) if Self::url_belongs_elsewhere(url, category) => {
                    repairs.push(PolicyRepair {
                        rule_name: self.name(),
                        item: rec.name.clone(),
                        details: format!("URL {} belongs to a different upgrade category", url),
                    });
                    rec.learn_more_url = Some(FALLBACK_LEARN_MORE_URL.to_string());
                }
                None => {
                    repairs.push(PolicyRepair {
                        rule_name: self.name(),
                        item: rec.name.clone(),
                        details: "no specific URL available; fallback substituted".to_string(),
                    });
                    rec.learn_more_url = Some(FALLBACK_LEARN_MORE_URL.to_string());
                }
                Some(_) => {}
            }
        }

        repairs
    }
}

/// Every roadmap carries the non-refundability disclosure.
pub struct DisclosureRule;

impl PolicyRule for DisclosureRule {
    fn name(&self) -> &'static str {
        "mandatory_credit_disclosure"
    }

    fn apply(&self, _profile: &Profile, roadmap: &mut Roadmap) -> Vec<PolicyRepair> {
        let present = roadmap.disclosure.to_lowercase().contains("non-refundable")
            || roadmap.summary_text.to_lowercase().contains("non-refundable");

        if present {
            return Vec::new();
        }

        roadmap.disclosure = CREDIT_DISCLOSURE.to_string();
        vec![PolicyRepair {
            rule_name: self.name(),
            item: "roadmap".to_string(),
            details: "missing non-refundability disclosure appended".to_string(),
        }]
    }
}

/// Create the policy engine with the standard rule set, in enforcement
/// order: grant coverage feeds into the credit basis, so it runs first.
pub fn create_default_policy_engine() -> PolicyEngine {
    let mut engine = PolicyEngine::new();
    engine.add_rule(Box::new(GrantCoverageRule));
    engine.add_rule(Box::new(WeatherizationEligibilityRule));
    engine.add_rule(Box::new(FederalCreditRule));
    engine.add_rule(Box::new(UrlIntegrityRule));
    engine.add_rule(Box::new(DisclosureRule));
    engine
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FundingItem, RecommendationKind};

    fn profile(income_range: &str) -> Profile {
        Profile {
            zip_code: "78704".to_string(),
            ownership_status: "own".to_string(),
            home_type: "single_family".to_string(),
            income_range: income_range.to_string(),
            heating_system: "gas furnace".to_string(),
            home_age_year: Some(1980),
            monthly_electric_bill: None,
            monthly_gas_bill: None,
        }
    }

    fn rec(name: &str, cost: f64, rebate: f64, credit: f64) -> Recommendation {
        Recommendation {
            name: name.to_string(),
            kind: RecommendationKind::BigBet,
            description: String::new(),
            estimated_cost: cost,
            rebate_amount: rebate,
            federal_credit: credit,
            estimated_monthly_savings: 50.0,
            roi_years: None,
            source_citation: String::new(),
            learn_more_url: Some("https://example.gov/generic".to_string()),
            funding_breakdown: vec![],
        }
    }

    fn roadmap(recommendations: Vec<Recommendation>) -> Roadmap {
        Roadmap {
            total_projected_savings_yearly: 0.0,
            recommendations,
            summary_text: String::new(),
            disclosure: String::new(),
        }
    }

    #[test]
    fn test_heat_pump_credit_clamped_to_cap() {
        let mut map = roadmap(vec![rec("Ducted Heat Pump", 15_000.0, 2_500.0, 3_750.0)]);
        let report = create_default_policy_engine().enforce(&profile("$90,000"), &mut map);

        // 30% of (15000 - 2500) = 3750, but the heat equipment cap is $2,000.
        assert_eq!(map.recommendations[0].federal_credit, 2_000.0);
        assert!(!report.compliant());
    }

    #[test]
    fn test_basis_reduction_clamps_unreduced_credit() {
        let mut map = roadmap(vec![rec("Rooftop Solar", 20_000.0, 5_000.0, 6_000.0)]);
        create_default_policy_engine().enforce(&profile("$90,000"), &mut map);

        // 30% must apply to (20000 - 5000), not the full cost.
        assert_eq!(map.recommendations[0].federal_credit, 4_500.0);
    }

    #[test]
    fn test_envelope_categories_share_one_bucket() {
        let mut map = roadmap(vec![
            rec("Triple-Pane Windows", 6_000.0, 0.0, 1_200.0),
            rec("Attic Insulation", 4_000.0, 0.0, 1_200.0),
        ]);
        create_default_policy_engine().enforce(&profile("$90,000"), &mut map);

        assert_eq!(map.recommendations[0].federal_credit, 1_200.0);
        assert_eq!(map.recommendations[1].federal_credit, 0.0);
    }

    #[test]
    fn test_compliant_roadmap_untouched() {
        let mut item = rec("Ducted Heat Pump", 12_000.0, 2_500.0, 2_000.0);
        item.learn_more_url = Some("https://example.gov/rebates/heat-pump".to_string());
        let mut map = roadmap(vec![item]);
        map.disclosure = CREDIT_DISCLOSURE.to_string();

        let report = create_default_policy_engine().enforce(&profile("$90,000"), &mut map);
        assert!(report.compliant());
        assert_eq!(map.recommendations[0].federal_credit, 2_000.0);
    }

    #[test]
    fn test_high_income_gets_no_free_weatherization() {
        let mut map = roadmap(vec![rec("Free Weatherization", 3_000.0, 3_000.0, 0.0)]);
        create_default_policy_engine().enforce(&profile("$85,000"), &mut map);

        assert_eq!(map.recommendations[0].rebate_amount, 1_500.0);
    }

    #[test]
    fn test_low_income_keeps_full_weatherization_coverage() {
        let mut map = roadmap(vec![rec("Weatherization Assistance", 3_000.0, 3_000.0, 0.0)]);
        let report =
            create_default_policy_engine().enforce(&profile("$40,000"), &mut map);

        assert_eq!(map.recommendations[0].rebate_amount, 3_000.0);
        assert!(report
            .repairs
            .iter()
            .all(|r| r.rule_name != "weatherization_income_eligibility"));
    }

    #[test]
    fn test_unknown_income_treated_as_moderate() {
        let mut item = rec("Attic Insulation", 10_000.0, 0.0, 0.0);
        item.funding_breakdown = vec![FundingItem {
            source_type: FundingSourceType::FutureGrant,
            provider: "HEAR".to_string(),
            amount: 10_000.0,
            url: "https://example.gov/hear".to_string(),
        }];
        item.rebate_amount = 10_000.0;
        let mut map = roadmap(vec![item]);

        create_default_policy_engine().enforce(&profile("prefer not to say"), &mut map);

        // Moderate tier: 50% coverage.
        assert_eq!(map.recommendations[0].funding_breakdown[0].amount, 5_000.0);
        assert_eq!(map.recommendations[0].rebate_amount, 5_000.0);
    }

    #[test]
    fn test_high_income_grant_zeroed() {
        let mut item = rec("Ducted Heat Pump", 12_000.0, 0.0, 0.0);
        item.funding_breakdown = vec![FundingItem {
            source_type: FundingSourceType::FutureGrant,
            provider: "HEAR".to_string(),
            amount: 8_000.0,
            url: "https://example.gov/hear".to_string(),
        }];
        item.rebate_amount = 8_000.0;
        let mut map = roadmap(vec![item]);

        create_default_policy_engine().enforce(&profile("$250,000"), &mut map);

        assert_eq!(map.recommendations[0].funding_breakdown[0].amount, 0.0);
        assert_eq!(map.recommendations[0].rebate_amount, 0.0);
    }

    #[test]
    fn test_grant_respects_program_cap() {
        let mut item = rec("Whole-Home Electrical Upgrade", 40_000.0, 0.0, 0.0);
        item.funding_breakdown = vec![FundingItem {
            source_type: FundingSourceType::FutureGrant,
            provider: "HEAR".to_string(),
            amount: 20_000.0,
            url: "https://example.gov/hear".to_string(),
        }];
        item.rebate_amount = 20_000.0;
        let mut map = roadmap(vec![item]);

        create_default_policy_engine().enforce(&profile("$40,000"), &mut map);

        // Low income covers 100% of cost but never above the program cap.
        assert_eq!(
            map.recommendations[0].funding_breakdown[0].amount,
            GRANT_PROGRAM_CAP
        );
    }

    #[test]
    fn test_mismatched_url_replaced_with_fallback() {
        let mut item = rec("Weatherstripping & Air Sealing", 400.0, 100.0, 0.0);
        item.learn_more_url = Some("https://example.gov/rebates/water-heater".to_string());
        let mut map = roadmap(vec![item]);

        create_default_policy_engine().enforce(&profile("$90,000"), &mut map);

        assert_eq!(
            map.recommendations[0].learn_more_url.as_deref(),
            Some(FALLBACK_LEARN_MORE_URL)
        );
    }

    #[test]
    fn test_missing_url_gets_fallback() {
        let mut item = rec("Ducted Heat Pump", 12_000.0, 2_500.0, 2_000.0);
        item.learn_more_url = None;
        let mut map = roadmap(vec![item]);

        create_default_policy_engine().enforce(&profile("$90,000"), &mut map);

        assert_eq!(
            map.recommendations[0].learn_more_url.as_deref(),
            Some(FALLBACK_LEARN_MORE_URL)
        );
    }

    #[test]
    fn test_disclosure_appended_when_missing() {
        let mut map = roadmap(vec![rec("Ducted Heat Pump", 12_000.0, 2_500.0, 2_000.0)]);
        create_default_policy_engine().enforce(&profile("$90,000"), &mut map);

        assert!(map.disclosure.contains("non-refundable"));
    }
}
