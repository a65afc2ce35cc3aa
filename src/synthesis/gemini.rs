//! Gemini-powered generative steps
//!
//! Prompt builders plus strict JSON parsing into the typed models. Parse
//! failures surface as errors so the pipeline can take its deterministic
//! fallbacks instead of swallowing them silently.

use crate::error::PipelineError;
use crate::gemini::{strip_json_fences, GeminiClient, GENERATION_MODEL, GRADING_MODEL};
use crate::models::{GradeResult, Profile, Roadmap};
use crate::policy::{
    CREDIT_DISCLOSURE, ENVELOPE_CREDIT_CAP, FALLBACK_LEARN_MORE_URL, FREE_WEATHERIZATION_INCOME_CEILING,
    GRANT_PROGRAM_CAP, HEAT_EQUIPMENT_CREDIT_CAP,
};
use crate::synthesis::{ContextGrader, QuerySynthesizer, RoadmapSynthesizer};
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

//
// ========== Query synthesis ==========
//

pub struct GeminiQuerySynthesizer {
    client: GeminiClient,
}

impl GeminiQuerySynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: GeminiClient::new(api_key, GENERATION_MODEL),
        }
    }

    fn build_prompt(profile: &Profile) -> String {
        format!(
            r#"Analyze this user profile for energy rebate eligibility:
- Zip: {}
- Home: {}, {}
- Income: {}
- Heating: {}
- Home Age: {}

Generate 3 specific search queries to find the best rebates for them.
Focus on high-value upgrades (HVAC, Solar) and quick wins (Weatherization).
Return ONLY a JSON list of strings, e.g. ["query1", "query2"]"#,
            profile.zip_code,
            profile.ownership_status,
            profile.home_type,
            profile.income_range,
            profile.heating_system,
            profile
                .home_age_year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        )
    }
}

#[async_trait]
impl QuerySynthesizer for GeminiQuerySynthesizer {
    async fn synthesize_queries(&self, profile: &Profile) -> Result<Vec<String>> {
        let prompt = Self::build_prompt(profile);
        let response = self
            .client
            .generate(&prompt, "You are an energy incentive research assistant.")
            .await?;

        parse_query_response(&response)
    }
}

/// Parse the model's query list. Anything that is not a non-empty JSON
/// list of strings is an error.
fn parse_query_response(response: &str) -> Result<Vec<String>> {
    let cleaned = strip_json_fences(response);

    let queries: Vec<String> = serde_json::from_str(cleaned).map_err(|e| {
        PipelineError::InvalidResponse(format!(
            "Query list did not parse: {} | raw={}",
            e, response
        ))
    })?;

    if queries.is_empty() {
        return Err(PipelineError::InvalidResponse(
            "Query list was empty".to_string(),
        ));
    }

    Ok(queries)
}

//
// ========== Context grading ==========
//

pub struct GeminiGrader {
    client: GeminiClient,
}

impl GeminiGrader {
    pub fn new(api_key: String) -> Self {
        Self {
            client: GeminiClient::new(api_key, GRADING_MODEL),
        }
    }
}

const GRADER_SYSTEM_PROMPT: &str = r#"You are a strict data evaluator.
Your job is to grade the retrieved documents for relevance, specificity, and CREDIBILITY.

CREDIBILITY RULES:
- PASS: government sites (.gov), utility companies (austinenergy.com), official manufacturers (energy star).
- FAIL: generic blogs, content farms, "tips and tricks" articles, unverified forums.

CONTENT RULES:
- PASS: Contains specific rebate amounts (e.g. "$2,000"), specific tax credit codes (25C), or income limits.
- FAIL: Generic advice like "install better windows" without specific financial details.

Output 'yes' if the documents contain at least one credible, specific source of valid rebate information.
Respond with ONLY a JSON object: {"binary_score": "yes" or "no", "explanation": "..."}"#;

#[async_trait]
impl ContextGrader for GeminiGrader {
    async fn grade(&self, context: &str) -> Result<GradeResult> {
        let prompt = format!("Documents:\n\n{}", context);
        let response = self.client.generate(&prompt, GRADER_SYSTEM_PROMPT).await?;

        parse_grade_response(&response)
    }
}

fn parse_grade_response(response: &str) -> Result<GradeResult> {
    let cleaned = strip_json_fences(response);

    let grade: GradeResult = serde_json::from_str(cleaned).map_err(|e| {
        PipelineError::InvalidResponse(format!("Grade did not parse: {} | raw={}", e, response))
    })?;

    let score = grade.binary_score.to_lowercase();
    if score != "yes" && score != "no" {
        return Err(PipelineError::InvalidResponse(format!(
            "Unexpected binary_score: {}",
            grade.binary_score
        )));
    }

    Ok(grade)
}

//
// ========== Roadmap synthesis ==========
//

pub struct GeminiRoadmapSynthesizer {
    client: GeminiClient,
}

impl GeminiRoadmapSynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: GeminiClient::new(api_key, GENERATION_MODEL),
        }
    }

    fn build_prompt(profile: &Profile, context: &str) -> String {
        format!(
            r#"User Profile: {}

Context:
{}

Task:
Generate a personalized energy roadmap JSON.

CRITICAL FINANCIAL RULES:
1. BASIS REDUCTION: federal_credit = 30% of (estimated_cost - utility rebates - grant rebates).
   Subtract rebates from the cost BEFORE applying the 30%; never compute the credit on the full cost.
2. CREDIT CAPS: federal_credit is capped at ${heat_cap:.0}/year for heat pump, biomass and boiler
   upgrades, and at ${envelope_cap:.0}/year COMBINED for windows, doors, insulation and electrical.
3. INCOME TIERS: households below 80% of area median income get up to 100% of project cost from
   the grant program (max ${grant_cap:.0}); 80-150% AMI gets 50% coverage (same cap); above 150% AMI
   gets $0 from that program. If the income tier cannot be resolved, assume the moderate tier.
4. WEATHERIZATION: if income is above ${wx_ceiling:.0}, do NOT recommend free weatherization;
   recommend home performance rebates (insulation/air sealing) instead. At or below ${wx_ceiling:.0},
   the weatherization assistance program applies.
5. CONSERVATIVE ESTIMATES: when a rebate amount is ambiguous in the context, choose the LOWER
   plausible figure. Never count the same incentive toward two recommendations.
6. URL CHECK: map SPECIFIC URLs to their upgrades. Do NOT use a water heater URL for a
   weatherization recommendation. If no specific URL exists, use: {fallback_url}
7. DISCLOSURE: the summary must state: "{disclosure}"

Steps:
1. Identify quick wins (low upfront cost) and big bets (major upgrades).
2. Estimate ROI years and monthly savings per item.
3. Calculate total projected yearly savings.
4. Extract URLs strictly following rule 6.

Return ONLY JSON with this shape:
{{
  "total_projected_savings_yearly": 0.0,
  "summary_text": "...",
  "recommendations": [
    {{
      "name": "...",
      "type": "quick_win" or "big_bet",
      "description": "...",
      "estimated_cost": 0.0,
      "rebate_amount": 0.0,
      "federal_credit": 0.0,
      "estimated_monthly_savings": 0.0,
      "source_citation": "...",
      "learn_more_url": "..."
    }}
  ]
}}"#,
            serde_json::to_string(profile).unwrap_or_default(),
            context,
            heat_cap = HEAT_EQUIPMENT_CREDIT_CAP,
            envelope_cap = ENVELOPE_CREDIT_CAP,
            grant_cap = GRANT_PROGRAM_CAP,
            wx_ceiling = FREE_WEATHERIZATION_INCOME_CEILING,
            fallback_url = FALLBACK_LEARN_MORE_URL,
            disclosure = CREDIT_DISCLOSURE,
        )
    }
}

#[async_trait]
impl RoadmapSynthesizer for GeminiRoadmapSynthesizer {
    async fn synthesize(&self, profile: &Profile, context: &str) -> Result<Roadmap> {
        let prompt = Self::build_prompt(profile, context);
        debug!(prompt_len = prompt.len(), "Synthesizing roadmap");

        let response = self
            .client
            .generate(
                &prompt,
                "You are GreenGain, an expert energy advisor. Return purely JSON.",
            )
            .await?;

        parse_roadmap_response(&response)
    }
}

fn parse_roadmap_response(response: &str) -> Result<Roadmap> {
    let cleaned = strip_json_fences(response);
    if cleaned.is_empty() {
        return Err(PipelineError::InvalidResponse(
            "Empty roadmap response".to_string(),
        ));
    }

    let roadmap: Roadmap = serde_json::from_str(cleaned).map_err(|e| {
        PipelineError::InvalidResponse(format!("Roadmap did not parse: {} | raw={}", e, response))
    })?;

    Ok(roadmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_list() {
        let queries =
            parse_query_response("```json\n[\"heat pump rebates\", \"solar 78704\"]\n```").unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0], "heat pump rebates");
    }

    #[test]
    fn test_parse_query_list_rejects_garbage() {
        assert!(parse_query_response("no json here").is_err());
        assert!(parse_query_response("[]").is_err());
        assert!(parse_query_response("{\"queries\": []}").is_err());
    }

    #[test]
    fn test_parse_grade() {
        let grade = parse_grade_response(
            "{\"binary_score\": \"Yes\", \"explanation\": \"austinenergy.com lists $2,500\"}",
        )
        .unwrap();
        assert!(grade.is_pass());

        assert!(parse_grade_response("{\"binary_score\": \"maybe\", \"explanation\": \"\"}").is_err());
    }

    #[test]
    fn test_parse_roadmap() {
        let raw = r#"```json
{
  "total_projected_savings_yearly": 1380.0,
  "summary_text": "Start with air sealing, then the heat pump.",
  "recommendations": [
    {
      "name": "Ducted Heat Pump",
      "type": "big_bet",
      "description": "Replace the gas furnace",
      "estimated_cost": 12000.0,
      "rebate_amount": 2500.0,
      "federal_credit": 2000.0,
      "estimated_monthly_savings": 115.0,
      "source_citation": "Austin Energy rebate sheet",
      "learn_more_url": "https://example.gov/rebates/heat-pump"
    }
  ]
}
```"#;

        let roadmap = parse_roadmap_response(raw).unwrap();
        assert_eq!(roadmap.recommendations.len(), 1);
        assert_eq!(roadmap.total_projected_savings_yearly, 1380.0);
    }

    #[test]
    fn test_parse_roadmap_rejects_empty() {
        assert!(parse_roadmap_response("").is_err());
        assert!(parse_roadmap_response("``````").is_err());
    }

    #[test]
    fn test_roadmap_prompt_carries_policy() {
        let profile = Profile {
            zip_code: "78704".to_string(),
            ownership_status: "own".to_string(),
            home_type: "single_family".to_string(),
            income_range: "$80,000 - $120,000".to_string(),
            heating_system: "gas furnace".to_string(),
            home_age_year: Some(1985),
            monthly_electric_bill: Some(180.0),
            monthly_gas_bill: Some(60.0),
        };

        let prompt = GeminiRoadmapSynthesizer::build_prompt(&profile, "some context");
        assert!(prompt.contains("BASIS REDUCTION"));
        assert!(prompt.contains("$2000/year"));
        assert!(prompt.contains(FALLBACK_LEARN_MORE_URL));
        assert!(prompt.contains("non-refundable"));
    }
}
