//! Pipeline orchestrator - the analyze → route → retrieve → grade → generate
//! state machine
//!
//! One run owns one fresh `RunState`; stages mutate only their designated
//! fields and every recoverable failure collapses into the documented
//! fallback, so the caller only ever sees `Some(roadmap)` or `None`.

use crate::finance::calculate_roi;
use crate::models::{
    ContextItem, ContextKind, GradeOutcome, Profile, QueryPlan, QuerySource, Roadmap, Route,
    RecommendationKind,
};
use crate::policy::PolicyEngine;
use crate::retrieval::{KnowledgeIndex, RetrievalFilters};
use crate::search::WebSearch;
use crate::synthesis::{ContextGrader, QuerySynthesizer, RoadmapSynthesizer};
use crate::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Grade retries before generation is forced regardless of verdict.
pub const MAX_GRADE_RETRIES: u32 = 3;
/// Per-query depth on the local retrieval path.
const LOCAL_TOP_K: usize = 2;
/// Base depth of the federal context fetch on the hybrid path.
const FEDERAL_TOP_K: usize = 3;
/// Context shorter than this is failed without a grading call.
const MIN_GRADABLE_CONTEXT_LEN: usize = 50;

/// Observation recorded when the grader passes the context.
pub const OBS_CREDIBLE: &str = "Found credible pricing data.";
/// Observation recorded when the currency-symbol heuristic passes it.
pub const OBS_HEURISTIC: &str = "Found specific pricing data (fallback).";

//
// ================= Run State =================
//

/// Working memory of one pipeline run. Collection fields are append-only;
/// the retry counter only increments; the roadmap is set at most once.
#[derive(Debug)]
pub struct RunState {
    pub run_id: Uuid,
    pub profile: Profile,
    queries: Vec<String>,
    context: Vec<ContextItem>,
    observations: Vec<String>,
    retry_count: u32,
    roadmap: Option<Roadmap>,
}

impl RunState {
    pub fn new(profile: Profile) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            profile,
            queries: Vec::new(),
            context: Vec::new(),
            observations: Vec::new(),
            retry_count: 0,
            roadmap: None,
        }
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn observations(&self) -> &[String] {
        &self.observations
    }

    fn last_observation(&self) -> Option<&str> {
        self.observations.last().map(|s| s.as_str())
    }

    fn set_queries(&mut self, queries: Vec<String>) {
        self.queries = queries;
    }

    fn append_context(&mut self, items: Vec<ContextItem>) {
        self.context.extend(items);
    }

    fn observe(&mut self, message: impl Into<String>) {
        self.observations.push(message.into());
    }

    fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Full accumulated context as one text block, in retrieval order.
    /// Empty placeholder items contribute nothing.
    pub fn context_text(&self) -> String {
        self.context
            .iter()
            .filter(|item| !item.text.trim().is_empty())
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

//
// ================= Stages =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analyze,
    Route,
    RetrieveLocal,
    RetrieveHybrid,
    Grade,
    Generate,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Analyze => "analyze",
            Stage::Route => "route",
            Stage::RetrieveLocal => "retrieve_local",
            Stage::RetrieveHybrid => "retrieve_hybrid",
            Stage::Grade => "grade",
            Stage::Generate => "generate",
            Stage::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Transition out of the grading state. A success observation or an
/// exhausted retry budget forces generation; otherwise the run loops back
/// through a broadened hybrid retrieval.
fn next_after_grade(state: &RunState) -> Stage {
    match state.last_observation() {
        Some(OBS_CREDIBLE) | Some(OBS_HEURISTIC) => Stage::Generate,
        _ if state.retry_count >= MAX_GRADE_RETRIES => Stage::Generate,
        _ => Stage::RetrieveHybrid,
    }
}

//
// ================= Pipeline =================
//

/// The pipeline orchestrator. Capabilities are injected so the flow is
/// testable with deterministic stubs; all of them are shared, read-only
/// collaborators, safe across concurrent runs.
pub struct Pipeline {
    index: Arc<dyn KnowledgeIndex>,
    web_search: Arc<dyn WebSearch>,
    query_synthesizer: Box<dyn QuerySynthesizer>,
    grader: Box<dyn ContextGrader>,
    roadmap_synthesizer: Box<dyn RoadmapSynthesizer>,
    policy: PolicyEngine,
}

impl Pipeline {
    pub fn new(
        index: Arc<dyn KnowledgeIndex>,
        web_search: Arc<dyn WebSearch>,
        query_synthesizer: Box<dyn QuerySynthesizer>,
        grader: Box<dyn ContextGrader>,
        roadmap_synthesizer: Box<dyn RoadmapSynthesizer>,
        policy: PolicyEngine,
    ) -> Self {
        Self {
            index,
            web_search,
            query_synthesizer,
            grader,
            roadmap_synthesizer,
            policy,
        }
    }

    /// Run the full state machine for one profile. Every recoverable
    /// failure has already resolved into a fallback by the time this
    /// returns; `None` means no roadmap could be produced.
    pub async fn run_pipeline(&self, profile: Profile) -> Result<Option<Roadmap>> {
        let mut state = RunState::new(profile);
        let mut stage = Stage::Analyze;

        info!(run_id = ?state.run_id, zip = %state.profile.zip_code, "Pipeline: starting run");

        loop {
            debug!(run_id = ?state.run_id, stage = %stage, "Entering stage");

            stage = match stage {
                Stage::Analyze => {
                    let plan = self.analyze(&state.profile).await;
                    if plan.source == QuerySource::Fallback {
                        warn!(run_id = ?state.run_id, "Query synthesis fell back to deterministic queries");
                    }
                    state.set_queries(plan.queries);
                    state.observe("Analyzed profile.");
                    Stage::Route
                }

                Stage::Route => {
                    let route = self.route(&state.profile.zip_code).await;
                    info!(run_id = ?state.run_id, route = %route, "Coverage routing decided");
                    state.observe(format!("Routed to {} retrieval.", route));
                    match route {
                        Route::Local => Stage::RetrieveLocal,
                        Route::Hybrid => Stage::RetrieveHybrid,
                    }
                }

                Stage::RetrieveLocal => {
                    self.retrieve_local(&mut state).await;
                    Stage::Generate
                }

                Stage::RetrieveHybrid => {
                    self.retrieve_hybrid(&mut state).await;
                    Stage::Grade
                }

                Stage::Grade => {
                    self.grade(&mut state).await;
                    next_after_grade(&state)
                }

                Stage::Generate => {
                    self.generate(&mut state).await;
                    Stage::Done
                }

                Stage::Done => break,
            };
        }

        info!(
            run_id = ?state.run_id,
            retries = state.retry_count,
            produced = state.roadmap.is_some(),
            "Pipeline: run complete"
        );

        Ok(state.roadmap)
    }

    /// Turn the profile into search queries. Never fails: a synthesis or
    /// parse error yields three deterministic queries built from the
    /// profile itself.
    pub async fn analyze(&self, profile: &Profile) -> QueryPlan {
        match self.query_synthesizer.synthesize_queries(profile).await {
            Ok(queries) if !queries.is_empty() => QueryPlan {
                queries,
                source: QuerySource::Model,
            },
            Ok(_) | Err(_) => QueryPlan {
                queries: vec![
                    format!(
                        "energy rebates {} {}",
                        profile.zip_code, profile.heating_system
                    ),
                    format!("federal tax credits {}", profile.ownership_status),
                    format!("utility incentives {}", profile.zip_code),
                ],
                source: QuerySource::Fallback,
            },
        }
    }

    /// Decide the retrieval path. Any lookup failure counts as no
    /// coverage and routes to hybrid.
    pub async fn route(&self, zip_code: &str) -> Route {
        match self.index.check_coverage(zip_code).await {
            Ok(true) => Route::Local,
            Ok(false) => Route::Hybrid,
            Err(e) => {
                warn!("Coverage check failed, assuming no coverage: {}", e);
                Route::Hybrid
            }
        }
    }

    async fn retrieve_local(&self, state: &mut RunState) {
        let queries = state.queries().to_vec();

        for query in queries {
            match self.index.retrieve(&query, None, LOCAL_TOP_K).await {
                Ok(items) if !items.is_empty() => state.append_context(items),
                Ok(_) => state.append_context(vec![ContextItem::empty()]),
                Err(e) => {
                    warn!(query = %query, "Local retrieval failed: {}", e);
                    state.append_context(vec![ContextItem::empty()]);
                }
            }
        }

        state.observe(format!(
            "Retrieved local context for {} queries.",
            state.queries().len()
        ));
    }

    /// Hybrid retrieval: one federal context block plus zip-scoped web
    /// search. Re-entry after a grade failure broadens the federal fetch
    /// instead of re-grading a frozen context; the web queries are not
    /// repeated verbatim.
    async fn retrieve_hybrid(&self, state: &mut RunState) {
        let federal_k = FEDERAL_TOP_K + state.retry_count as usize;

        match self
            .index
            .retrieve(
                "federal tax credits",
                Some(&RetrievalFilters::federal()),
                federal_k,
            )
            .await
        {
            Ok(items) if !items.is_empty() => state.append_context(items),
            Ok(_) => state.append_context(vec![ContextItem::empty()]),
            Err(e) => {
                warn!("Federal retrieval failed: {}", e);
                state.append_context(vec![ContextItem::empty()]);
            }
        }

        if state.retry_count == 0 {
            let zip = state.profile.zip_code.clone();
            let queries = state.queries().to_vec();

            for query in queries {
                let scoped = format!("{} in {}", query, zip);
                match self.web_search.search(&scoped).await {
                    Ok(hits) => {
                        let items: Vec<ContextItem> = hits
                            .into_iter()
                            .map(|hit| ContextItem {
                                text: hit.excerpt,
                                source: hit.url.clone(),
                                kind: ContextKind::Web,
                                url: Some(hit.url),
                            })
                            .collect();
                        if items.is_empty() {
                            state.append_context(vec![ContextItem::empty()]);
                        } else {
                            state.append_context(items);
                        }
                    }
                    Err(e) => {
                        warn!(query = %scoped, "Web search failed: {}", e);
                        state.append_context(vec![ContextItem::empty()]);
                    }
                }
            }
        }

        state.observe("Retrieved hybrid context.");
    }

    /// Credibility gate over the full accumulated context. Thin context
    /// fails fast without a grading call; a grading invocation error
    /// degrades to the currency-symbol heuristic.
    async fn grade(&self, state: &mut RunState) -> GradeOutcome {
        let combined = state.context_text();

        if combined.trim().len() < MIN_GRADABLE_CONTEXT_LEN {
            state.increment_retry();
            state.observe("Context too thin to grade.");
            return GradeOutcome::Fail;
        }

        match self.grader.grade(&combined).await {
            Ok(result) if result.is_pass() => {
                debug!(explanation = %result.explanation, "Grader passed context");
                state.observe(OBS_CREDIBLE);
                GradeOutcome::Pass
            }
            Ok(result) => {
                debug!(explanation = %result.explanation, "Grader rejected context");
                state.increment_retry();
                state.observe("Context rejected by grader.");
                GradeOutcome::Fail
            }
            Err(e) => {
                warn!("Grading failed, using heuristic: {}", e);
                if combined.contains('$') {
                    state.observe(OBS_HEURISTIC);
                    GradeOutcome::HeuristicPass
                } else {
                    state.increment_retry();
                    state.observe("Grading unavailable and no pricing signal found.");
                    GradeOutcome::Fail
                }
            }
        }
    }

    /// Rules-constrained synthesis of the final roadmap. Any synthesis
    /// failure or a structurally empty response resolves to no roadmap;
    /// a successful one is policy-repaired and its big-bet ROI fields are
    /// overwritten with the deterministic calculator result.
    async fn generate(&self, state: &mut RunState) {
        let context = state.context_text();

        let mut roadmap = match self
            .roadmap_synthesizer
            .synthesize(&state.profile, &context)
            .await
        {
            Ok(roadmap) if !roadmap.recommendations.is_empty() => roadmap,
            Ok(_) => {
                warn!(run_id = ?state.run_id, "Generated roadmap had no recommendations");
                state.observe("Roadmap generation returned nothing usable.");
                return;
            }
            Err(e) => {
                warn!(run_id = ?state.run_id, "Roadmap generation failed: {}", e);
                state.observe("Roadmap generation failed.");
                return;
            }
        };

        let report = self.policy.enforce(&state.profile, &mut roadmap);
        if !report.compliant() {
            state.observe(format!(
                "Applied {} policy repairs to generated roadmap.",
                report.repairs.len()
            ));
        }

        for rec in &mut roadmap.recommendations {
            if rec.kind == RecommendationKind::BigBet && rec.estimated_cost > 0.0 {
                let metrics = calculate_roi(
                    rec.estimated_cost,
                    rec.rebate_amount,
                    rec.federal_credit,
                    rec.estimated_monthly_savings,
                );
                rec.roi_years = Some(metrics.roi_years);
            }
        }

        roadmap.total_projected_savings_yearly = roadmap
            .recommendations
            .iter()
            .map(|r| r.estimated_monthly_savings * 12.0)
            .sum();

        state.observe("Generated roadmap.");
        state.roadmap = Some(roadmap);
    }
}

//
// ================= Tests =================
//
