//! Live web search abstraction
//!
//! Used on the hybrid retrieval path when the index has no local-utility
//! coverage for the household's zip code.

use crate::models::SearchHit;
use crate::Result;
use async_trait::async_trait;

pub mod tavily;
pub use tavily::TavilyClient;

/// Trait for live web search. Implementations return at most the top 3
/// results, each reduced to URL + excerpt.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// Mock search returning canned authoritative-looking results.
pub struct MockWebSearch;

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        Ok(vec![
            SearchHit {
                url: "https://www.energy.gov/save/rebates".to_string(),
                excerpt: format!("Federal rebate listings for: {}. Credits up to $2,000.", query),
            },
            SearchHit {
                url: "https://www.energystar.gov/rebate-finder".to_string(),
                excerpt: "ENERGY STAR rebate finder with utility-level incentives.".to_string(),
            },
        ])
    }
}
