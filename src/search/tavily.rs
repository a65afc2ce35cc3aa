//! Tavily web search client

use crate::error::PipelineError;
use crate::models::SearchHit;
use crate::search::WebSearch;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::info;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 3;

pub struct TavilyClient {
    client: Client,
    api_key: String,
}

impl TavilyClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, api_key }
    }

    pub fn from_env() -> Option<Self> {
        env::var("TAVILY_API_KEY").ok().map(Self::new)
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    content: String,
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        info!(query = %query, "Searching web");

        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
        };

        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Search(format!("Tavily request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Search(format!(
                "Tavily returned {}: {}",
                status, body
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Search(format!("Invalid Tavily response: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|r| SearchHit {
                url: r.url,
                excerpt: r.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = TavilyRequest {
            api_key: "key",
            query: "heat pump rebates in 78704",
            search_depth: "advanced",
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("heat pump rebates in 78704"));
        assert!(json.contains("advanced"));
    }

    #[test]
    fn test_response_parsing_tolerates_missing_results() {
        let parsed: TavilyResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }
}
