//! Pinecone-backed knowledge index
//!
//! Embeds queries with OpenAI `text-embedding-3-small` and runs similarity
//! lookups against a Pinecone index over the REST API.

use crate::error::PipelineError;
use crate::models::{ContextItem, ContextKind};
use crate::retrieval::{KnowledgeIndex, RetrievalFilters};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::debug;

const EMBEDDING_MODEL: &str = "text-embedding-3-small";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

pub struct PineconeIndex {
    client: Client,
    pinecone_api_key: String,
    index_host: String,
    openai_api_key: String,
}

impl PineconeIndex {
    pub fn new(pinecone_api_key: String, index_host: String, openai_api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            pinecone_api_key,
            index_host: index_host.trim_end_matches('/').to_string(),
            openai_api_key,
        }
    }

    /// Construct from PINECONE_API_KEY, PINECONE_INDEX_HOST and
    /// OPENAI_API_KEY. Returns `None` when any of the three is missing.
    pub fn from_env() -> Option<Self> {
        let pinecone_api_key = env::var("PINECONE_API_KEY").ok()?;
        let index_host = env::var("PINECONE_INDEX_HOST").ok()?;
        let openai_api_key = env::var("OPENAI_API_KEY").ok()?;

        Some(Self::new(pinecone_api_key, index_host, openai_api_key))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.openai_api_key)
            .json(&json!({
                "model": EMBEDDING_MODEL,
                "input": text,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Retrieval(format!(
                "Embedding API returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Invalid embedding response: {}", e)))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| PipelineError::Retrieval("Empty embedding response".to_string()))
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        filter: Option<Value>,
        k: usize,
        include_metadata: bool,
    ) -> Result<Vec<PineconeMatch>> {
        let url = format!("{}/query", self.index_host);

        let mut body = json!({
            "vector": vector,
            "topK": k,
            "includeMetadata": include_metadata,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .client
            .post(url)
            .header("Api-Key", &self.pinecone_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Pinecone request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Retrieval(format!(
                "Pinecone returned {}: {}",
                status, body
            )));
        }

        let parsed: PineconeQueryResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Invalid Pinecone response: {}", e)))?;

        Ok(parsed.matches)
    }
}

fn build_filter(filters: Option<&RetrievalFilters>) -> Option<Value> {
    let filters = filters?;
    let mut clauses = serde_json::Map::new();

    if let Some(location) = &filters.location {
        clauses.insert("location".to_string(), json!(location));
    }
    if let Some(kind) = filters.kind {
        clauses.insert("type".to_string(), json!(kind_tag(kind)));
    }
    if let Some(zip) = &filters.zip_code {
        clauses.insert("zip_codes".to_string(), json!({ "$in": [zip] }));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(Value::Object(clauses))
    }
}

fn kind_tag(kind: ContextKind) -> &'static str {
    match kind {
        ContextKind::UtilityRebate => "utility_rebate",
        ContextKind::Federal => "federal",
        ContextKind::Web => "web",
        ContextKind::Unknown => "unknown",
    }
}

fn kind_from_tag(tag: Option<&str>) -> ContextKind {
    match tag {
        Some("utility_rebate") => ContextKind::UtilityRebate,
        Some("federal") => ContextKind::Federal,
        Some("web") => ContextKind::Web,
        _ => ContextKind::Unknown,
    }
}

#[async_trait]
impl KnowledgeIndex for PineconeIndex {
    async fn retrieve(
        &self,
        query: &str,
        filters: Option<&RetrievalFilters>,
        k: usize,
    ) -> Result<Vec<ContextItem>> {
        let vector = self.embed(query).await?;
        let matches = self
            .query(vector, build_filter(filters), k, true)
            .await?;

        debug!(query = %query, matches = matches.len(), "Pinecone retrieval");

        Ok(matches
            .into_iter()
            .map(|m| {
                let metadata = m.metadata.unwrap_or_default();
                ContextItem {
                    text: metadata
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    source: metadata
                        .get("source")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    kind: kind_from_tag(metadata.get("type").and_then(Value::as_str)),
                    url: metadata
                        .get("url")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string()),
                }
            })
            .collect())
    }

    async fn check_coverage(&self, zip_code: &str) -> Result<bool> {
        let vector = self.embed("utility rebate").await?;
        let filter = json!({
            "zip_codes": { "$in": [zip_code] },
            "type": "utility_rebate",
        });

        let matches = self.query(vector, Some(filter), 1, false).await?;
        Ok(!matches.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct PineconeQueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_construction() {
        let filters = RetrievalFilters {
            location: None,
            kind: Some(ContextKind::UtilityRebate),
            zip_code: Some("78704".to_string()),
        };

        let value = build_filter(Some(&filters)).unwrap();
        assert_eq!(value["type"], "utility_rebate");
        assert_eq!(value["zip_codes"]["$in"][0], "78704");

        assert!(build_filter(None).is_none());
        assert!(build_filter(Some(&RetrievalFilters::default())).is_none());
    }

    #[test]
    fn test_kind_tag_round_trip() {
        for kind in [
            ContextKind::UtilityRebate,
            ContextKind::Federal,
            ContextKind::Web,
        ] {
            assert_eq!(kind_from_tag(Some(kind_tag(kind))), kind);
        }
        assert_eq!(kind_from_tag(None), ContextKind::Unknown);
    }
}
