//! Knowledge index abstraction
//!
//! The pipeline consumes the retrieval index as an opaque capability:
//! vector-similarity lookup plus a local-coverage existence check. The
//! in-memory index backs tests and the demo binary; the Pinecone index
//! backs production.

use crate::models::{ContextItem, ContextKind};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod pinecone;
pub use pinecone::PineconeIndex;

/// Metadata filters for a retrieval call.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    pub location: Option<String>,
    pub kind: Option<ContextKind>,
    pub zip_code: Option<String>,
}

impl RetrievalFilters {
    pub fn federal() -> Self {
        Self {
            location: Some("federal".to_string()),
            ..Default::default()
        }
    }
}

/// Trait for the indexed knowledge base.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Top-`k` similarity lookup, optionally constrained by filters.
    async fn retrieve(
        &self,
        query: &str,
        filters: Option<&RetrievalFilters>,
        k: usize,
    ) -> Result<Vec<ContextItem>>;

    /// Whether at least one local-utility record is tagged for this zip.
    async fn check_coverage(&self, zip_code: &str) -> Result<bool>;
}

/// One indexed document plus the metadata filters it answers to.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub item: ContextItem,
    pub location: Option<String>,
    pub zip_codes: Vec<String>,
}

/// In-memory index for development and tests.
///
/// Similarity is approximated by query-term overlap, which keeps routing
/// and retrieval fully deterministic for a fixed set of records.
pub struct InMemoryIndex {
    records: Arc<RwLock<Vec<IndexRecord>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn insert(&self, record: IndexRecord) {
        let mut records = self.records.write().await;
        records.push(record);
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filters(record: &IndexRecord, filters: Option<&RetrievalFilters>) -> bool {
    let Some(filters) = filters else {
        return true;
    };

    if let Some(location) = &filters.location {
        if record.location.as_deref() != Some(location.as_str()) {
            return false;
        }
    }
    if let Some(kind) = filters.kind {
        if record.item.kind != kind {
            return false;
        }
    }
    if let Some(zip) = &filters.zip_code {
        if !record.zip_codes.iter().any(|z| z == zip) {
            return false;
        }
    }

    true
}

fn overlap_score(query: &str, text: &str) -> usize {
    let haystack = text.to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|term| haystack.contains(term))
        .count()
}

#[async_trait]
impl KnowledgeIndex for InMemoryIndex {
    async fn retrieve(
        &self,
        query: &str,
        filters: Option<&RetrievalFilters>,
        k: usize,
    ) -> Result<Vec<ContextItem>> {
        let records = self.records.read().await;

        let mut scored: Vec<(usize, &IndexRecord)> = records
            .iter()
            .filter(|r| matches_filters(r, filters))
            .map(|r| (overlap_score(query, &r.item.text), r))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, r)| r.item.clone())
            .collect())
    }

    async fn check_coverage(&self, zip_code: &str) -> Result<bool> {
        let records = self.records.read().await;

        Ok(records.iter().any(|r| {
            r.item.kind == ContextKind::UtilityRebate && r.zip_codes.iter().any(|z| z == zip_code)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utility_record(zip: &str, text: &str) -> IndexRecord {
        IndexRecord {
            item: ContextItem {
                text: text.to_string(),
                source: "Austin Energy".to_string(),
                kind: ContextKind::UtilityRebate,
                url: Some("https://example.com/rebates".to_string()),
            },
            location: Some("local".to_string()),
            zip_codes: vec![zip.to_string()],
        }
    }

    #[tokio::test]
    async fn test_coverage_check_is_deterministic() {
        let index = InMemoryIndex::new();
        index
            .insert(utility_record("78704", "heat pump rebate $2,500"))
            .await;

        for _ in 0..3 {
            assert!(index.check_coverage("78704").await.unwrap());
            assert!(!index.check_coverage("10001").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_retrieve_respects_filters_and_k() {
        let index = InMemoryIndex::new();
        index
            .insert(utility_record("78704", "heat pump rebate $2,500"))
            .await;
        index
            .insert(IndexRecord {
                item: ContextItem {
                    text: "federal heat pump tax credit 25C up to $2,000".to_string(),
                    source: "IRS".to_string(),
                    kind: ContextKind::Federal,
                    url: None,
                },
                location: Some("federal".to_string()),
                zip_codes: vec![],
            })
            .await;

        let federal = index
            .retrieve("heat pump", Some(&RetrievalFilters::federal()), 2)
            .await
            .unwrap();
        assert_eq!(federal.len(), 1);
        assert_eq!(federal[0].kind, ContextKind::Federal);

        let all = index.retrieve("heat pump", None, 1).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_empty_for_unmatched_query() {
        let index = InMemoryIndex::new();
        index
            .insert(utility_record("78704", "heat pump rebate"))
            .await;

        let items = index.retrieve("solar panels", None, 2).await.unwrap();
        assert!(items.is_empty());
    }
}
