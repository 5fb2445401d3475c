use std::sync::Arc;
use tracing::{debug, info};

use shopsearch_core::error::{Error, Result};
use shopsearch_core::traits::{Embedder, KeywordExpander, VectorStore};
use shopsearch_core::types::{SearchHit, VECTOR_FIELD};

use crate::expander::{expand_or_fallback, Expansion};

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Hits at or above the score floor, best first, at most `k`.
    pub results: Vec<SearchHit>,
    /// Text that was embedded: the raw query, plus keywords when expanded.
    pub final_query: String,
    pub expansion: Expansion,
}

pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    expander: Option<Arc<dyn KeywordExpander>>,
    index: String,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, index: impl Into<String>) -> Self {
        Self { store, embedder, expander: None, index: index.into() }
    }

    pub fn with_expander(mut self, expander: Arc<dyn KeywordExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn index(&self) -> &str { &self.index }

    pub async fn search(&self, query: &str, k: usize, min_score: f32) -> Result<SearchOutcome> {
        self.search_with(query, k, min_score, true).await
    }

    /// `expand = false` skips the expander for this request even when one is configured.
    pub async fn search_with(&self, query: &str, k: usize, min_score: f32, expand: bool) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".to_string()));
        }
        if k == 0 {
            return Err(Error::InvalidQuery("k must be at least 1".to_string()));
        }
        if !min_score.is_finite() {
            return Err(Error::InvalidQuery(format!("min_score must be finite, got {min_score}")));
        }

        let expander = if expand { self.expander.as_deref() } else { None };
        let expansion = expand_or_fallback(expander, query).await;
        let final_query = match expansion.keywords() {
            Some(keywords) => format!("{query} {keywords}"),
            None => query.to_string(),
        };
        debug!(%final_query, expanded = expansion.is_expanded(), "final search text");

        let vector = self
            .embedder
            .embed(&final_query)
            .map_err(|e| Error::Embedding(format!("{e:#}")))?;
        let mut results = self.store.knn_search(&self.index, VECTOR_FIELD, &vector, k).await?;
        let returned = results.len();
        results.retain(|hit| hit.score >= min_score);
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        info!(index = %self.index, k, min_score, returned, kept = results.len(), "search");

        Ok(SearchOutcome { results, final_query, expansion })
    }
}
