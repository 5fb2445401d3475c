use async_trait::async_trait;

use crate::error::{ExpansionError, Result};
use crate::types::{BulkResponse, IndexSchema, IndexedDocument, SearchHit};

pub trait Embedder: Send + Sync {
    /// Output dimension D.
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Stable identifier of the loaded model, e.g. `xlm-roberta:...:d768`.
    fn model_id(&self) -> &str;
    /// Vectors come back in the same order as `texts`.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Persisted index backend: schema lifecycle, bulk writes and kNN reads.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Readiness probe.
    async fn ping(&self) -> Result<bool>;
    async fn index_exists(&self, name: &str) -> Result<bool>;
    async fn create_index(&self, schema: &IndexSchema) -> Result<()>;
    /// With `ignore_missing` a missing index is not an error.
    async fn delete_index(&self, name: &str, ignore_missing: bool) -> Result<()>;
    /// Dimension bound into the index's vector field, `None` if the index is missing.
    async fn index_dimension(&self, name: &str) -> Result<Option<usize>>;
    async fn count(&self, name: &str) -> Result<usize>;
    /// Insert-or-replace keyed by document id. Rejects the whole call with
    /// [`crate::error::Error::DimensionMismatch`] before writing when any
    /// vector has the wrong length.
    async fn bulk_upsert(&self, name: &str, docs: &[IndexedDocument]) -> Result<BulkResponse>;
    /// Up to `k` hits ordered by descending score.
    async fn knn_search(&self, name: &str, field: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;
    /// Builds secondary indexes (ANN graph, full-text, keyword) once data is
    /// loaded. Returns whether the ANN index was built.
    async fn build_indexes(&self, schema: &IndexSchema) -> Result<bool>;
}

#[async_trait]
pub trait KeywordExpander: Send + Sync {
    async fn expand(&self, query: &str) -> std::result::Result<String, ExpansionError>;
}
