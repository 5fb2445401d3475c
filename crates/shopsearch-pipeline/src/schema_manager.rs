use std::sync::Arc;
use tracing::info;

use shopsearch_core::error::{Error, Result};
use shopsearch_core::traits::VectorStore;
use shopsearch_core::types::{AnnConfig, IndexSchema};

/// Creates and destroys product indexes. Resetting is destructive: every
/// document in the index is lost.
pub struct SchemaManager {
    store: Arc<dyn VectorStore>,
}

impl SchemaManager {
    pub fn new(store: Arc<dyn VectorStore>) -> Self { Self { store } }

    pub async fn reset_index(&self, name: &str, dimension: usize, ann: AnnConfig) -> Result<IndexSchema> {
        if dimension == 0 {
            return Err(Error::InvalidConfig("vector dimension must be at least 1".to_string()));
        }
        if name.trim().is_empty() {
            return Err(Error::InvalidConfig("index name must not be empty".to_string()));
        }
        let schema = IndexSchema::products(name, dimension, ann);
        self.store.delete_index(name, true).await?;
        self.store.create_index(&schema).await?;
        info!(index = name, dimension, metric = ?schema.vector.ann.metric, "index reset");
        Ok(schema)
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.store.index_exists(name).await
    }

    /// Fails unless the index exists and its vector field holds `vector_dim`
    /// components. The error reports the stored dimension as `expected`.
    pub async fn ensure_dimension(&self, name: &str, vector_dim: usize) -> Result<()> {
        match self.store.index_dimension(name).await? {
            None => Err(Error::NotFound(format!("index '{name}'"))),
            Some(stored) if stored != vector_dim => {
                Err(Error::DimensionMismatch { index: name.to_string(), expected: stored, actual: vector_dim })
            }
            Some(_) => Ok(()),
        }
    }
}
