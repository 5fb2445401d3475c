use async_trait::async_trait;
use lancedb::Connection;
use tracing::debug;

use shopsearch_core::error::{Error, Result};
use shopsearch_core::traits::VectorStore;
use shopsearch_core::types::{BulkResponse, IndexSchema, IndexedDocument, SearchHit, Similarity};

use crate::{index_build, search, table, writer};

/// Embedded LanceDB store rooted at a local directory URI.
#[derive(Clone)]
pub struct LanceStore {
    conn: Connection,
    uri: String,
    metric: Similarity,
    nprobes: usize,
}

impl LanceStore {
    pub async fn connect(uri: &str) -> Result<Self> {
        let conn = table::open_db(uri).await?;
        debug!(uri, "opened LanceDB");
        Ok(Self { conn, uri: uri.to_string(), metric: Similarity::Cosine, nprobes: 20 })
    }

    pub fn with_metric(mut self, metric: Similarity) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_nprobes(mut self, nprobes: usize) -> Self {
        self.nprobes = nprobes.max(1);
        self
    }

    pub fn uri(&self) -> &str { &self.uri }
    pub fn connection(&self) -> &Connection { &self.conn }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn ping(&self) -> Result<bool> {
        Ok(self.conn.table_names().execute().await.is_ok())
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        table::table_exists(&self.conn, name).await
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        if schema.vector.ann.metric != self.metric {
            return Err(Error::InvalidConfig(format!(
                "index metric {:?} differs from store metric {:?}",
                schema.vector.ann.metric, self.metric
            )));
        }
        table::create_table(&self.conn, schema).await
    }

    async fn delete_index(&self, name: &str, ignore_missing: bool) -> Result<()> {
        table::drop_table(&self.conn, name, ignore_missing).await
    }

    async fn index_dimension(&self, name: &str) -> Result<Option<usize>> {
        table::table_dimension(&self.conn, name).await
    }

    async fn count(&self, name: &str) -> Result<usize> {
        table::row_count(&self.conn, name).await
    }

    async fn bulk_upsert(&self, name: &str, docs: &[IndexedDocument]) -> Result<BulkResponse> {
        writer::upsert_documents(&self.conn, name, docs).await
    }

    async fn knn_search(&self, name: &str, field: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if !table::table_exists(&self.conn, name).await? {
            return Err(Error::NotFound(format!("index '{name}'")));
        }
        search::knn(&self.conn, name, field, vector, k, self.metric, self.nprobes).await
    }

    async fn build_indexes(&self, schema: &IndexSchema) -> Result<bool> {
        index_build::build_indexes(&self.conn, schema).await
    }
}
