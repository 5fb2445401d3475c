//! Domain types shared by the indexing and retrieval paths.

use serde::{Deserialize, Serialize};

pub type ProductId = String;

/// Name of the dense-vector field in every product index.
pub const VECTOR_FIELD: &str = "vector_embedding";

/// One input row as produced by a record source.
///
/// - `id`: unique product identifier, also the document key in the index
/// - `title`/`description`/`category`: free text fed to the embedder
/// - `price`: non-negative amount, stored as a numeric field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
}

impl ProductRecord {
    /// Text handed to the embedder: title, description and category joined by
    /// single spaces, always in that order.
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.category)
    }

    /// Checks the constraints a record must meet before it is embedded.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("empty id".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be a non-negative number, got {}", self.price));
        }
        Ok(())
    }
}

/// A product record together with its embedding, ready for a bulk upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub vector_embedding: Vec<f32>,
}

impl IndexedDocument {
    pub fn from_record(record: ProductRecord, vector_embedding: Vec<f32>) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            category: record.category,
            price: record.price,
            vector_embedding,
        }
    }
}

/// Similarity metric used by the ANN index and by kNN queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    #[default]
    Cosine,
    L2,
    Dot,
}

impl Similarity {
    /// Converts a distance reported by the store into a score where higher
    /// means more similar. Cosine yields the cosine similarity in `[-1, 1]`.
    pub fn score_from_distance(self, distance: f32) -> f32 {
        match self {
            Similarity::Cosine | Similarity::Dot => 1.0 - distance,
            Similarity::L2 => 1.0 / (1.0 + distance.max(0.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnnMethod {
    #[default]
    Hnsw,
}

/// Graph construction parameters for the dense-vector field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnConfig {
    pub method: AnnMethod,
    pub metric: Similarity,
    /// Max edges per node (HNSW `M`).
    pub num_edges: u32,
    pub ef_construction: u32,
    /// IVF partitions wrapped around the HNSW graphs.
    pub num_partitions: u32,
    /// Tables smaller than this are searched exhaustively; no index is trained.
    pub min_rows: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            method: AnnMethod::Hnsw,
            metric: Similarity::Cosine,
            num_edges: 16,
            ef_construction: 128,
            num_partitions: 1,
            min_rows: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub name: String,
    pub dimension: usize,
    pub ann: AnnConfig,
}

/// Logical schema of a product index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub text_fields: Vec<String>,
    pub keyword_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
    pub vector: VectorField,
}

impl IndexSchema {
    pub fn products(name: &str, dimension: usize, ann: AnnConfig) -> Self {
        Self {
            name: name.to_string(),
            text_fields: vec!["title".to_string(), "description".to_string()],
            keyword_fields: vec!["category".to_string()],
            numeric_fields: vec!["price".to_string()],
            vector: VectorField { name: VECTOR_FIELD.to_string(), dimension, ann },
        }
    }
}

/// Outcome of one document within a bulk upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemStatus {
    pub id: ProductId,
    pub error: Option<String>,
}

impl BulkItemStatus {
    pub fn ok(id: impl Into<String>) -> Self { Self { id: id.into(), error: None } }
    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { id: id.into(), error: Some(reason.into()) }
    }
    pub fn is_ok(&self) -> bool { self.error.is_none() }
}

/// Per-item result of a bulk upsert. Batches are not atomic: some items may
/// be written while others fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub items: Vec<BulkItemStatus>,
}

impl BulkResponse {
    pub fn all_ok<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self { items: ids.into_iter().map(BulkItemStatus::ok).collect() }
    }
    pub fn succeeded(&self) -> usize { self.items.iter().filter(|i| i.is_ok()).count() }
    pub fn failed(&self) -> usize { self.items.len() - self.succeeded() }
    pub fn failures(&self) -> impl Iterator<Item = &BulkItemStatus> { self.items.iter().filter(|i| !i.is_ok()) }
}

/// A ranked kNN hit with the stored fields of the matching document.
///
/// `score` follows [`Similarity::score_from_distance`]: higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub score: f32,
}
