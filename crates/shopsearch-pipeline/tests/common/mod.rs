#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use shopsearch_core::error::{Error, ExpansionError, Result};
use shopsearch_core::traits::{Embedder, KeywordExpander, VectorStore};
use shopsearch_core::types::{BulkItemStatus, BulkResponse, IndexSchema, IndexedDocument, ProductRecord, SearchHit};

struct MemIndex {
    dim: usize,
    docs: Vec<IndexedDocument>,
}

/// In-memory `VectorStore` with cosine scoring, call counters and injectable failures.
#[derive(Default)]
pub struct MemoryStore {
    indexes: Mutex<HashMap<String, MemIndex>>,
    bulk_sizes: Mutex<Vec<usize>>,
    failing_ids: Mutex<HashSet<String>>,
    pub knn_calls: AtomicUsize,
    pub fail_bulk: AtomicBool,
    pub fail_search: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_index(name: &str, dim: usize) -> Self {
        let store = Self::default();
        store.indexes.lock().unwrap().insert(name.to_string(), MemIndex { dim, docs: Vec::new() });
        store
    }

    pub fn fail_item(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn bulk_sizes(&self) -> Vec<usize> { self.bulk_sizes.lock().unwrap().clone() }

    pub fn ids(&self, name: &str) -> Vec<String> {
        self.indexes.lock().unwrap().get(name).map(|i| i.docs.iter().map(|d| d.id.clone()).collect()).unwrap_or_default()
    }

    pub fn insert_raw(&self, name: &str, doc: IndexedDocument) {
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.get_mut(name).expect("index exists");
        index.docs.push(doc);
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ping(&self) -> Result<bool> { Ok(true) }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.indexes.lock().unwrap().contains_key(name))
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let mut indexes = self.indexes.lock().unwrap();
        if indexes.contains_key(&schema.name) {
            return Err(Error::Store(format!("index '{}' already exists", schema.name)));
        }
        indexes.insert(schema.name.clone(), MemIndex { dim: schema.vector.dimension, docs: Vec::new() });
        Ok(())
    }

    async fn delete_index(&self, name: &str, ignore_missing: bool) -> Result<()> {
        match self.indexes.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None if ignore_missing => Ok(()),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    async fn index_dimension(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.indexes.lock().unwrap().get(name).map(|i| i.dim))
    }

    async fn count(&self, name: &str) -> Result<usize> {
        self.indexes.lock().unwrap().get(name).map(|i| i.docs.len()).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn bulk_upsert(&self, name: &str, docs: &[IndexedDocument]) -> Result<BulkResponse> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(Error::Store("connection refused".to_string()));
        }
        self.bulk_sizes.lock().unwrap().push(docs.len());
        let failing = self.failing_ids.lock().unwrap().clone();
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.get_mut(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        if let Some(doc) = docs.iter().find(|d| d.vector_embedding.len() != index.dim) {
            return Err(Error::DimensionMismatch { index: name.to_string(), expected: index.dim, actual: doc.vector_embedding.len() });
        }
        let mut items = Vec::with_capacity(docs.len());
        for doc in docs {
            if failing.contains(&doc.id) {
                items.push(BulkItemStatus::failed(&doc.id, "mapper_parsing_exception"));
                continue;
            }
            match index.docs.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc.clone(),
                None => index.docs.push(doc.clone()),
            }
            items.push(BulkItemStatus::ok(&doc.id));
        }
        Ok(BulkResponse { items })
    }

    async fn knn_search(&self, name: &str, _field: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.knn_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Error::Store("search backend down".to_string()));
        }
        let indexes = self.indexes.lock().unwrap();
        let index = indexes.get(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        let mut hits: Vec<SearchHit> = index
            .docs
            .iter()
            .map(|d| SearchHit {
                id: d.id.clone(),
                title: d.title.clone(),
                description: d.description.clone(),
                category: d.category.clone(),
                price: d.price,
                score: cosine(vector, &d.vector_embedding),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(k);
        Ok(hits)
    }

    async fn build_indexes(&self, _schema: &IndexSchema) -> Result<bool> { Ok(false) }
}

/// Returns `vector` for every text.
pub struct StaticEmbedder {
    pub vector: Vec<f32>,
}

impl Embedder for StaticEmbedder {
    fn dim(&self) -> usize { self.vector.len() }
    fn max_len(&self) -> usize { 512 }
    fn model_id(&self) -> &str { "static" }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }
}

/// Wraps another embedder; texts containing `trigger` either fail or come
/// back one component short.
pub struct FlakyEmbedder<E> {
    pub inner: E,
    pub trigger: &'static str,
    pub short_vector: bool,
}

impl<E: Embedder> Embedder for FlakyEmbedder<E> {
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn model_id(&self) -> &str { "flaky" }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut v = self.inner.embed(text)?;
            if text.contains(self.trigger) {
                if !self.short_vector {
                    anyhow::bail!("model crashed on '{text}'");
                }
                v.pop();
            }
            out.push(v);
        }
        Ok(out)
    }
}

pub struct StubExpander {
    pub reply: std::result::Result<String, ExpansionError>,
    pub calls: AtomicUsize,
}

impl StubExpander {
    pub fn ok(keywords: &str) -> Self { Self { reply: Ok(keywords.to_string()), calls: AtomicUsize::new(0) } }
    pub fn failing() -> Self {
        Self { reply: Err(ExpansionError::Unavailable("timed out".to_string())), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl KeywordExpander for StubExpander {
    async fn expand(&self, _query: &str) -> std::result::Result<String, ExpansionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

pub fn product(id: &str, title: &str) -> ProductRecord {
    ProductRecord {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("{title} description"),
        category: "General".to_string(),
        price: 100.0,
    }
}

pub fn products(n: usize) -> Vec<Result<ProductRecord>> {
    (1..=n).map(|i| Ok(product(&i.to_string(), &format!("item{i}")))).collect()
}
