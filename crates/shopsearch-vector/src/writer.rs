//! Bulk upsert of product documents via `merge_insert` keyed on `id`.

use arrow_array::{FixedSizeListArray, Float64Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_array::types::Float32Type;
use lancedb::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use shopsearch_core::error::{Error, Result};
use shopsearch_core::types::{BulkItemStatus, BulkResponse, IndexedDocument};

use crate::schema::build_arrow_schema;
use crate::store_err;
use crate::table::table_dimension;

/// Fails with `DimensionMismatch` on the first vector whose length differs from `dim`.
pub fn check_dimensions(index: &str, dim: usize, docs: &[IndexedDocument]) -> Result<()> {
    match docs.iter().find(|d| d.vector_embedding.len() != dim) {
        Some(doc) => Err(Error::DimensionMismatch {
            index: index.to_string(),
            expected: dim,
            actual: doc.vector_embedding.len(),
        }),
        None => Ok(()),
    }
}

/// Per-document check applied before the write. Rejected documents get a
/// failed status and are left out of the batch.
fn item_error(doc: &IndexedDocument) -> Option<String> {
    if doc.id.trim().is_empty() {
        return Some("empty id".to_string());
    }
    if doc.vector_embedding.iter().any(|x| !x.is_finite()) {
        return Some("vector contains non-finite values".to_string());
    }
    if !doc.price.is_finite() || doc.price < 0.0 {
        return Some(format!("invalid price {}", doc.price));
    }
    None
}

/// Collapses repeated ids to their last occurrence, keeping first-seen order.
pub fn dedupe_last_wins<'a>(docs: &[&'a IndexedDocument]) -> Vec<&'a IndexedDocument> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<&IndexedDocument> = Vec::with_capacity(docs.len());
    for &doc in docs {
        match slot.get(doc.id.as_str()) {
            Some(&i) => out[i] = doc,
            None => {
                slot.insert(doc.id.as_str(), out.len());
                out.push(doc);
            }
        }
    }
    out
}

pub fn docs_to_record_batch(docs: &[&IndexedDocument], dim: usize) -> Result<RecordBatch> {
    let schema = build_arrow_schema(dim)?;
    let list_len = dim as i32;
    let vectors = docs
        .iter()
        .map(|d| Some(d.vector_embedding.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.id.as_str()))),
            Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.title.as_str()))),
            Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.description.as_str()))),
            Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.category.as_str()))),
            Arc::new(Float64Array::from_iter_values(docs.iter().map(|d| d.price))),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, list_len)),
        ],
    )
    .map_err(store_err)?;
    Ok(batch)
}

pub async fn upsert_documents(conn: &Connection, name: &str, docs: &[IndexedDocument]) -> Result<BulkResponse> {
    if docs.is_empty() {
        return Ok(BulkResponse::default());
    }
    let dim = table_dimension(conn, name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("index '{name}'")))?;
    check_dimensions(name, dim, docs)?;

    let mut items = Vec::with_capacity(docs.len());
    let mut accepted = Vec::with_capacity(docs.len());
    for doc in docs {
        match item_error(doc) {
            Some(reason) => {
                warn!(index = name, id = %doc.id, %reason, "document rejected");
                items.push(BulkItemStatus::failed(&doc.id, reason));
            }
            None => {
                items.push(BulkItemStatus::ok(&doc.id));
                accepted.push(doc);
            }
        }
    }
    let unique = dedupe_last_wins(&accepted);
    if unique.is_empty() {
        return Ok(BulkResponse { items });
    }

    let batch = docs_to_record_batch(&unique, dim)?;
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    let table = conn.open_table(name).execute().await.map_err(store_err)?;
    let mut mi = table.merge_insert(&["id"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await.map_err(store_err)?;
    debug!(index = name, written = unique.len(), submitted = docs.len(), "bulk upsert committed");
    Ok(BulkResponse { items })
}
