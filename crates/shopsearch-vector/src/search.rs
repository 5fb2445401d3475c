use arrow_array::{Array, Float32Array, Float64Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use tracing::debug;

use shopsearch_core::error::{Error, Result};
use shopsearch_core::types::{SearchHit, Similarity};

use crate::distance_type;
use crate::store_err;

/// Distance column LanceDB appends to vector query results.
const DISTANCE_COLUMN: &str = "_distance";

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Store(format!("result column '{name}' missing or of unexpected type")))
}

pub fn hits_from_batch(batch: &RecordBatch, metric: Similarity) -> Result<Vec<SearchHit>> {
    let ids = column::<StringArray>(batch, "id")?;
    let titles = column::<StringArray>(batch, "title")?;
    let descriptions = column::<StringArray>(batch, "description")?;
    let categories = column::<StringArray>(batch, "category")?;
    let prices = column::<Float64Array>(batch, "price")?;
    let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;
    Ok((0..batch.num_rows())
        .map(|i| SearchHit {
            id: ids.value(i).to_string(),
            title: titles.value(i).to_string(),
            description: descriptions.value(i).to_string(),
            category: categories.value(i).to_string(),
            price: prices.value(i),
            score: metric.score_from_distance(distances.value(i)),
        })
        .collect())
}

pub async fn knn(
    conn: &Connection,
    name: &str,
    field: &str,
    vector: &[f32],
    k: usize,
    metric: Similarity,
    nprobes: usize,
) -> Result<Vec<SearchHit>> {
    if k == 0 {
        return Ok(Vec::new());
    }
    let table = conn.open_table(name).execute().await.map_err(store_err)?;
    let mut stream = table
        .vector_search(vector.to_vec())
        .map_err(store_err)?
        .column(field)
        .distance_type(distance_type(metric))
        .nprobes(nprobes)
        .limit(k)
        .execute()
        .await
        .map_err(store_err)?;
    let mut hits = Vec::with_capacity(k);
    while let Some(batch) = stream.try_next().await.map_err(store_err)? {
        hits.extend(hits_from_batch(&batch, metric)?);
    }
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    debug!(index = name, k, returned = hits.len(), "knn search");
    Ok(hits)
}
