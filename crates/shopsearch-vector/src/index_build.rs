//! Post-load index builds: the HNSW graph on the vector column, full-text
//! indexes on text fields and BTree indexes on keyword fields.
//!
//! ANN training needs data, so this runs after the final flush and only once
//! the table holds `ann.min_rows` rows; smaller tables are searched flat.

use lancedb::index::scalar::{BTreeIndexBuilder, FtsIndexBuilder};
use lancedb::index::vector::IvfHnswSqIndexBuilder;
use lancedb::index::Index;
use lancedb::Connection;
use tracing::{info, warn};

use shopsearch_core::error::Result;
use shopsearch_core::types::IndexSchema;

use crate::distance_type;
use crate::store_err;

/// IVF partitions to train: at most one per row, at least one.
fn partition_count(configured: u32, rows: usize) -> u32 {
    configured.min(u32::try_from(rows).unwrap_or(u32::MAX)).max(1)
}

pub async fn build_indexes(conn: &Connection, schema: &IndexSchema) -> Result<bool> {
    let table = conn.open_table(&schema.name).execute().await.map_err(store_err)?;
    let rows = table.count_rows(None).await.map_err(store_err)?;
    let ann = &schema.vector.ann;

    let mut ann_built = false;
    if rows >= ann.min_rows && rows > 0 {
        let partitions = partition_count(ann.num_partitions, rows);
        table
            .create_index(
                &[schema.vector.name.as_str()],
                Index::IvfHnswSq(
                    IvfHnswSqIndexBuilder::default()
                        .distance_type(distance_type(ann.metric))
                        .num_partitions(partitions)
                        .num_edges(ann.num_edges)
                        .ef_construction(ann.ef_construction),
                ),
            )
            .replace(true)
            .execute()
            .await
            .map_err(store_err)?;
        info!(index = %schema.name, rows, m = ann.num_edges, ef_construction = ann.ef_construction, "built HNSW index");
        ann_built = true;
    } else {
        info!(index = %schema.name, rows, min_rows = ann.min_rows, "too few rows for an ANN index, using flat search");
    }

    if rows == 0 {
        return Ok(ann_built);
    }
    for field in &schema.text_fields {
        let built = table
            .create_index(&[field.as_str()], Index::FTS(FtsIndexBuilder::default()))
            .replace(true)
            .execute()
            .await;
        if let Err(e) = built {
            warn!(index = %schema.name, field = %field, error = %e, "full-text index build failed");
        }
    }
    for field in &schema.keyword_fields {
        let built = table
            .create_index(&[field.as_str()], Index::BTree(BTreeIndexBuilder::default()))
            .replace(true)
            .execute()
            .await;
        if let Err(e) = built {
            warn!(index = %schema.name, field = %field, error = %e, "keyword index build failed");
        }
    }
    Ok(ann_built)
}
