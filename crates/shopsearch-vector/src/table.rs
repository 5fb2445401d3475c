//! LanceDB connection and table lifecycle helpers.

use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use tracing::{debug, info};

use shopsearch_core::error::{Error, Result};
use shopsearch_core::types::IndexSchema;

use crate::schema::{build_arrow_schema, vector_dimension};
use crate::store_err;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(store_err)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(store_err)?;
    Ok(names.iter().any(|n| n == name))
}

/// Creates an empty table whose vector column has the schema's dimension.
/// Fails if the table already exists.
pub async fn create_table(conn: &Connection, schema: &IndexSchema) -> Result<()> {
    if table_exists(conn, &schema.name).await? {
        return Err(Error::Store(format!("index '{}' already exists", schema.name)));
    }
    let arrow_schema = build_arrow_schema(schema.vector.dimension)?;
    let iter = RecordBatchIterator::new(vec![].into_iter(), arrow_schema.clone());
    conn.create_table(&schema.name, Box::new(iter)).execute().await.map_err(store_err)?;
    info!(index = %schema.name, dimension = schema.vector.dimension, "created index");
    Ok(())
}

pub async fn drop_table(conn: &Connection, name: &str, ignore_missing: bool) -> Result<()> {
    if !table_exists(conn, name).await? {
        if ignore_missing {
            debug!(index = name, "index absent, nothing to delete");
            return Ok(());
        }
        return Err(Error::NotFound(format!("index '{name}'")));
    }
    conn.drop_table(name, &[]).await.map_err(store_err)?;
    info!(index = name, "deleted index");
    Ok(())
}

pub async fn table_dimension(conn: &Connection, name: &str) -> Result<Option<usize>> {
    if !table_exists(conn, name).await? {
        return Ok(None);
    }
    let table = conn.open_table(name).execute().await.map_err(store_err)?;
    let schema = table.schema().await.map_err(store_err)?;
    vector_dimension(&schema)
        .map(Some)
        .ok_or_else(|| Error::Store(format!("index '{name}' has no vector column")))
}

pub async fn row_count(conn: &Connection, name: &str) -> Result<usize> {
    if !table_exists(conn, name).await? {
        return Err(Error::NotFound(format!("index '{name}'")));
    }
    let table = conn.open_table(name).execute().await.map_err(store_err)?;
    table.count_rows(None).await.map_err(store_err)
}
