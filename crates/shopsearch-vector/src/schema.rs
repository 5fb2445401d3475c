use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

use shopsearch_core::error::{Error, Result};
use shopsearch_core::types::VECTOR_FIELD;

/// Physical product table: the scalar fields plus a fixed-size vector column
/// whose length binds the index dimension.
pub fn build_arrow_schema(dim: usize) -> Result<SchemaRef> {
    let list_len = i32::try_from(dim)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| Error::InvalidConfig(format!("invalid vector dimension {dim}")))?;
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, false),
        Field::new("category", DataType::Utf8, false),
        Field::new("price", DataType::Float64, false),
        Field::new(
            VECTOR_FIELD,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), list_len),
            true,
        ),
    ])))
}

/// Length of the vector column, if the schema has one.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
    let field = schema.field_with_name(VECTOR_FIELD).ok()?;
    match field.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}
