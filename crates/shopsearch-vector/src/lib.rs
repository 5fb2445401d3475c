//! LanceDB-backed [`VectorStore`](shopsearch_core::traits::VectorStore).
//!
//! One table per index. The table is created empty with the vector dimension
//! bound in its Arrow schema; writes go through `merge_insert` keyed on `id`;
//! kNN reads use the configured distance type.

use lancedb::DistanceType;
use shopsearch_core::error::Error;
use shopsearch_core::types::Similarity;

pub mod index_build;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod writer;

pub use store::LanceStore;

pub(crate) fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

pub(crate) fn distance_type(metric: Similarity) -> DistanceType {
    match metric {
        Similarity::Cosine => DistanceType::Cosine,
        Similarity::L2 => DistanceType::L2,
        Similarity::Dot => DistanceType::Dot,
    }
}
