//! Indexing and retrieval pipeline: schema lifecycle, batch indexing, query
//! expansion and kNN search over any [`VectorStore`](shopsearch_core::traits::VectorStore).

pub mod api;
pub mod expander;
pub mod indexer;
pub mod schema_manager;
pub mod search;

pub use expander::{expand_or_fallback, Expansion, OllamaExpander};
pub use indexer::{BatchIndexer, ImportRun, IndexAbort, IndexReport, RunPhase};
pub use schema_manager::SchemaManager;
pub use search::{SearchEngine, SearchOutcome};
