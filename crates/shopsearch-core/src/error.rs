use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Input source not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Vector store unreachable after {attempts} attempts")]
    StoreUnreachable { attempts: u32 },

    #[error("Dimension mismatch on index '{index}': expected {expected}, got {actual}")]
    DimensionMismatch { index: String, expected: usize, actual: usize },

    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Errors scoped to a single input record. Everything else ends a run.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Error::InvalidRecord { .. } | Error::Embedding(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a keyword-expansion call produced nothing usable. Callers fall back to
/// the raw query; this never escapes the expander boundary as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("expansion service unavailable: {0}")]
    Unavailable(String),

    #[error("malformed expansion response: {0}")]
    Malformed(String),
}
