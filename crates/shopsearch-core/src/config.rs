//! Typed configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_INDEXER__BATCH_SIZE=200`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::AnnConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub ann: AnnConfig,
    pub indexer: IndexerConfig,
    pub search: SearchConfig,
    pub expansion: ExpansionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// LanceDB URI; a local directory for embedded use.
    pub uri: String,
    pub index_name: String,
    pub readiness: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "data/lancedb".to_string(),
            index_name: "ecommerce_products".to_string(),
            readiness: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_dir: String,
    /// Smaller model loaded when `model_dir` fails. Its dimension may differ,
    /// so an index built with one model cannot be searched with the other.
    pub fallback_model_dir: Option<String>,
    pub max_len: usize,
    /// Use the hashing embedder instead of loading model weights.
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: "models/paraphrase-multilingual-mpnet-base-v2".to_string(),
            fallback_model_dir: None,
            max_len: 256,
            use_fake: false,
            fake_dim: 768,
        }
    }
}

/// What the batch indexer does when a single record or bulk item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Abort the run on the first failure.
    Strict,
    /// Skip the record, count it, keep going.
    #[default]
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub input_path: String,
    pub batch_size: usize,
    pub failure_mode: FailureMode,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { input_path: "products.csv".to_string(), batch_size: 500, failure_mode: FailureMode::BestEffort }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub k: usize,
    /// Cosine similarity floor; hits strictly below it are dropped.
    pub min_score: f32,
    pub nprobes: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { k: 10, min_score: 0.3, nprobes: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl ExpansionConfig {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::from_figment(Self::figment(&env_name))
    }

    pub fn figment(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.store.index_name.trim().is_empty() { return invalid("store.index_name must not be empty"); }
        if self.store.readiness.max_attempts == 0 { return invalid("store.readiness.max_attempts must be at least 1"); }
        if self.indexer.batch_size == 0 { return invalid("indexer.batch_size must be at least 1"); }
        if self.search.k == 0 { return invalid("search.k must be at least 1"); }
        if !self.search.min_score.is_finite() { return invalid("search.min_score must be a finite number"); }
        if self.expansion.enabled && self.expansion.timeout_ms == 0 { return invalid("expansion.timeout_ms must be positive"); }
        if self.embedding.max_len == 0 { return invalid("embedding.max_len must be at least 1"); }
        if self.embedding.use_fake && self.embedding.fake_dim == 0 { return invalid("embedding.fake_dim must be at least 1"); }
        if self.ann.num_edges == 0 || self.ann.ef_construction == 0 || self.ann.num_partitions == 0 {
            return invalid("ann.num_edges, ann.ef_construction and ann.num_partitions must be positive");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
