//! Process wiring shared by the shopsearch binaries.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use shopsearch_core::config::{expand_path, Config};
use shopsearch_core::traits::{Embedder, KeywordExpander, VectorStore};
use shopsearch_embed::embedder_from_config;
use shopsearch_pipeline::{ImportRun, OllamaExpander, SchemaManager, SearchEngine};
use shopsearch_vector::LanceStore;

pub mod server;

/// Services built once at startup and shared by every component.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub expander: Option<Arc<dyn KeywordExpander>>,
}

impl AppContext {
    pub async fn from_config(config: Config) -> Result<Self> {
        let uri = expand_path(&config.store.uri).to_string_lossy().to_string();
        let store = LanceStore::connect(&uri)
            .await?
            .with_metric(config.ann.metric)
            .with_nprobes(config.search.nprobes);
        let embedder = embedder_from_config(&config.embedding)?;
        let expander: Option<Arc<dyn KeywordExpander>> = if config.expansion.enabled {
            Some(Arc::new(OllamaExpander::new(&config.expansion)?))
        } else {
            None
        };
        info!(
            uri = %uri,
            index = %config.store.index_name,
            model = embedder.model_id(),
            dim = embedder.dim(),
            expansion = config.expansion.enabled,
            "application context ready"
        );
        Ok(Self { config, store: Arc::new(store), embedder, expander })
    }

    pub fn search_engine(&self) -> SearchEngine {
        let engine = SearchEngine::new(self.store.clone(), self.embedder.clone(), &self.config.store.index_name);
        match &self.expander {
            Some(expander) => engine.with_expander(expander.clone()),
            None => engine,
        }
    }

    pub fn import_run(&self) -> ImportRun {
        ImportRun::new(self.store.clone(), self.embedder.clone(), &self.config)
    }

    pub fn schema_manager(&self) -> SchemaManager {
        SchemaManager::new(self.store.clone())
    }
}
