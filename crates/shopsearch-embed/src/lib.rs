//! shopsearch-embed
//!
//! Sentence embeddings for product text. `SentenceEmbedder` runs an
//! XLM-RoBERTa checkpoint (default `paraphrase-multilingual-mpnet-base-v2`)
//! through candle with masked mean pooling; `FakeEmbedder` is a deterministic
//! hashing stand-in for development and tests.

use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{Device, DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use shopsearch_core::config::{expand_path, EmbeddingConfig};
use shopsearch_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

pub struct SentenceEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl SentenceEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        info!(model_dir = %model_dir.display(), "loading sentence embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        let name = model_dir.file_name().map_or_else(|| "model".to_string(), |n| n.to_string_lossy().to_string());
        let id = format!("xlm-roberta:{name}:d{dim}");
        info!(%id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len, id })
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while mapped.
        return Ok(unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? });
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if !pickle.exists() {
        bail!("No model.safetensors or pytorch_model.bin in {}", model_dir.display());
    }
    let weights = candle_core::pickle::read_all(&pickle)?;
    let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}

impl Embedder for SentenceEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn model_id(&self) -> &str { &self.id }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            bail!("model produced {} dims, expected {}", v.len(), self.dim);
        }
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 500 { warn!(batch = texts.len(), ?elapsed, "slow embedding batch"); }
        else { debug!(batch = texts.len(), ?elapsed, "embedded batch"); }
        Ok(vectors)
    }
}

/// Bag-of-tokens hashing embedder: same text, same vector; shared tokens
/// raise cosine similarity. Tokens are lower-cased and stripped of punctuation.
pub struct FakeEmbedder { dim: usize, id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("fake:xxhash64:d{dim}") } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty());
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn model_id(&self) -> &str { &self.id }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Builds the embedder named by the configuration. The model is loaded once
/// here and shared by every component that receives the returned handle.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.use_fake {
        if config.fake_dim == 0 {
            bail!("embedding.fake_dim must be at least 1");
        }
        info!(dim = config.fake_dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(config.fake_dim)));
    }
    let primary = resolve_model_dir(&config.model_dir).and_then(|dir| SentenceEmbedder::load(&dir, config.max_len));
    match (primary, config.fallback_model_dir.as_deref()) {
        (Ok(model), _) => Ok(Arc::new(model)),
        (Err(e), None) => Err(e),
        (Err(e), Some(fallback)) => {
            warn!(error = %format!("{e:#}"), fallback, "primary embedding model failed to load, trying fallback");
            let dir = expand_path(fallback);
            let model = SentenceEmbedder::load(&dir, config.max_len)
                .with_context(|| format!("fallback model '{}' (primary failed: {e:#})", dir.display()))?;
            Ok(Arc::new(model))
        }
    }
}

fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() { debug!(path = %p.display(), "using MODEL_DIR"); return Ok(p); }
    }
    let p = expand_path(configured);
    if p.exists() { return Ok(p); }
    Err(anyhow!("Could not locate embedding model directory '{}'", p.display()))
}
