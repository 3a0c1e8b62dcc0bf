//! geoseek-embed
//!
//! Embedding providers for dataset records and queries: a local BGE-M3 model
//! on candle, a deterministic hashing embedder for tests and offline runs,
//! and an Ollama HTTP client.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use geoseek_core::config::{EmbeddingBackend, EmbeddingSettings};
use geoseek_core::traits::{Embedder, EmbeddingProvider};

pub mod device;
pub mod ollama;
pub mod pool;
pub mod provider;
pub mod tokenize;

pub use device::select_device;
pub use ollama::OllamaProvider;
pub use pool::masked_mean_l2;
pub use provider::BlockingProvider;

const BGE_M3_DIM: usize = 1024;
const BGE_M3_MAX_LEN: usize = 256;

/// BGE-M3 (XLM-RoBERTa) sentence embedder with masked mean pooling.
pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BgeM3Embedder {
    pub fn new(model_dir: Option<&str>) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(model_dir)?;
        info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, BGE_M3_MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, BGE_M3_MAX_LEN), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != BGE_M3_DIM {
            return Err(anyhow!("BGE-M3 produced {} dims, expected {}", emb.len(), BGE_M3_DIM));
        }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 { warn!(elapsed_ms = elapsed as u64, "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for BgeM3Embedder {
    fn dim(&self) -> usize { BGE_M3_DIM }
    fn max_len(&self) -> usize { BGE_M3_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// Deterministic bag-of-tokens hashing embedder.
///
/// Same text, same vector; texts sharing words land close together. Output is
/// L2-normalised.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
        if norm > 1e-6 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fake_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// In-process embedder for batch work (ingest), honouring
/// `APP_USE_FAKE_EMBEDDINGS=1`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if fake_forced() || settings.backend == EmbeddingBackend::Fake {
        debug!(dim = settings.dim, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(settings.dim)));
    }
    Ok(Box::new(BgeM3Embedder::new(settings.model_dir.as_deref())?))
}

/// Query-time embedding capability selected by configuration.
pub fn build_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    if fake_forced() {
        return Ok(Arc::new(BlockingProvider::new(FakeEmbedder::new(settings.dim), "fake")));
    }
    let provider: Arc<dyn EmbeddingProvider> = match settings.backend {
        EmbeddingBackend::Fake => Arc::new(BlockingProvider::new(FakeEmbedder::new(settings.dim), "fake")),
        EmbeddingBackend::Local => Arc::new(BlockingProvider::new(BgeM3Embedder::new(settings.model_dir.as_deref())?, "local:bge-m3")),
        EmbeddingBackend::Ollama => Arc::new(OllamaProvider::new(&settings.base_url, &settings.model, settings.dim)?),
    };
    Ok(provider)
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = geoseek_core::config::expand_path(dir);
        if p.exists() { return Ok(p); }
        warn!(dir = %p.display(), "configured model_dir does not exist");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { return Ok(p); }
        }
    }
    for candidate in ["../models/bge-m3", "models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() { return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
