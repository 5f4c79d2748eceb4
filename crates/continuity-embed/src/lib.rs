//! Embedding backends for the continuity index.
//!
//! [`SentenceEmbedder`] runs a sentence-transformer BERT encoder (for example
//! `all-MiniLM-L6-v2`, 384 dimensions) on candle with masked mean pooling.
//! [`HashEmbedder`] is a deterministic feature-hashing stand-in used by tests
//! and by `APP_USE_FAKE_EMBEDDINGS=1`.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use continuity_core::config::{expand_path, EmbeddingSettings};
use continuity_core::traits::Embedder;

pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    batch_size: usize,
    pad_id: u32,
}

impl SentenceEmbedder {
    pub fn load(model_dir: &Path, settings: &EmbeddingSettings) -> Result<Self> {
        let device = device::select_device();
        info!(dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;
        if dim != settings.dimension {
            bail!("model at {} produces {}-dim vectors, configured dimension is {}", model_dir.display(), dim, settings.dimension);
        }

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        info!(dim, "sentence encoder ready");

        Ok(Self {
            model,
            tokenizer,
            device,
            dim,
            max_len: settings.max_len,
            batch_size: settings.batch_size.max(1),
            pad_id,
        })
    }

    fn embed_micro_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) =
            tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

impl Embedder for SentenceEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = i, size = batch.len(), "embedding micro-batch");
            out.extend(self.embed_micro_batch(batch)?);
        }
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        return Ok(candle_core::pickle::read_all(&pickle)?.into_iter().collect());
    }
    bail!("no model.safetensors or pytorch_model.bin under {}", model_dir.display())
}

/// Deterministic feature-hashing embedder, L2 normalised.
///
/// Each word (lowercased, surrounding punctuation stripped) adds a signed unit
/// weight to one hashed slot; each adjacent word pair adds half a unit to
/// another. Words past `max_len` are ignored, the way the sentence encoder
/// truncates long chunks.
pub struct HashEmbedder {
    dim: usize,
    max_len: usize,
}

const HASH_SEED: u64 = 0x636f_6e74;
const DEFAULT_HASH_MAX_WORDS: usize = 256;

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self::with_max_len(dim, DEFAULT_HASH_MAX_WORDS)
    }

    pub fn with_max_len(dim: usize, max_len: usize) -> Self {
        Self { dim, max_len }
    }

    fn slot(&self, feature: &str) -> (usize, f32) {
        use std::hash::Hasher;
        use twox_hash::XxHash64;

        let mut hasher = XxHash64::with_seed(HASH_SEED);
        hasher.write(feature.as_bytes());
        let h = hasher.finish();
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        ((h % self.dim as u64) as usize, sign)
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .take(self.max_len())
            .collect();

        let mut v = vec![0f32; self.dim];
        for word in &words {
            let (idx, sign) = self.slot(word);
            v[idx] += sign;
        }
        for pair in words.windows(2) {
            let (idx, sign) = self.slot(&format!("{} {}", pair[0], pair[1]));
            v[idx] += 0.5 * sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Pick the embedding backend: the hashing embedder when
/// `APP_USE_FAKE_EMBEDDINGS` is set, otherwise the sentence encoder.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        info!(dim = settings.dimension, "using hashing embedder");
        return Ok(Box::new(HashEmbedder::new(settings.dimension)));
    }
    let dir = resolve_model_dir(settings)?;
    Ok(Box::new(SentenceEmbedder::load(&dir, settings)?))
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() {
                info!(var, dir = %p.display(), "model directory from environment");
                return Ok(p);
            }
        }
    }
    let configured = expand_path(&settings.model_dir);
    if configured.exists() {
        return Ok(configured);
    }
    Err(anyhow!("Could not locate sentence encoder directory (tried APP_MODEL_DIR, MODEL_DIR, {})", configured.display()))
}
