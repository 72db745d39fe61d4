//! corpus-embed
//!
//! Embedders that run without a model download, L2 normalization, and
//! resolution of an embedder from its model id.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use corpus_core::traits::Embedder;
use tracing::info;
use twox_hash::XxHash64;

pub const HASH_MODEL: &str = "hash";
pub const DEFAULT_HASH_DIM: usize = 384;

/// Scale `v` to unit L2 norm in place. All-zero vectors stay zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Deterministic bag-of-words feature hashing.
///
/// Each lower-cased word, stripped of surrounding punctuation, is hashed with
/// xxHash64 into one of `dim` buckets. Texts sharing words land close together
/// under cosine distance, which is enough to exercise semantic ranking in
/// development and tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { model_id: format!("{HASH_MODEL}-{dim}"), dim }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let words = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty());
        for word in words {
            let mut hasher = XxHash64::with_seed(0);
            word.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dim as u64) as usize;
            let weight = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[bucket] += weight;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Parse `hash` or `hash-<dim>` into a dimension.
fn hash_dim(model_id: &str) -> Result<Option<usize>> {
    if model_id == HASH_MODEL {
        return Ok(Some(DEFAULT_HASH_DIM));
    }
    let Some(dim) = model_id.strip_prefix("hash-") else { return Ok(None) };
    let dim: usize = dim.parse().map_err(|_| anyhow!("invalid hash embedder dimension in '{model_id}'"))?;
    if dim == 0 {
        bail!("hash embedder dimension must be positive");
    }
    Ok(Some(dim))
}

/// Resolve the built-in embedder for `model_id`.
pub fn load_embedder(model_id: &str) -> Result<Arc<dyn Embedder>> {
    match hash_dim(model_id)? {
        Some(dim) => {
            info!(model_id, dim, "using hashing embedder");
            Ok(Arc::new(HashEmbedder::new(dim)))
        }
        None => Err(anyhow!("unknown embedding model '{model_id}'; plug it in through an embedder factory")),
    }
}
