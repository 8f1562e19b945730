//! Text-to-vector embedding seam.
//!
//! Embedding computation is external to the engine: callers inject anything
//! implementing [`Embedder`]. [`FnEmbedder`] adapts a plain closure, and
//! [`HashingEmbedder`] is a dependency-free deterministic provider used by the
//! CLI and tests.

use crate::error::{EngineError, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Trait for embedding text into vectors.
///
/// Implementations must be dimension-stable: every call returns a vector of
/// the same length. All methods are synchronous — callers in async contexts
/// should use `tokio::task::spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for
    /// batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Adapter that turns a closure into an [`Embedder`].
pub struct FnEmbedder<F> {
    f: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Embedder for FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (self.f)(text)
    }
}

/// Deterministic feature-hashing embedder.
///
/// Hashes whitespace-separated tokens into a fixed number of buckets and
/// L2-normalizes the result. Not a semantic model — similar wording produces
/// similar vectors, nothing more. Real deployments inject their own provider.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(EngineError::Embedding(
                "hashing embedder needs at least one dimension".into(),
            ));
        }
        Ok(Self { dims })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dims: 64 }
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dims];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dims as u64) as usize;
            // Sign bit from a high-order bit so buckets do not only accumulate.
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}
