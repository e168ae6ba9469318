//! Embedding generation
//!
//! An abstraction over embedding backends plus a caching service layer:
//! - `Embedder` trait for pluggable backends
//! - HTTP embedding backend
//! - `EmbeddingService` with an LRU cache keyed by content hash

mod http_backend;

pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use lru::LruCache;
use md5::{Digest, Md5};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

/// Trait for embedding providers.
///
/// Backends must be deterministic for a given (model, text) pair so that
/// hash-keyed caching is sound.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let embedder = HttpEmbedder::new(config)?;
    Ok(Box::new(embedder))
}

/// Caching layer over an embedding backend.
///
/// Cache keys are the MD5 of the input text, so re-embedding unchanged
/// chunks or repeated queries never hits the backend.
pub struct EmbeddingService {
    backend: Box<dyn Embedder>,
    batch_size: usize,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingService {
    pub fn new(backend: Box<dyn Embedder>, batch_size: usize, cache_size: usize) -> Self {
        let capacity =
            NonZeroUsize::new(cache_size).unwrap_or_else(|| NonZeroUsize::new(1024).unwrap());
        Self {
            backend,
            batch_size: batch_size.max(1),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let backend = create_embedder(config)?;
        Ok(Self::new(backend, config.batch_size, config.cache_size))
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    fn cache_key(text: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn cache_get(&self, key: &str) -> Option<Vec<f32>> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn cache_put(&self, key: String, vector: Vec<f32>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, vector);
        }
    }

    /// Embed a single text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("backend returned no embedding".to_string()))
    }

    /// Embed a batch of texts, serving cache hits without a backend call
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = texts.iter().map(|t| Self::cache_key(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = keys.iter().map(|k| self.cache_get(k)).collect();

        let misses: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();

        if !misses.is_empty() {
            debug!(
                total = texts.len(),
                misses = misses.len(),
                "Embedding cache lookup"
            );
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let mut fresh = Vec::with_capacity(miss_texts.len());
            for batch in miss_texts.chunks(self.batch_size) {
                let embeddings = self.backend.embed(batch.to_vec()).await?;
                if embeddings.len() != batch.len() {
                    return Err(Error::Embedding(format!(
                        "backend returned {} embeddings for {} inputs",
                        embeddings.len(),
                        batch.len()
                    )));
                }
                fresh.extend(embeddings);
            }

            for (&i, vector) in misses.iter().zip(fresh.into_iter()) {
                self.cache_put(keys[i].clone(), vector.clone());
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}
