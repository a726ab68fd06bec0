/// Exact-text memoisation in front of any embedding provider
use super::provider::{EmbeddingError, EmbeddingProvider, Vector};
use ahash::AHashMap;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Entries kept by [`CachedEmbeddingProvider::new`]
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Wraps a provider and remembers successful embeddings by their exact text.
///
/// The cache lives as long as the provider and is never persisted. Once it
/// holds `max_entries` texts, new texts are still embedded but no longer
/// stored. Failed calls are not cached, so a transient provider error can be
/// retried by calling again.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: RwLock<AHashMap<String, Vector>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_max_entries(inner, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(inner: Arc<dyn EmbeddingProvider>, max_entries: usize) -> Self {
        Self {
            inner,
            cache: RwLock::new(AHashMap::new()),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.read().await.len(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
        if let Some(vector) = self.cache.read().await.get(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(vector.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.embed(text).await?;
        let mut cache = self.cache.write().await;
        if cache.len() < self.max_entries {
            cache.insert(text.to_string(), vector.clone());
        }

        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        let mut slots: Vec<Option<Vector>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        {
            let cache = self.cache.read().await;
            for text in texts {
                let hit = cache.get(text.as_str()).cloned();
                if hit.is_none() {
                    missing.push(text.clone());
                }
                slots.push(hit);
            }
        }

        let hits = (texts.len() - missing.len()) as u64;
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);
        debug!(hits, misses = missing.len(), "embedding cache lookup");

        if !missing.is_empty() {
            let fresh = self.inner.embed_batch(&missing).await?;
            if fresh.len() != missing.len() {
                return Err(EmbeddingError::provider(
                    self.inner.model_name(),
                    format!(
                        "Embedding count mismatch: expected {}, got {}",
                        missing.len(),
                        fresh.len()
                    ),
                ));
            }

            let mut cache = self.cache.write().await;
            let mut fresh = fresh.into_iter();
            for (slot, text) in slots.iter_mut().zip(texts) {
                if slot.is_none() {
                    let vector = fresh.next();
                    if let Some(vector) = &vector {
                        if cache.len() < self.max_entries {
                            cache.insert(text.clone(), vector.clone());
                        }
                    }
                    *slot = vector;
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    EmbeddingError::provider(self.inner.model_name(), "missing embedding in batch")
                })
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
