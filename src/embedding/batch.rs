/// Concurrent, order-preserving embedding of a corpus
use super::{EmbeddingError, EmbeddingProvider, Vector};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Result of embedding a corpus
#[derive(Debug)]
pub struct BatchResult {
    /// One vector per input text, in input order
    pub vectors: Vec<Vector>,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Splits texts into batches and embeds up to `max_concurrent` batches at once.
///
/// Batches may finish in any order; vectors are reassembled by batch position,
/// so `vectors[i]` always belongs to `texts[i]`. The first failure aborts the
/// remaining batches and is returned as-is; nothing is retried here.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrent: usize,
}

impl BatchEmbedder {
    /// Create a new batch embedder
    ///
    /// # Arguments
    /// * `provider` - Embedding provider
    /// * `batch_size` - Number of texts sent to the provider per call
    /// * `max_concurrent` - Maximum batches in flight
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        max_concurrent: usize,
    ) -> Result<Self, EmbeddingError> {
        if batch_size == 0 || max_concurrent == 0 {
            return Err(EmbeddingError::InvalidInput(
                "batch_size and max_concurrent must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            provider,
            batch_size,
            max_concurrent,
        })
    }

    /// Embed every text, keeping input order
    pub async fn embed_all(&self, texts: &[String]) -> Result<BatchResult, EmbeddingError> {
        let start = std::time::Instant::now();
        let batch_count = texts.len().div_ceil(self.batch_size);

        info!(
            "Embedding {} texts in {} batches (max {} concurrent)",
            texts.len(),
            batch_count,
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (position, chunk) in texts.chunks(self.batch_size).enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let chunk = chunk.to_vec();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    EmbeddingError::provider(provider.model_name(), format!("semaphore closed: {e}"))
                })?;
                let vectors = provider.embed_batch(&chunk).await?;
                if vectors.len() != chunk.len() {
                    return Err(EmbeddingError::provider(
                        provider.model_name(),
                        format!(
                            "Embedding count mismatch: expected {}, got {}",
                            chunk.len(),
                            vectors.len()
                        ),
                    ));
                }
                Ok((position, vectors))
            });
        }

        let mut slots: Vec<Option<Vec<Vector>>> = vec![None; batch_count];
        while let Some(joined) = tasks.join_next().await {
            let (position, vectors) = joined.map_err(|e| {
                EmbeddingError::provider(
                    self.provider.model_name(),
                    format!("embedding task failed: {e}"),
                )
            })??;
            debug!("Embedded batch {} ({} vectors)", position, vectors.len());
            slots[position] = Some(vectors);
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for (position, slot) in slots.into_iter().enumerate() {
            let batch = slot.ok_or_else(|| {
                EmbeddingError::provider(
                    self.provider.model_name(),
                    format!("batch {} produced no result", position),
                )
            })?;
            vectors.extend(batch);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Embedding complete: {} vectors, {}ms",
            vectors.len(),
            duration_ms
        );

        Ok(BatchResult {
            vectors,
            batches: batch_count,
            duration_ms,
        })
    }
}
