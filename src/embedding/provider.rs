//! Embedding provider trait and shared error type
use async_trait::async_trait;
use thiserror::Error;

/// A fixed-length embedding produced by a provider
pub type Vector = Vec<f32>;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    /// Backend failure: network, auth, rate limit, malformed response
    #[error("Provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Trait for embedding providers
///
/// Every call against one provider configuration yields vectors of the same
/// length, reported by [`EmbeddingProvider::dimension`]. Failures are returned,
/// never papered over with an empty vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError>;

    /// Generate embeddings for multiple texts, one vector per input in input order
    ///
    /// The default implementation calls [`EmbeddingProvider::embed`] sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Reject empty text and text longer than `max_chars` before any backend call
pub(crate) fn validate_text(text: &str, max_chars: usize) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
    }

    let chars = text.chars().count();
    if chars > max_chars {
        return Err(EmbeddingError::InvalidInput(format!(
            "Text is {} characters, provider accepts at most {}",
            chars, max_chars
        )));
    }

    Ok(())
}

/// Verify a vector has the dimension the provider advertises
pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthProvider;

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
            if text == "fail" {
                return Err(EmbeddingError::provider("length", "forced failure"));
            }
            Ok(vec![text.len() as f32, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    #[tokio::test]
    async fn test_default_batch_preserves_order() {
        let texts = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];
        let vectors = LengthProvider.embed_batch(&texts).await.unwrap();

        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_default_batch_stops_on_failure() {
        let texts = vec!["ok".to_string(), "fail".to_string()];
        let result = LengthProvider.embed_batch(&texts).await;

        assert!(matches!(result, Err(EmbeddingError::ProviderError { .. })));
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("hello", 10).is_ok());
        assert!(matches!(
            validate_text("   ", 10),
            Err(EmbeddingError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_text("this is too long", 4),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(3, &[0.0, 1.0, 2.0]).is_ok());
        assert!(matches!(
            check_dimension(3, &[0.0]),
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }
}
