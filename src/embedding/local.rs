/// FastEmbed provider for local embedding generation
use super::provider::{check_dimension, validate_text, EmbeddingError, EmbeddingProvider, Vector};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

const PROVIDER: &str = "fastembed";

/// Local ONNX models have a 512-token window; this keeps inputs well inside it
const MAX_TEXT_CHARS: usize = 2048;

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// Inference is CPU-bound, so each call runs on the blocking thread pool.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to `~/.cache/huggingface/`
    /// on first use.
    /// - all-MiniLM-L6-v2: 90MB (384 dims) - recommended for most use cases
    /// - bge-small-en-v1.5: 130MB (384 dims) - better accuracy
    /// - bge-base-en-v1.5: 440MB (768 dims) - highest accuracy
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension, model_size_mb) = Self::resolve(model_name)?;

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            model_name,
            dimension,
            model_size_mb
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }

    /// Map a model name onto the FastEmbed enum, its dimension and download size
    fn resolve(model_name: &str) -> Result<(EmbeddingModel, usize, usize), EmbeddingError> {
        match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384, 90)),
            "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384, 130)),
            "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768, 440)),
            _ => Err(EmbeddingError::InitializationError(format!(
                "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                model_name
            ))),
        }
    }

    /// Dimension a supported model produces, without loading it
    pub fn dimension_for(model_name: &str) -> Option<usize> {
        Self::resolve(model_name).ok().map(|(_, dim, _)| dim)
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vector>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        let embeddings = tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| EmbeddingError::provider(PROVIDER, format!("inference task failed: {e}")))?
            .map_err(|e| EmbeddingError::provider(PROVIDER, e.to_string()))?;

        for embedding in &embeddings {
            check_dimension(self.dimension, embedding)?;
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
        validate_text(text, MAX_TEXT_CHARS)?;

        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::provider(PROVIDER, "No embeddings generated"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Positions must line up with inputs, so empty texts fail the batch
        // instead of being filtered out.
        for text in texts {
            validate_text(text, MAX_TEXT_CHARS)?;
        }

        let embeddings = self.run(texts.to_vec()).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::provider(
                PROVIDER,
                format!(
                    "Embedding count mismatch: expected {}, got {}",
                    texts.len(),
                    embeddings.len()
                ),
            ));
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_lookup() {
        assert_eq!(FastEmbedProvider::dimension_for("all-MiniLM-L6-v2"), Some(384));
        assert_eq!(FastEmbedProvider::dimension_for("bge-base-en-v1.5"), Some(768));
        assert_eq!(FastEmbedProvider::dimension_for("word2vec"), None);
    }

    #[test]
    fn test_unsupported_model() {
        let result = FastEmbedProvider::new("word2vec");
        assert!(matches!(result, Err(EmbeddingError::InitializationError(_))));
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider
            .embed("This is a test sentence for embedding.")
            .await
            .unwrap();
        assert_eq!(embedding.len(), 384);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.1);
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn test_batch_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec![
            "First test sentence.".to_string(),
            "Second test sentence.".to_string(),
            "Third test sentence.".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert!(embeddings.iter().all(|e| e.len() == 384));
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn test_batch_rejects_empty_member() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec!["First".to_string(), String::new()];
        let result = provider.embed_batch(&texts).await;
        assert!(matches!(result, Err(EmbeddingError::InvalidInput(_))));
    }
}
