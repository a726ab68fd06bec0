//! Gemini embedding provider over the Generative Language REST API.

use super::provider::{check_dimension, validate_text, EmbeddingError, EmbeddingProvider, Vector};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const PROVIDER: &str = "gemini";

/// Public endpoint of the Generative Language API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Most requests `batchEmbedContents` accepts in one call
pub const MAX_BATCH_REQUESTS: usize = 100;

/// Settings for [`GeminiEmbeddingProvider`]
///
/// The API key is passed in explicitly; resolving it from the environment is
/// the caller's job (see `Config::resolve_api_key`).
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingConfig {
    pub api_key: String,
    /// Model name without the `models/` prefix, e.g. `text-embedding-004`
    pub model: String,
    /// Gemini task type, e.g. `SEMANTIC_SIMILARITY` or `RETRIEVAL_DOCUMENT`
    pub task_type: String,
    /// Expected output dimension (768 for text-embedding-004)
    pub dimension: usize,
    /// Longest input accepted before a request is attempted
    pub max_text_chars: usize,
    pub base_url: String,
}

impl GeminiEmbeddingConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "text-embedding-004".to_string(),
            task_type: "SEMANTIC_SIMILARITY".to_string(),
            dimension: 768,
            max_text_chars: 8000,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// An [`EmbeddingProvider`] backed by the Gemini `embedContent` endpoint.
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    config: GeminiEmbeddingConfig,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: GeminiEmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::InitializationError(
                "Gemini API key must not be empty".to_string(),
            ));
        }
        if config.dimension == 0 {
            return Err(EmbeddingError::InitializationError(
                "Embedding dimension must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            method
        )
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: format!("models/{}", self.config.model),
            content: Content {
                parts: vec![Part { text }],
            },
            task_type: &self.config.task_type,
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, EmbeddingError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                EmbeddingError::provider(PROVIDER, format!("request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            EmbeddingError::provider(PROVIDER, format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(EmbeddingError::provider(
                PROVIDER,
                format!("API returned {status}: {detail}"),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            EmbeddingError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

/// Single-text response: either an `embedding` or an `error`
#[derive(Debug, Deserialize)]
pub(crate) struct EmbedContentResponse {
    #[serde(default)]
    embedding: Option<ContentEmbedding>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl EmbedContentResponse {
    /// Validate the response at the adapter boundary
    pub(crate) fn into_vector(self, dimension: usize) -> Result<Vector, EmbeddingError> {
        if let Some(err) = self.error {
            return Err(EmbeddingError::provider(
                PROVIDER,
                format!(
                    "{} ({})",
                    err.message,
                    err.status
                        .or_else(|| err.code.map(|c| c.to_string()))
                        .unwrap_or_else(|| "unknown".to_string())
                ),
            ));
        }

        let values = self
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| EmbeddingError::provider(PROVIDER, "response has no embedding"))?;

        if values.is_empty() {
            return Err(EmbeddingError::provider(PROVIDER, "response embedding is empty"));
        }
        check_dimension(dimension, &values)?;

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
        validate_text(text, self.config.max_text_chars)?;

        debug!(provider = PROVIDER, text_len = text.len(), model = %self.config.model, "embedding single text");

        let response: EmbedContentResponse =
            self.post("embedContent", &self.request(text)).await?;
        response.into_vector(self.config.dimension)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            validate_text(text, self.config.max_text_chars)?;
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_REQUESTS) {
            debug!(provider = PROVIDER, batch_size = chunk.len(), model = %self.config.model, "embedding batch");

            let body = BatchEmbedContentsRequest {
                requests: chunk.iter().map(|t| self.request(t)).collect(),
            };
            let response: BatchEmbedContentsResponse =
                self.post("batchEmbedContents", &body).await?;

            if response.embeddings.len() != chunk.len() {
                return Err(EmbeddingError::provider(
                    PROVIDER,
                    format!(
                        "Embedding count mismatch: expected {}, got {}",
                        chunk.len(),
                        response.embeddings.len()
                    ),
                ));
            }

            for embedding in response.embeddings {
                check_dimension(self.config.dimension, &embedding.values)?;
                vectors.push(embedding.values);
            }
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_embedding() {
        let response: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, 0.2, 0.3]}}"#).unwrap();
        assert_eq!(response.into_vector(3).unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_response_with_error() {
        let response: EmbedContentResponse = serde_json::from_str(
            r#"{"error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
        )
        .unwrap();
        let err = response.into_vector(3).unwrap_err();
        assert!(err.to_string().contains("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn test_response_without_embedding() {
        let response: EmbedContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            response.into_vector(3),
            Err(EmbeddingError::ProviderError { .. })
        ));
    }

    #[test]
    fn test_response_wrong_dimension() {
        let response: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, 0.2]}}"#).unwrap();
        assert!(matches!(
            response.into_vector(3),
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = GeminiEmbeddingProvider::new(GeminiEmbeddingConfig::new(""));
        assert!(matches!(result, Err(EmbeddingError::InitializationError(_))));
    }

    #[test]
    fn test_endpoint_format() {
        let mut config = GeminiEmbeddingConfig::new("key");
        config.base_url = "http://localhost:1234/".to_string();
        let provider = GeminiEmbeddingProvider::new(config).unwrap();
        assert_eq!(
            provider.endpoint("embedContent"),
            "http://localhost:1234/v1beta/models/text-embedding-004:embedContent"
        );
    }
}
