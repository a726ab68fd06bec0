//! Gemini text generation over the `generateContent` endpoint.

use super::{GenerationError, TextGenerator};
use crate::embedding::{GeminiEmbeddingConfig, GEMINI_BASE_URL};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const PROVIDER: &str = "gemini";

/// Settings for [`GeminiGenerator`]
#[derive(Debug, Clone)]
pub struct GeminiGeneratorConfig {
    pub api_key: String,
    /// Model name without the `models/` prefix, e.g. `gemini-2.0-pro`
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
}

impl GeminiGeneratorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.0-pro".to_string(),
            temperature: 0.1,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Reuse the key and endpoint of an embedding configuration
    pub fn from_embedding(embedding: &GeminiEmbeddingConfig, model: impl Into<String>) -> Self {
        Self {
            api_key: embedding.api_key.clone(),
            model: model.into(),
            temperature: 0.1,
            base_url: embedding.base_url.clone(),
        }
    }
}

/// A [`TextGenerator`] backed by Gemini
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeminiGeneratorConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiGeneratorConfig) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::InvalidInput(
                "Gemini API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated
    pub(crate) fn into_text(self) -> Result<String, GenerationError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidInput("Empty prompt".to_string()));
        }

        debug!(provider = PROVIDER, prompt_len = prompt.len(), model = %self.config.model, "generating");

        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                GenerationError::provider(PROVIDER, format!("request failed: {e}"))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            GenerationError::provider(PROVIDER, format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            error!(provider = PROVIDER, %status, "API error");
            return Err(GenerationError::provider(
                PROVIDER,
                format!("API returned {status}: {detail}"),
            ));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            GenerationError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;
        parsed.into_text()
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_from_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [
                {"content": {"role": "model", "parts": [{"text": "Delivery "}, {"text": "is slow."}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "Delivery is slow.");
    }

    #[test]
    fn test_no_candidates_is_empty_response() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(matches!(
            response.into_text(),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(GeminiGenerator::new(GeminiGeneratorConfig::new("")).is_err());
    }
}
