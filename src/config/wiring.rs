//! Turns a validated [`Config`] into live pipeline components

use super::Config;
use crate::embedding::{
    CachedEmbeddingProvider, EmbeddingProvider, FastEmbedProvider, GeminiEmbeddingConfig,
    GeminiEmbeddingProvider, HashingProvider,
};
use crate::error::{RaglineError, Result};
use crate::generation::{GeminiGenerator, GeminiGeneratorConfig, TextGenerator};
use crate::retrieval::{PipelineOptions, PromptTemplate};
use std::sync::Arc;
use tracing::debug;

impl Config {
    /// Construct the configured embedding provider, wrapped in a cache when enabled
    pub fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let embedding = &self.embedding;

        let provider: Arc<dyn EmbeddingProvider> = match embedding.provider.as_str() {
            "gemini" => {
                let api_key = Config::resolve_api_key(&embedding.api_key_env)?;
                Arc::new(GeminiEmbeddingProvider::new(GeminiEmbeddingConfig {
                    api_key,
                    model: embedding.model.clone(),
                    task_type: embedding.task_type.clone(),
                    dimension: embedding.dimension,
                    max_text_chars: embedding.max_text_chars,
                    base_url: embedding.base_url.clone(),
                })?)
            }
            "fastembed" => Arc::new(FastEmbedProvider::new(&embedding.model)?),
            "hashing" => Arc::new(HashingProvider::new(embedding.dimension)?),
            other => {
                return Err(RaglineError::InvalidConfigValue {
                    path: "embedding.provider".to_string(),
                    message: format!("Unknown embedding provider '{}'", other),
                })
            }
        };

        debug!(
            provider = %embedding.provider,
            model = provider.model_name(),
            dimension = provider.dimension(),
            cache = embedding.cache,
            "Embedding provider ready"
        );

        if embedding.cache {
            Ok(Arc::new(CachedEmbeddingProvider::new(provider)))
        } else {
            Ok(provider)
        }
    }

    /// Construct the configured text generator
    ///
    /// Fails when generation is disabled, so `ask` never silently degrades.
    pub fn text_generator(&self) -> Result<Box<dyn TextGenerator>> {
        let generation = &self.generation;

        if !generation.enabled {
            return Err(RaglineError::Config(
                "Generation is disabled; set generation.enabled = true".to_string(),
            ));
        }

        match generation.provider.as_str() {
            "gemini" => {
                let api_key = Config::resolve_api_key(&generation.api_key_env)?;
                Ok(Box::new(GeminiGenerator::new(GeminiGeneratorConfig {
                    api_key,
                    model: generation.model.clone(),
                    temperature: generation.temperature,
                    base_url: generation.base_url.clone(),
                })?))
            }
            other => Err(RaglineError::InvalidConfigValue {
                path: "generation.provider".to_string(),
                message: format!("Unknown generation provider '{}'", other),
            }),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            batch_size: self.embedding.batch_size,
            max_concurrent: self.embedding.max_concurrent,
            separator: self.retrieval.separator.clone(),
        }
    }

    pub fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate::new(self.generation.instruction.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_provider_from_config() {
        let mut config = Config::default();
        config.embedding.provider = "hashing".to_string();
        config.embedding.dimension = 64;
        config.embedding.cache = false;

        let provider = config.embedding_provider().unwrap();
        assert_eq!(provider.dimension(), 64);
        assert_eq!(provider.model_name(), "blake3-hashing-64");
    }

    #[test]
    fn test_gemini_requires_key() {
        let mut config = Config::default();
        config.embedding.api_key_env = "RAGLINE_TEST_EMBED_KEY_NEVER_SET".to_string();
        assert!(matches!(
            config.embedding_provider(),
            Err(RaglineError::Config(_))
        ));
    }

    #[test]
    fn test_disabled_generation() {
        let config = Config::default();
        assert!(matches!(
            config.text_generator(),
            Err(RaglineError::Config(_))
        ));
    }

    #[test]
    fn test_pipeline_options_and_prompt() {
        let mut config = Config::default();
        config.embedding.batch_size = 8;
        config.retrieval.separator = "\n---\n".to_string();
        config.generation.instruction = "Answer tersely.".to_string();

        let options = config.pipeline_options();
        assert_eq!(options.batch_size, 8);
        assert_eq!(options.separator, "\n---\n");
        assert_eq!(config.prompt_template().instruction(), "Answer tersely.");
    }
}
