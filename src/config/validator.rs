use crate::config::Config;
use crate::embedding::{FastEmbedProvider, GEMINI_MAX_BATCH_REQUESTS};
use crate::error::{RaglineError, Result, ValidationError};

const EMBEDDING_PROVIDERS: [&str; 3] = ["gemini", "fastembed", "hashing"];
const GENERATION_PROVIDERS: [&str; 1] = ["gemini"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_generation(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_storage(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RaglineError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        let provider = embedding.provider.as_str();
        if !EMBEDDING_PROVIDERS.contains(&provider) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    EMBEDDING_PROVIDERS, provider
                ),
            ));
        }

        if provider != "hashing" && embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if provider == "fastembed" && FastEmbedProvider::dimension_for(&embedding.model).is_none()
        {
            errors.push(ValidationError::new(
                "embedding.model",
                format!("Unsupported fastembed model: {}", embedding.model),
            ));
        }

        if provider != "fastembed" && embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        if embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if embedding.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "embedding.max_concurrent",
                "Concurrency limit must be greater than 0",
            ));
        }

        if embedding.max_text_chars == 0 {
            errors.push(ValidationError::new(
                "embedding.max_text_chars",
                "Text length limit must be greater than 0",
            ));
        }

        if provider == "gemini" {
            if embedding.api_key_env.is_empty() {
                errors.push(ValidationError::new(
                    "embedding.api_key_env",
                    "API key variable name cannot be empty",
                ));
            }
            if embedding.batch_size > GEMINI_MAX_BATCH_REQUESTS {
                errors.push(ValidationError::new(
                    "embedding.batch_size",
                    format!(
                        "Gemini accepts at most {} texts per batch, got {}",
                        GEMINI_MAX_BATCH_REQUESTS, embedding.batch_size
                    ),
                ));
            }
            if embedding.base_url.is_empty() {
                errors.push(ValidationError::new(
                    "embedding.base_url",
                    "Base URL cannot be empty",
                ));
            }
        }
    }

    fn validate_generation(config: &Config, errors: &mut Vec<ValidationError>) {
        let generation = &config.generation;

        // Only an enabled generator needs its key at startup
        if generation.enabled {
            let env_var = &generation.api_key_env;
            match std::env::var(env_var) {
                Ok(key) if key.is_empty() => errors.push(ValidationError::new(
                    "generation.api_key_env",
                    format!("Environment variable {} is empty", env_var),
                )),
                Ok(_) => {}
                Err(_) => errors.push(ValidationError::new(
                    "generation.api_key_env",
                    format!("Environment variable {} is not set", env_var),
                )),
            }
        }

        let temp = generation.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "generation.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = generation.provider.as_str();
        if !GENERATION_PROVIDERS.contains(&provider) {
            errors.push(ValidationError::new(
                "generation.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    GENERATION_PROVIDERS, provider
                ),
            ));
        }

        if generation.model.is_empty() {
            errors.push(ValidationError::new(
                "generation.model",
                "Model name cannot be empty",
            ));
        }

        if generation.instruction.trim().is_empty() {
            errors.push(ValidationError::new(
                "generation.instruction",
                "Instruction cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is not checked: the snapshot is created by `ragline index`
        if config.storage.index_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.index_path",
                "Index path cannot be empty",
            ));
        }
    }
}
