//! Text generation collaborators
//!
//! The retrieval core hands a rendered prompt to a [`TextGenerator`] and gets
//! text back. Answer quality is the generator's business, not ours.

mod gemini;

pub use gemini::{GeminiGenerator, GeminiGeneratorConfig};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    #[error("Generator returned no text")]
    EmptyResponse,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GenerationError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Trait for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a completion for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}
