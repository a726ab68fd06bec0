//! Configuration management for ragline
//!
//! Loads the TOML config file, applies profile and environment overrides, and
//! validates the result. API keys never live in the file: each section names
//! the environment variable that holds its key.

use crate::error::{RaglineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;
mod wiring;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "gemini", "fastembed" or "hashing"
    pub provider: String,
    pub model: String,
    /// Environment variable holding the API key (gemini only)
    pub api_key_env: String,
    /// Gemini task type
    pub task_type: String,
    /// Expected vector length; ignored by fastembed, which knows its models
    pub dimension: usize,
    pub batch_size: usize,
    pub max_concurrent: usize,
    pub max_text_chars: usize,
    /// Memoise embeddings by exact text
    pub cache: bool,
    pub base_url: String,
}

/// Text generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    /// First line of every prompt
    pub instruction: String,
    pub base_url: String,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Joins retrieved documents into the context
    pub separator: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Snapshot file written by `ragline index`
    pub index_path: PathBuf,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_inner(path, None)
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        Self::load_inner(path, Some(profile))
    }

    fn load_inner(path: &Path, profile: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(RaglineError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RaglineError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }

        // Environment wins over file and profile
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RaglineError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RaglineError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(enabled) = overrides.generation_enabled {
            self.generation.enabled = enabled;
        }
        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RAGLINE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("RAGLINE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__PROVIDER" => {
                self.embedding.provider = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BASE_URL" => {
                self.embedding.base_url = value.to_string();
            }
            "GENERATION__ENABLED" => {
                self.generation.enabled =
                    value.parse().map_err(|_| RaglineError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            "GENERATION__MODEL" => {
                self.generation.model = value.to_string();
            }
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k =
                    value.parse().map_err(|_| RaglineError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as a positive integer", value),
                    })?;
            }
            "STORAGE__INDEX_PATH" => {
                self.storage.index_path = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Read an API key from the environment variable `env_name`
    pub fn resolve_api_key(env_name: &str) -> Result<String> {
        match std::env::var(env_name) {
            Ok(key) if !key.is_empty() => Ok(key),
            Ok(_) => Err(RaglineError::Config(format!(
                "Environment variable {} is empty",
                env_name
            ))),
            Err(_) => Err(RaglineError::Config(format!(
                "Environment variable {} is not set",
                env_name
            ))),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RaglineError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("ragline").join("config.toml"))
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RaglineError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RaglineError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            embedding: EmbeddingConfig {
                provider: "gemini".to_string(),
                model: "text-embedding-004".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                task_type: "SEMANTIC_SIMILARITY".to_string(),
                dimension: 768,
                batch_size: 32,
                max_concurrent: 4,
                max_text_chars: 8000,
                cache: true,
                base_url: crate::embedding::GEMINI_BASE_URL.to_string(),
            },
            generation: GenerationConfig {
                enabled: false,
                provider: "gemini".to_string(),
                model: "gemini-2.0-pro".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                temperature: 0.1,
                instruction: crate::retrieval::DEFAULT_INSTRUCTION.to_string(),
                base_url: crate::embedding::GEMINI_BASE_URL.to_string(),
            },
            retrieval: RetrievalConfig {
                top_k: 2,
                separator: "\n".to_string(),
            },
            storage: StorageConfig {
                index_path: PathBuf::from("~/.ragline/index.snap"),
            },
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_k = 5;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.top_k, 5);
        assert_eq!(loaded.embedding.model, "text-embedding-004");
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(&temp.path().join("nope.toml"));
        assert!(matches!(result, Err(RaglineError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_profile_overrides() {
        let mut config = Config::default();
        config.profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                embedding_provider: Some("hashing".to_string()),
                embedding_model: None,
                generation_enabled: Some(false),
                top_k: Some(4),
            },
        );

        config.apply_profile("offline").unwrap();
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert_eq!(config.retrieval.top_k, 4);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config.set_value_from_env("RETRIEVAL__TOP_K", "7").unwrap();
        assert_eq!(config.retrieval.top_k, 7);

        assert!(config
            .set_value_from_env("GENERATION__ENABLED", "maybe")
            .is_err());
        assert!(config.set_value_from_env("UNKNOWN__KEY", "x").is_ok());
    }

    #[test]
    fn test_expand_path() {
        let plain = expand_path(Path::new("/tmp/index.snap")).unwrap();
        assert_eq!(plain, PathBuf::from("/tmp/index.snap"));

        if let Some(home) = dirs::home_dir() {
            let expanded = expand_path(Path::new("~/x/index.snap")).unwrap();
            assert_eq!(expanded, home.join("x/index.snap"));
        }
    }
}
