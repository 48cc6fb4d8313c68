
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::Result;
use crate::chunking::ChunkingConfig;

pub const CONFIG_FILE_NAME: &str = "fsagent.toml";

/// Environment variable that overrides the configured LLM provider.
pub const PROVIDER_ENV: &str = "DEFAULT_LLM_PROVIDER";

/// Environment variable that overrides the default OpenRouter model.
pub const OPENROUTER_MODEL_ENV: &str = "OPENROUTER_MODEL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider selector: "openai" or "openrouter"
    pub provider: String,
    /// Model identifier; falls back to the provider's default when unset
    pub model: Option<String>,
    /// Default model when routing through OpenRouter
    pub openrouter_model: String,
    /// Maximum model/tool round trips per query
    pub max_turns: usize,
}

impl Default for LlmConfig {
    #[inline]
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            openrouter_model: "anthropic/claude-3-sonnet".to_string(),
            max_turns: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: u32,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// First directory scanned for indexable files
    pub documents_dir: PathBuf,
    /// Second directory scanned for indexable files
    pub files_dir: PathBuf,
    /// Directory holding the persisted vector index and metadata sidecar
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    #[inline]
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data/documents"),
            files_dir: PathBuf::from("data/files"),
            index_dir: PathBuf::from("data/vector_db"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid chunk size: {0} (must be at least 1 character)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({1}) must be smaller than chunk size ({0})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid embedding model name (cannot be empty)")]
    InvalidEmbeddingModel,
    #[error("Unknown LLM provider: {0} (expected \"openai\" or \"openrouter\")")]
    UnknownProvider(String),
    #[error("Invalid turn budget: {0} (must be at least 1)")]
    InvalidTurnBudget(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from the first config file found, falling back to
    /// defaults when none exists. Environment overrides are applied either
    /// way, and the result is validated.
    #[inline]
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::load_from(&path)
            }
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    #[inline]
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config: Self = toml::from_str(&content).map_err(ConfigError::TomlParse)?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let content = toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)?;
        fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// Look for `fsagent.toml` in the working directory, then under the
    /// platform config directory.
    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("fsagent").join("config.toml"))
            .filter(|path| path.exists())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(provider) = env::var(PROVIDER_ENV) {
            if !provider.trim().is_empty() {
                self.llm.provider = provider;
            }
        }
        if let Ok(model) = env::var(OPENROUTER_MODEL_ENV) {
            if !model.trim().is_empty() {
                self.llm.openrouter_model = model;
            }
        }
    }

    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.chunk_size,
                self.chunking.chunk_overlap,
            ));
        }

        if self.embedding.batch_size == 0 || self.embedding.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embedding.batch_size));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidEmbeddingModel);
        }

        if self.llm.provider != "openai" && self.llm.provider != "openrouter" {
            return Err(ConfigError::UnknownProvider(self.llm.provider.clone()));
        }
        if self.llm.max_turns == 0 {
            return Err(ConfigError::InvalidTurnBudget(self.llm.max_turns));
        }

        Ok(())
    }
}
