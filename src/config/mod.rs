//! Configuration management for clipmind
//!
//! Configuration is resolved once per invocation with the precedence
//! environment > config file > defaults, and the resulting value is
//! threaded explicitly through every component call. Core logic never
//! reads ambient state.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Capability provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Dense caption cascade configuration
    #[serde(default)]
    pub cascade: CascadeConfig,

    /// Chunking configuration for embedding windows
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Capability provider configuration (any OpenAI-compatible endpoint).
/// An empty model string means the provider lacks that capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_transcribe_model")]
    pub transcribe_model: String,

    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bounded retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum in-flight provider calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Batch size for embedding calls
    #[serde(default = "default_embedding_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            transcribe_model: default_transcribe_model(),
            vision_model: default_vision_model(),
            embed_model: default_embed_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            concurrency: default_concurrency(),
            embed_batch_size: default_embedding_batch_size(),
        }
    }
}

/// Ingestion defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Frame sampling rate for whole-video sampling
    #[serde(default = "default_fps_sample")]
    pub fps_sample: f64,

    /// Hard cap on sampled frames per video
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Emit an advisory warning for videos longer than this
    #[serde(default = "default_long_video_warn_minutes")]
    pub long_video_warn_minutes: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fps_sample: default_fps_sample(),
            max_frames: default_max_frames(),
            long_video_warn_minutes: default_long_video_warn_minutes(),
        }
    }
}

/// Cascade layer-0 windowing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Fixed duration of each layer-0 window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Frames sampled per window
    #[serde(default = "default_frames_per_window")]
    pub frames_per_window: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            frames_per_window: default_frames_per_window(),
        }
    }
}

/// Chunking configuration for embedding windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum words per embedding window
    #[serde(default = "default_chunk_max_words")]
    pub max_words: usize,

    /// Overlap words between consecutive windows
    #[serde(default = "default_chunk_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_words: default_chunk_max_words(),
            overlap_words: default_chunk_overlap_words(),
        }
    }
}

/// Search and question-answering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of search results
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Default number of retrieved candidates for ask
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            top_k: default_top_k(),
        }
    }
}

/// Resolved filesystem paths
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub db_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            db_file: default_db_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            ingest: IngestConfig::default(),
            cascade: CascadeConfig::default(),
            chunk: ChunkConfig::default(),
            search: SearchConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, overlaid by the TOML file if it
    /// exists, overlaid by `CLIPMIND_*` environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_file);

        let mut config = if config_file.exists() {
            debug!("Loading config from {:?}", config_file);
            let raw = std::fs::read_to_string(&config_file)?;
            toml::from_str(&raw)?
        } else {
            Config::default()
        };

        config.paths.config_file = config_file;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to its TOML file
    pub fn save(&self) -> Result<PathBuf> {
        let path = &self.paths.config_file;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(path.clone())
    }

    fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 6] = [
            ("CLIPMIND_BASE_URL", &mut self.provider.base_url),
            ("CLIPMIND_API_KEY", &mut self.provider.api_key),
            (
                "CLIPMIND_TRANSCRIBE_MODEL",
                &mut self.provider.transcribe_model,
            ),
            ("CLIPMIND_VISION_MODEL", &mut self.provider.vision_model),
            ("CLIPMIND_EMBED_MODEL", &mut self.provider.embed_model),
            ("CLIPMIND_CHAT_MODEL", &mut self.provider.chat_model),
        ];
        for (name, slot) in overrides {
            if let Ok(value) = std::env::var(name) {
                *slot = value;
            }
        }
        if let Ok(db) = std::env::var("CLIPMIND_DB") {
            self.paths.db_file = PathBuf::from(db);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.provider.base_url.is_empty() {
            return Err(Error::Config("provider.base_url must not be empty".into()));
        }
        if self.chunk.overlap_words >= self.chunk.max_words {
            return Err(Error::Config(
                "chunk.overlap_words must be smaller than chunk.max_words".into(),
            ));
        }
        if self.cascade.window_secs <= 0.0 {
            return Err(Error::Config("cascade.window_secs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn toml_roundtrip() {
        let config = Config::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.provider.base_url, config.provider.base_url);
        assert_eq!(parsed.chunk.max_words, config.chunk.max_words);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [provider]
            chat_model = "my-model"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.provider.chat_model, "my-model");
        assert_eq!(parsed.provider.base_url, default_base_url());
        assert_eq!(parsed.search.default_limit, default_search_limit());
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let mut config = Config::default();
        config.chunk.max_words = 10;
        config.chunk.overlap_words = 10;
        assert!(config.validate().is_err());
    }
}
