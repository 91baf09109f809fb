//! Custom error types for clipmind

use thiserror::Error;

/// Main error type for clipmind operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Media decode error: {0}")]
    Decode(String),

    #[error("Store integrity error: {0}")]
    StoreIntegrity(String),

    #[error("Video already ingested: {0}")]
    DuplicateVideo(String),

    #[error("Provider does not support {0}")]
    Unsupported(&'static str),

    #[error("Transient provider error: {0}")]
    ProviderTransient(String),

    #[error("Provider error: {0}")]
    ProviderFatal(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient errors are retried with backoff before degrading to a warning.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ProviderTransient(_))
    }

    /// Only decode and store-integrity failures abort a whole ingestion run.
    pub fn is_fatal_to_ingest(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::StoreIntegrity(_) | Error::Database(_)
        )
    }
}

/// Result type alias for clipmind
pub type Result<T> = std::result::Result<T, Error>;
