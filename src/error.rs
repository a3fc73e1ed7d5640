//! Error types for the prompter gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the prompter gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio transcode error (ffmpeg unavailable or failing)
    #[error("transcode error: {0}")]
    Transcode(String),

    /// Speech recognition error (ASR backend not loaded or erroring)
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Knowledge base / corpus error
    #[error("corpus error: {0}")]
    Corpus(String),

    /// Embedding cache error
    #[error("cache error: {0}")]
    Cache(String),

    /// Session registry error
    #[error("session error: {0}")]
    Session(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV parsing error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
