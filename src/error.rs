//! Error types for Klipp.

use thiserror::Error;

/// Library-level error type for Klipp operations.
#[derive(Error, Debug)]
pub enum KlippError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Preview error: {0}")]
    Preview(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for Klipp operations.
pub type Result<T> = std::result::Result<T, KlippError>;
