//! Error types for visxai_models.

use thiserror::Error;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while building networks or loading their weights and labels.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Architecture name not known.
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    /// Invalid network configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Saving or loading a weight record failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Class label file could not be parsed.
    #[error("Label file error: {0}")]
    Labels(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
