//! Error types for visxai_explain.

use thiserror::Error;
use visxai_core::CoreError;
use visxai_models::ModelError;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised by capture, feature assembly, Grad-CAM and adversarial passes.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Image decoding or rendering failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Network construction or loading failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Grad-CAM layer index outside the architecture's selectable layers.
    #[error("Layer index {index} out of range: {available} layers available")]
    LayerOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of selectable layers.
        available: usize,
    },

    /// Class index outside the network's output range.
    #[error("Class index {index} out of range: model has {n_classes} classes")]
    ClassOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of classes.
        n_classes: usize,
    },

    /// An expected activation or gradient was not captured.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Invalid numeric parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The architecture does not support this analysis.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ExplainError {
    /// Whether the error was caused by the caller's input rather than the
    /// system.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_input_error(),
            Self::LayerOutOfRange { .. }
            | Self::ClassOutOfRange { .. }
            | Self::InvalidParameter(_) => true,
            Self::Model(_) | Self::CaptureFailed(_) | Self::Unsupported(_) => false,
        }
    }
}
