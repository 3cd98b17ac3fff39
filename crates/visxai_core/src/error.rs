//! Error types for visxai_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while decoding, rendering or encoding images.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed base64 payload.
    #[error("Failed to decode image: invalid base64 ({0})")]
    Base64(#[from] base64::DecodeError),

    /// The bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// Encoding a rendered image as PNG failed.
    #[error("Failed to encode PNG: {0}")]
    ImageEncode(#[source] image::ImageError),

    /// The input carried no image data at all.
    #[error("Failed to decode image: {0}")]
    EmptyImage(String),

    /// Invalid array shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Reading values out of a backend tensor failed.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the error was caused by the caller's input rather than by
    /// this process.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Base64(_) | Self::ImageDecode(_) | Self::EmptyImage(_) | Self::InvalidShape { .. }
        )
    }
}
