//! Error types for visxai_api.

use std::error::Error as StdError;

use thiserror::Error;
use visxai_core::CoreError;
use visxai_explain::ExplainError;
use visxai_models::ModelError;

use crate::capability::Capability;

/// Result type alias using [`ApiError`].
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced to API clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No handler registered under this name.
    #[error("Model '{0}' not found.")]
    UnknownModel(String),

    /// Action name not recognized.
    #[error("Action '{0}' not supported.")]
    UnknownAction(String),

    /// The action cannot be requested with GET.
    #[error("GET not supported for action '{0}'.")]
    MethodNotAllowed(String),

    /// The handler lacks the capability for the action.
    #[error("{capability} not supported for model '{model}'.")]
    Unsupported {
        /// Model name.
        model: String,
        /// Requested capability.
        capability: Capability,
    },

    /// The model has no network whose weights could be saved.
    #[error("Model '{0}' has no weights to save.")]
    NoWeights(String),

    /// Malformed request field.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image decoding or rendering failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Analysis failed.
    #[error(transparent)]
    Explain(#[from] ExplainError),

    /// Network construction or loading failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Response serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Unsupported capability for `model`.
    pub fn unsupported(model: &str, capability: Capability) -> Self {
        Self::Unsupported {
            model: model.to_string(),
            capability,
        }
    }

    /// HTTP-equivalent status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::UnknownModel(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::UnknownAction(_)
            | Self::Unsupported { .. }
            | Self::NoWeights(_)
            | Self::BadRequest(_) => 400,
            Self::Core(e) if e.is_input_error() => 400,
            Self::Explain(e) if e.is_input_error() => 400,
            Self::Core(_)
            | Self::Explain(_)
            | Self::Model(_)
            | Self::Json(_)
            | Self::Config(_) => 500,
        }
    }

    /// Whether the error is the client's fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }

    /// The error followed by its chain of sources, one per line.
    #[must_use]
    pub fn trace(&self) -> String {
        let mut trace = format!("{self:?}");
        let mut source = self.source();
        while let Some(cause) = source {
            trace.push_str("\ncaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::UnknownModel("x".into()).status(), 404);
        assert_eq!(ApiError::UnknownAction("x".into()).status(), 400);
        assert_eq!(ApiError::MethodNotAllowed("predict".into()).status(), 405);
        assert_eq!(ApiError::unsupported("patchflow", Capability::Predict).status(), 400);
        assert_eq!(ApiError::BadRequest("x".into()).status(), 400);
        assert_eq!(ApiError::Model(ModelError::Checkpoint("x".into())).status(), 500);
    }

    #[test]
    fn test_input_errors_are_client_errors() {
        let decode = ApiError::from(CoreError::EmptyImage("no data".into()));
        assert_eq!(decode.status(), 400);

        let layer = ApiError::from(ExplainError::LayerOutOfRange {
            index: 20,
            available: 13,
        });
        assert!(layer.is_client_error());

        let encode = image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ));
        assert_eq!(ApiError::from(CoreError::ImageEncode(encode)).status(), 500);

        let capture = ApiError::from(ExplainError::CaptureFailed("conv_1".into()));
        assert_eq!(capture.status(), 500);
    }

    #[test]
    fn test_trace_includes_message() {
        let error = ApiError::from(ExplainError::CaptureFailed("no gradient".into()));
        assert!(error.trace().contains("no gradient"));
    }
}
