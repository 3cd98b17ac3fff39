//! Response payloads.

use serde::Serialize;
use serde_json::{json, Value};
use visxai_explain::FeatureMaps;

use crate::error::ApiError;

/// A class label with its softmax score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Probability {
    /// Class label.
    pub label: String,
    /// Softmax probability.
    pub score: f32,
}

/// `predict` result.
#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    /// Label of the most probable class.
    pub top_class: String,
    /// Class probabilities.
    pub probabilities: Vec<Probability>,
    /// Rendered activations of every captured layer.
    pub feature_maps: FeatureMaps,
}

/// `features` result without an input: the layer catalog.
#[derive(Debug, Clone, Serialize)]
pub struct LayerCatalog {
    /// Model name.
    pub model: String,
    /// Layer names in presentation order.
    pub layers: Vec<String>,
}

/// `features` result for an input.
#[derive(Debug, Clone, Serialize)]
pub struct FeaturesResponse {
    /// Model name.
    pub model: String,
    /// Rendered activations.
    pub feature_maps: FeatureMaps,
}

/// `kernels` result.
#[derive(Debug, Clone, Serialize)]
pub struct KernelsResponse {
    /// Model name.
    pub model: String,
    /// First input channel of each rendered filter, per convolution.
    pub kernels: FeatureMaps,
}

/// `gradcam` result.
#[derive(Debug, Clone, Serialize)]
pub struct GradCamResponse {
    /// Heatmap as a PNG data URI.
    pub heatmap: String,
    /// Explained class.
    pub class_idx: usize,
    /// Label of the explained class.
    pub class_label: String,
    /// Target layer.
    pub layer_name: String,
    /// Target layer index.
    pub layer_index: usize,
    /// Every selectable layer.
    pub available_layers: Vec<String>,
    /// Normalized map, row-major.
    pub heatmap_data: Vec<Vec<f32>>,
}

/// `adversarial` result.
#[derive(Debug, Clone, Serialize)]
pub struct AdversarialResponse {
    /// Label predicted for the clean image.
    pub original_class: String,
    /// Label predicted for the perturbed image.
    pub adversarial_class: String,
    /// Probability of the adversarial prediction.
    pub confidence: f32,
    /// Epsilon used.
    pub epsilon: f32,
    /// Perturbed image as a PNG data URI.
    pub adversarial_image: String,
    /// Largest per-pixel change applied.
    pub max_perturbation: f32,
}

/// `train` result.
#[derive(Debug, Clone, Serialize)]
pub struct TrainResponse {
    /// Always `"success"`.
    pub status: String,
    /// Loss before the step.
    pub loss: f32,
    /// Human-readable summary.
    pub message: String,
}

/// Transport-agnostic response: an HTTP-equivalent status and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl ApiResponse {
    /// 200 response.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Error response; the trace is attached only when `debug` is set.
    pub fn from_error(error: &ApiError, debug: bool) -> Self {
        let mut body = json!({ "error": error.to_string() });
        if debug {
            body["traceback"] = Value::String(error.trace());
        }
        Self {
            status: error.status(),
            body,
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `error` message of an error body.
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_without_debug() {
        let response = ApiResponse::from_error(&ApiError::UnknownModel("alexnet".into()), false);
        assert_eq!(response.status, 404);
        assert_eq!(response.error_message(), Some("Model 'alexnet' not found."));
        assert!(response.body.get("traceback").is_none());
    }

    #[test]
    fn test_error_body_with_debug() {
        let response = ApiResponse::from_error(&ApiError::BadRequest("no image".into()), true);
        assert_eq!(response.status, 400);
        assert!(response.body["traceback"].as_str().unwrap().contains("no image"));
    }

    #[test]
    fn test_train_response_shape() {
        let body = serde_json::to_value(TrainResponse {
            status: "success".into(),
            loss: 2.3,
            message: "done".into(),
        })
        .unwrap();
        assert_eq!(body["status"], "success");
        assert!(body["loss"].is_number());
    }
}
