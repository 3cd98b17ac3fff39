//! Model handlers.
//!
//! A handler owns one network and serves the actions in its capability set.
//! Every action method has a default that reports the action as unsupported;
//! the dispatcher checks [`ModelHandler::capabilities`] before calling.

mod digits;
mod imagenet;
mod placeholder;

pub use digits::{DigitHandler, DIGIT_DISPLAY_SIZE, DIGIT_PIXELS};
pub use imagenet::{ImageNetHandler, KERNEL_CAP};
pub use placeholder::{PlaceholderHandler, PLACEHOLDER_MODELS};

use std::path::Path;

use serde_json::Value;

use crate::capability::Capability;
use crate::error::{ApiError, Result};
use crate::request::Request;

/// A registered model.
pub trait ModelHandler: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Actions this handler serves.
    fn capabilities(&self) -> &[Capability];

    /// Whether `capability` is served.
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Layer names in presentation order.
    fn layers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Classify the request input.
    fn predict(&self, _request: &Request) -> Result<Value> {
        Err(ApiError::unsupported(self.name(), Capability::Predict))
    }

    /// Layer catalog, or rendered feature maps when the request has an input.
    fn features(&self, _request: &Request) -> Result<Value> {
        Err(ApiError::unsupported(self.name(), Capability::Features))
    }

    /// Grad-CAM heatmap.
    fn gradcam(&self, _request: &Request) -> Result<Value> {
        Err(ApiError::unsupported(self.name(), Capability::GradCam))
    }

    /// Adversarial example.
    fn adversarial(&self, _request: &Request) -> Result<Value> {
        Err(ApiError::unsupported(self.name(), Capability::Adversarial))
    }

    /// One training step.
    fn train(&self, _request: &Request) -> Result<Value> {
        Err(ApiError::unsupported(self.name(), Capability::Train))
    }

    /// Rendered convolution kernels.
    fn kernels(&self, _request: &Request) -> Result<Value> {
        Err(ApiError::unsupported(self.name(), Capability::Kernels))
    }

    /// Write the current weights to `path`.
    fn save_weights(&self, _path: &Path) -> Result<()> {
        Err(ApiError::NoWeights(self.name().to_string()))
    }

    /// Run the action for `capability`.
    fn handle(&self, capability: Capability, request: &Request) -> Result<Value> {
        match capability {
            Capability::Predict => self.predict(request),
            Capability::Features => self.features(request),
            Capability::GradCam => self.gradcam(request),
            Capability::Adversarial => self.adversarial(request),
            Capability::Train => self.train(request),
            Capability::Kernels => self.kernels(request),
        }
    }
}

/// Validate an optional `layer_id` against `layers`.
pub(crate) fn layer_filter(request: &Request, layers: &[&str]) -> Result<Option<String>> {
    let layer_id = request
        .query("layer_id")
        .map(str::to_string)
        .or_else(|| request.field("layer_id").and_then(Value::as_str).map(str::to_string));
    match layer_id {
        Some(id) if !layers.contains(&id.as_str()) => {
            Err(ApiError::BadRequest(format!("Unknown layer '{id}'")))
        }
        other => Ok(other),
    }
}

/// Indices of `scores` sorted by descending score; ties keep index order.
pub(crate) fn ranked(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ranked_descending_stable() {
        assert_eq!(ranked(&[0.1, 0.5, 0.1, 0.3]), vec![1, 3, 0, 2]);
        assert!(ranked(&[]).is_empty());
    }

    #[test]
    fn test_layer_filter() {
        let layers = ["conv1", "pool1"];
        let request = Request::get().with_query("layer_id", "pool1");
        assert_eq!(layer_filter(&request, &layers).unwrap(), Some("pool1".to_string()));

        let request = Request::post(json!({"layer_id": "fc9"}));
        assert!(layer_filter(&request, &layers).is_err());

        assert_eq!(layer_filter(&Request::get(), &layers).unwrap(), None);
    }

    #[test]
    fn test_default_methods_unsupported() {
        let handler = PlaceholderHandler::new("patchflow");
        for capability in Capability::ALL {
            let result = handler.handle(capability, &Request::post(json!({})));
            assert!(matches!(result, Err(ApiError::Unsupported { .. })));
        }
        let saved = handler.save_weights(Path::new("/tmp/never-written"));
        assert!(matches!(saved, Err(ApiError::NoWeights(_))));
    }
}
