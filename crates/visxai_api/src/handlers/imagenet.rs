//! VGG16 / ResNet50 handler.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use parking_lot::Mutex;
use serde_json::Value;
use visxai_core::{codec, tensor_values, PixelTensor};
use visxai_explain::{capture_all, FeatureMapAssembler, FgsmConfig, GradCamConfig};
use visxai_models::{ClassLabels, InspectableModel};

use crate::capability::Capability;
use crate::error::Result;
use crate::request::Request;
use crate::response::{
    AdversarialResponse, FeaturesResponse, GradCamResponse, KernelsResponse, LayerCatalog,
    PredictResponse, Probability,
};

use super::{layer_filter, ranked, ModelHandler};

const CAPABILITIES: [Capability; 5] = [
    Capability::Predict,
    Capability::Features,
    Capability::GradCam,
    Capability::Adversarial,
    Capability::Kernels,
];

/// Filters rendered per convolution by `kernels`.
pub const KERNEL_CAP: usize = 8;

/// Handler for an ImageNet-style RGB classifier.
///
/// The network sits behind a mutex: requests against one handler run one at
/// a time, each with its own capture context.
pub struct ImageNetHandler<B: AutodiffBackend, M> {
    name: String,
    model: Mutex<M>,
    labels: ClassLabels,
    device: B::Device,
    top_k: usize,
    channel_cap: usize,
    kernel_cap: usize,
    default_epsilon: f32,
}

impl<B, M> ImageNetHandler<B, M>
where
    B: AutodiffBackend,
    M: InspectableModel<B>,
{
    /// Wrap `model` under `name`.
    pub fn new(name: &str, model: M, labels: ClassLabels, device: B::Device) -> Self {
        Self {
            name: name.to_string(),
            model: Mutex::new(model),
            labels,
            device,
            top_k: 5,
            channel_cap: 16,
            kernel_cap: KERNEL_CAP,
            default_epsilon: visxai_explain::DEFAULT_EPSILON,
        }
    }

    /// Number of probabilities returned by `predict`.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Feature maps rendered per layer.
    #[must_use]
    pub fn with_channel_cap(mut self, channel_cap: usize) -> Self {
        self.channel_cap = channel_cap;
        self
    }

    /// Filters rendered per convolution.
    #[must_use]
    pub fn with_kernel_cap(mut self, kernel_cap: usize) -> Self {
        self.kernel_cap = kernel_cap;
        self
    }

    /// Epsilon when a request gives none.
    #[must_use]
    pub fn with_default_epsilon(mut self, epsilon: f32) -> Self {
        self.default_epsilon = epsilon;
        self
    }

    fn layer_order(&self) -> &'static [&'static str] {
        self.model.lock().architecture().layer_order()
    }

    /// Decode, resize and center-crop the request image.
    fn decode(&self, request: &Request, input_size: usize) -> Result<PixelTensor> {
        let image = codec::decode_image(request.image()?)?;
        Ok(PixelTensor::from_image_center_crop(&image, input_size as u32))
    }
}

impl<B, M> ModelHandler for ImageNetHandler<B, M>
where
    B: AutodiffBackend,
    M: InspectableModel<B> + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &CAPABILITIES
    }

    fn layers(&self) -> Vec<String> {
        self.layer_order().iter().map(|s| s.to_string()).collect()
    }

    fn predict(&self, request: &Request) -> Result<Value> {
        let model = self.model.lock();
        let pixels = self.decode(request, model.input_size())?;
        let (logits, ctx) = capture_all(&*model, pixels.to_tensor::<B>(&self.device));

        let probs = tensor_values(softmax(logits.detach(), 1).slice([0..1]))?;
        let probabilities: Vec<Probability> = ranked(&probs)
            .into_iter()
            .take(self.top_k)
            .map(|i| Probability {
                label: self.labels.get(i),
                score: probs[i],
            })
            .collect();
        let top_class = probabilities
            .first()
            .map(|p| p.label.clone())
            .unwrap_or_default();

        let feature_maps = FeatureMapAssembler::new(self.channel_cap)
            .assemble(ctx.activations(), model.architecture().layer_order())?;
        tracing::debug!(model = %self.name, top_class = %top_class, "prediction");

        Ok(serde_json::to_value(PredictResponse {
            top_class,
            probabilities,
            feature_maps,
        })?)
    }

    fn features(&self, request: &Request) -> Result<Value> {
        let layer_order = self.layer_order();
        let filter = layer_filter(request, layer_order)?;

        if !request.has_image() {
            let layers = match filter {
                Some(layer) => vec![layer],
                None => self.layers(),
            };
            return Ok(serde_json::to_value(LayerCatalog {
                model: self.name.clone(),
                layers,
            })?);
        }

        let model = self.model.lock();
        let pixels = self.decode(request, model.input_size())?;
        let (_, ctx) = capture_all(&*model, pixels.to_tensor::<B>(&self.device));
        let feature_maps = FeatureMapAssembler::new(self.channel_cap)
            .with_layer_filter(filter)
            .assemble(ctx.activations(), layer_order)?;

        Ok(serde_json::to_value(FeaturesResponse {
            model: self.name.clone(),
            feature_maps,
        })?)
    }

    fn gradcam(&self, request: &Request) -> Result<Value> {
        let layer_index = request.usize_or("layer_index", 0)?;
        let class_idx = request.usize_opt("class_idx")?;

        let model = self.model.lock();
        let pixels = self.decode(request, model.input_size())?;
        let result = GradCamConfig::new(layer_index)
            .with_class(class_idx)
            .compute(&*model, pixels.to_tensor::<B>(&self.device))?;
        drop(model);

        Ok(serde_json::to_value(GradCamResponse {
            heatmap: codec::rgb_png_data_uri(&result.heatmap())?,
            class_idx: result.class_idx,
            class_label: self.labels.get(result.class_idx),
            layer_name: result.layer_name.clone(),
            layer_index: result.layer_index,
            available_layers: result.available_layers.clone(),
            heatmap_data: result.heatmap_data(),
        })?)
    }

    fn adversarial(&self, request: &Request) -> Result<Value> {
        let epsilon = request.f32_opt("epsilon")?.unwrap_or(self.default_epsilon);
        let target_class = request.usize_opt("target_class")?;

        let model = self.model.lock();
        let pixels = self.decode(request, model.input_size())?;
        let result = FgsmConfig::new(epsilon)
            .with_target_class(target_class)
            .attack(&*model, &pixels, &self.device)?;
        drop(model);

        Ok(serde_json::to_value(AdversarialResponse {
            original_class: self.labels.get(result.original_class),
            adversarial_class: self.labels.get(result.adversarial_class),
            confidence: result.confidence,
            epsilon: result.epsilon,
            adversarial_image: codec::rgb_png_data_uri(&result.adversarial.to_rgb_image())?,
            max_perturbation: result.max_perturbation,
        })?)
    }

    fn kernels(&self, request: &Request) -> Result<Value> {
        let model = self.model.lock();
        let kernels = model.conv_kernels();
        let names: Vec<&str> = kernels.iter().map(|(name, _)| *name).collect();
        let filter = layer_filter(request, &names)?;
        let kernels = FeatureMapAssembler::new(self.kernel_cap)
            .with_layer_filter(filter)
            .assemble_kernels(kernels)?;
        drop(model);

        Ok(serde_json::to_value(KernelsResponse {
            model: self.name.clone(),
            kernels,
        })?)
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        let model = self.model.lock();
        visxai_models::save_weights::<B, M>(&*model, path)?;
        tracing::info!(model = %self.name, path = %path.display(), "weights saved");
        Ok(())
    }
}
