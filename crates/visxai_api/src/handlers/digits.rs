//! Digit classifier handler.

use std::path::Path;

use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use parking_lot::Mutex;
use serde_json::Value;
use visxai_core::{tensor_values, PixelTensor};
use visxai_explain::{capture_all, FeatureMapAssembler};
use visxai_models::{Architecture, ClassLabels, DigitCnn, InspectableModel};

use crate::capability::Capability;
use crate::error::{ApiError, Result};
use crate::request::Request;
use crate::response::{
    FeaturesResponse, KernelsResponse, LayerCatalog, PredictResponse, Probability, TrainResponse,
};

use super::{layer_filter, ranked, ModelHandler};

/// Pixels of one 28×28 digit.
pub const DIGIT_PIXELS: usize = 28 * 28;

/// Side length feature maps are upscaled to.
pub const DIGIT_DISPLAY_SIZE: u32 = 64;

const DEFAULT_LEARNING_RATE: f32 = 1e-3;

const CAPABILITIES: [Capability; 4] = [
    Capability::Predict,
    Capability::Features,
    Capability::Train,
    Capability::Kernels,
];

struct DigitState<B: AutodiffBackend, O> {
    model: DigitCnn<B>,
    optim: O,
}

/// Handler for the digit classifier.
///
/// Inputs are 784 pixel values in `[0, 1]`. The network and its optimizer
/// state live behind one mutex, so a training step and a prediction never
/// interleave.
pub struct DigitHandler<B: AutodiffBackend, O> {
    name: String,
    state: Mutex<DigitState<B, O>>,
    labels: ClassLabels,
    device: B::Device,
}

impl<B, O> DigitHandler<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<DigitCnn<B>, B>,
{
    /// Wrap `model` and the optimizer used by `train`.
    pub fn new(model: DigitCnn<B>, optim: O, device: B::Device) -> Self {
        Self {
            name: Architecture::DigitCnn.name().to_string(),
            state: Mutex::new(DigitState { model, optim }),
            labels: ClassLabels::digits(),
            device,
        }
    }

    fn pixels(&self, request: &Request) -> Result<PixelTensor> {
        let values = request.f32_array("pixels", DIGIT_PIXELS)?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ApiError::BadRequest("pixel values must be finite".to_string()));
        }
        Ok(PixelTensor::new(1, 28, 28, values)?)
    }

    fn assembler(&self) -> FeatureMapAssembler {
        FeatureMapAssembler::new(usize::MAX).with_display_size(DIGIT_DISPLAY_SIZE)
    }
}

impl<B: AutodiffBackend> DigitHandler<B, ()> {
    /// Handler training with Adam at default settings.
    pub fn with_adam(
        model: DigitCnn<B>,
        device: B::Device,
    ) -> DigitHandler<B, impl Optimizer<DigitCnn<B>, B> + Send> {
        DigitHandler::new(model, AdamConfig::new().init::<B, DigitCnn<B>>(), device)
    }
}

impl<B, O> ModelHandler for DigitHandler<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<DigitCnn<B>, B> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &CAPABILITIES
    }

    fn layers(&self) -> Vec<String> {
        Architecture::DigitCnn
            .layer_order()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn predict(&self, request: &Request) -> Result<Value> {
        let pixels = self.pixels(request)?;
        let state = self.state.lock();
        let (logits, ctx) = capture_all(&state.model, pixels.to_tensor::<B>(&self.device));

        let probs = tensor_values(softmax(logits.detach(), 1).slice([0..1]))?;
        let top = ranked(&probs).first().copied().unwrap_or_default();
        let probabilities = probs
            .iter()
            .enumerate()
            .map(|(i, &score)| Probability {
                label: self.labels.get(i),
                score,
            })
            .collect();

        let feature_maps = self
            .assembler()
            .assemble(ctx.activations(), Architecture::DigitCnn.layer_order())?;

        Ok(serde_json::to_value(PredictResponse {
            top_class: self.labels.get(top),
            probabilities,
            feature_maps,
        })?)
    }

    fn features(&self, request: &Request) -> Result<Value> {
        let layer_order = Architecture::DigitCnn.layer_order();
        let filter = layer_filter(request, layer_order)?;

        if request.field("pixels").is_none() {
            let layers = match filter {
                Some(layer) => vec![layer],
                None => self.layers(),
            };
            return Ok(serde_json::to_value(LayerCatalog {
                model: self.name.clone(),
                layers,
            })?);
        }

        let pixels = self.pixels(request)?;
        let state = self.state.lock();
        let (_, ctx) = capture_all(&state.model, pixels.to_tensor::<B>(&self.device));
        let feature_maps = self
            .assembler()
            .with_layer_filter(filter)
            .assemble(ctx.activations(), layer_order)?;

        Ok(serde_json::to_value(FeaturesResponse {
            model: self.name.clone(),
            feature_maps,
        })?)
    }

    fn train(&self, request: &Request) -> Result<Value> {
        let pixels = self.pixels(request)?;
        let label = request.usize_required("label")?;
        if label >= self.labels.len() {
            return Err(ApiError::BadRequest(format!("label must be in 0..=9, got {label}")));
        }
        let lr = request.f32_opt("lr")?.unwrap_or(DEFAULT_LEARNING_RATE);
        if !lr.is_finite() || lr <= 0.0 {
            return Err(ApiError::BadRequest(format!("lr must be positive, got {lr}")));
        }

        let mut state = self.state.lock();
        let DigitState { model, optim } = &mut *state;

        let x = Architecture::DigitCnn
            .normalization()
            .apply(pixels.to_tensor::<B>(&self.device));
        let targets = Tensor::<B, 1, Int>::from_ints([label as i32], &self.device);
        let loss = model.loss(x, targets);
        let loss_value = tensor_values(loss.clone().detach())?
            .first()
            .copied()
            .unwrap_or(f32::NAN);

        let grads = GradientsParams::from_grads(loss.backward(), &*model);
        *model = optim.step(f64::from(lr), model.clone(), grads);
        tracing::info!(label, loss = loss_value, "digit training step");

        Ok(serde_json::to_value(TrainResponse {
            status: "success".to_string(),
            loss: loss_value,
            message: format!("Training step completed (label {label}, lr {lr})"),
        })?)
    }

    fn kernels(&self, request: &Request) -> Result<Value> {
        let state = self.state.lock();
        let kernels = state.model.conv_kernels();
        let names: Vec<&str> = kernels.iter().map(|(name, _)| *name).collect();
        let filter = layer_filter(request, &names)?;
        let kernels = self
            .assembler()
            .with_layer_filter(filter)
            .assemble_kernels(kernels)?;

        Ok(serde_json::to_value(KernelsResponse {
            model: self.name.clone(),
            kernels,
        })?)
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        let state = self.state.lock();
        visxai_models::save_weights::<B, _>(&state.model, path)?;
        tracing::info!(model = %self.name, path = %path.display(), "weights saved");
        Ok(())
    }
}
