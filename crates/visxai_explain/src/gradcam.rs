//! Gradient-weighted class activation mapping.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use image::RgbImage;
use ndarray::{Array2, ArrayView2};
use visxai_core::{render, resample, tensor_values, CoreError};
use visxai_models::InspectableModel;

use crate::capture::{CaptureContext, Watch};
use crate::error::{ExplainError, Result};

/// Compute Grad-CAM from a layer's activations and their gradients.
///
/// # Arguments
///
/// * `activations` - Target layer output (batch, channels, height, width)
/// * `gradients` - Gradient of the class score w.r.t. `activations`, same shape
///
/// # Returns
///
/// Rectified map of shape (batch, 1, height, width).
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> Tensor<B, 4> {
    // Global average pool the gradients: (batch, channels, h, w) -> (batch, channels, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    let cam = (activations * weights).sum_dim(1);

    cam.clamp_min(0.0)
}

/// Grad-CAM request parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradCamConfig {
    /// Index into the architecture's Grad-CAM layers.
    pub layer_index: usize,
    /// Class to explain; the predicted class when `None`.
    pub class_idx: Option<usize>,
}

impl GradCamConfig {
    /// Create a config targeting `layer_index` and the predicted class.
    pub fn new(layer_index: usize) -> Self {
        Self {
            layer_index,
            class_idx: None,
        }
    }

    /// Explain a specific class.
    #[must_use]
    pub fn with_class(mut self, class_idx: Option<usize>) -> Self {
        self.class_idx = class_idx;
        self
    }
}

/// Output of a Grad-CAM pass.
#[derive(Debug, Clone)]
pub struct GradCamResult {
    /// Class whose score was differentiated.
    pub class_idx: usize,
    /// Target layer name.
    pub layer_name: String,
    /// Target layer index.
    pub layer_index: usize,
    /// Every selectable layer of the architecture.
    pub available_layers: Vec<String>,
    /// `[0, 1]` map at the model's input resolution.
    pub map: Array2<f32>,
}

impl GradCamResult {
    /// Render the map through the jet colormap.
    pub fn heatmap(&self) -> RgbImage {
        render::colorize(self.map.view())
    }

    /// The map as rows of floats.
    pub fn heatmap_data(&self) -> Vec<Vec<f32>> {
        self.map.rows().into_iter().map(|row| row.to_vec()).collect()
    }
}

fn plane(values: Vec<f32>, height: usize, width: usize) -> Result<Array2<f32>> {
    Array2::from_shape_vec((height, width), values).map_err(|e| {
        ExplainError::Core(CoreError::InvalidShape {
            expected: format!("{height}x{width} map"),
            got: e.to_string(),
        })
    })
}

/// Resample `gradient` to the spatial size of `activation` when they differ.
fn match_spatial<B: Backend>(
    gradient: Tensor<B, 4>,
    activation: &Tensor<B, 4>,
) -> Result<Tensor<B, 4>> {
    let [_, _, ah, aw] = activation.dims();
    let [n, c, gh, gw] = gradient.dims();
    if (gh, gw) == (ah, aw) {
        return Ok(gradient);
    }
    tracing::debug!(from = ?(gh, gw), to = ?(ah, aw), "resampling gradient");
    let device = gradient.device();
    let values = tensor_values(gradient)?;
    let resized = resample::bilinear_planes(&values, n * c, (gh, gw), (ah, aw))?;
    Ok(Tensor::from_data(TensorData::new(resized, [n, c, ah, aw]), &device))
}

/// Index of the largest value in the first row of `logits`.
pub(crate) fn argmax_first<B: Backend>(logits: Tensor<B, 2>) -> Result<usize> {
    let values = tensor_values(logits.slice([0..1]))?;
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
        .ok_or_else(|| ExplainError::CaptureFailed("empty logits".to_string()))
}

impl GradCamConfig {
    /// Run Grad-CAM for a `[0, 1]` pixel batch of one image.
    pub fn compute<B, M>(&self, model: &M, pixels: Tensor<B, 4>) -> Result<GradCamResult>
    where
        B: AutodiffBackend,
        M: InspectableModel<B>,
    {
        let architecture = model.architecture();
        let layers = architecture.gradcam_layers();
        if layers.is_empty() {
            return Err(ExplainError::Unsupported(format!(
                "Grad-CAM is not available for {architecture}"
            )));
        }
        let layer_name = *layers.get(self.layer_index).ok_or(ExplainError::LayerOutOfRange {
            index: self.layer_index,
            available: layers.len(),
        })?;
        if let Some(class_idx) = self.class_idx {
            if class_idx >= model.n_classes() {
                return Err(ExplainError::ClassOutOfRange {
                    index: class_idx,
                    n_classes: model.n_classes(),
                });
            }
        }

        let mut ctx = CaptureContext::<B>::new(Watch::Attached);
        let handle = ctx.attach_gradient(layer_name);
        let result = self.run_passes(model, pixels, layer_name, &mut ctx);
        ctx.detach(handle);
        let (class_idx, cam) = result?;

        let map = finish_map(cam.view(), model.input_size());
        tracing::debug!(layer = layer_name, class_idx, "grad-cam computed");

        Ok(GradCamResult {
            class_idx,
            layer_name: layer_name.to_string(),
            layer_index: self.layer_index,
            available_layers: layers.iter().map(|s| s.to_string()).collect(),
            map,
        })
    }

    fn run_passes<B, M>(
        &self,
        model: &M,
        pixels: Tensor<B, 4>,
        layer_name: &str,
        ctx: &mut CaptureContext<B>,
    ) -> Result<(usize, Array2<f32>)>
    where
        B: AutodiffBackend,
        M: InspectableModel<B>,
    {
        let logits = model.forward_pixels_observed(pixels, ctx);
        let class_idx = match self.class_idx {
            Some(class_idx) => class_idx,
            None => argmax_first(logits.clone().detach())?,
        };

        let score = logits.slice([0..1, class_idx..class_idx + 1]).sum();
        let grads = score.backward();
        ctx.collect_gradients(&grads);

        let activation = ctx
            .activation(layer_name)?
            .spatial()
            .cloned()
            .ok_or_else(|| {
                ExplainError::CaptureFailed(format!("'{layer_name}' is not a spatial layer"))
            })?
            .detach();
        let gradient = ctx.gradient(layer_name)?.clone();
        let gradient = match_spatial(gradient, &activation)?;

        let cam = grad_cam(activation.slice([0..1]), gradient.slice([0..1]));
        let [_, _, h, w] = cam.dims();
        Ok((class_idx, plane(tensor_values(cam)?, h, w)?))
    }
}

/// Resize a raw map to `size × size` and normalize it to `[0, 1]`.
pub fn finish_map(cam: ArrayView2<f32>, size: usize) -> Array2<f32> {
    render::normalize_unit(resample::bilinear(cam, size, size).view())
}
