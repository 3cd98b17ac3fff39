//! Feature-map assembly.
//!
//! Turns a capture table into the per-layer image payload returned to
//! clients: for each layer of the architecture's order, the first
//! `channel_cap` channels rendered as grayscale PNG data URIs plus the true
//! channel count.

use burn::prelude::*;
use ndarray::ArrayView2;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use visxai_core::{codec, render, resample, tensor_values, CoreError};
use visxai_models::{Activation, InspectableModel};

use crate::capture::{ActivationCapture, CaptureContext};
use crate::error::Result;

/// Rendered maps of one layer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct LayerMaps {
    /// PNG data URIs of the rendered channels.
    pub maps: Vec<String>,
    /// Number of channels the layer actually has.
    pub total: usize,
}

/// Layer-ordered feature-map payload. Serializes as a JSON object whose key
/// order is the layer order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureMaps {
    layers: Vec<(String, LayerMaps)>,
}

impl FeatureMaps {
    /// Maps of `layer`, if present.
    pub fn get(&self, layer: &str) -> Option<&LayerMaps> {
        self.layers
            .iter()
            .find(|(name, _)| name == layer)
            .map(|(_, maps)| maps)
    }

    /// Layer names in order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layer was rendered.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Iterate over `(layer, maps)` in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LayerMaps)> {
        self.layers.iter().map(|(name, maps)| (name.as_str(), maps))
    }
}

impl Serialize for FeatureMaps {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.layers.len()))?;
        for (name, maps) in &self.layers {
            map.serialize_entry(name, maps)?;
        }
        map.end()
    }
}

/// Builds [`FeatureMaps`] from captured activations.
#[derive(Debug, Clone)]
pub struct FeatureMapAssembler {
    channel_cap: usize,
    display_size: Option<u32>,
    layer_filter: Option<String>,
}

impl Default for FeatureMapAssembler {
    fn default() -> Self {
        Self::new(16)
    }
}

impl FeatureMapAssembler {
    /// Render at most `channel_cap` channels per layer.
    pub fn new(channel_cap: usize) -> Self {
        Self {
            channel_cap,
            display_size: None,
            layer_filter: None,
        }
    }

    /// Upscale every rendered map to `size × size` with nearest-neighbour
    /// sampling.
    #[must_use]
    pub fn with_display_size(mut self, size: u32) -> Self {
        self.display_size = Some(size);
        self
    }

    /// Restrict the output to one layer.
    #[must_use]
    pub fn with_layer_filter(mut self, layer: Option<String>) -> Self {
        self.layer_filter = layer;
        self
    }

    /// Assemble maps for every layer of `layer_order` present in `capture`.
    ///
    /// Absent layers are skipped.
    pub fn assemble<B: Backend>(
        &self,
        capture: &ActivationCapture<B>,
        layer_order: &[&str],
    ) -> Result<FeatureMaps> {
        let mut layers = Vec::new();
        for &layer in layer_order {
            if self.layer_filter.as_deref().is_some_and(|f| f != layer) {
                continue;
            }
            let Some(activation) = capture.get(layer) else {
                tracing::debug!(layer, "layer not captured, skipping");
                continue;
            };
            let maps = match activation {
                Activation::Spatial(t) => self.render_spatial(t.clone())?,
                Activation::Flat(t) => self.render_flat(t.clone())?,
            };
            layers.push((layer.to_string(), maps));
        }
        Ok(FeatureMaps { layers })
    }

    /// Render convolution kernels: the first input channel of each of the
    /// first `channel_cap` filters, per layer. `total` is the filter count.
    pub fn assemble_kernels<B: Backend>(
        &self,
        kernels: Vec<(&str, Tensor<B, 4>)>,
    ) -> Result<FeatureMaps> {
        let mut layers = Vec::new();
        for (layer, weight) in kernels {
            if self.layer_filter.as_deref().is_some_and(|f| f != layer) {
                continue;
            }
            // (out, in, kh, kw) -> (1, out, kh, kw)
            let [out, _, kh, kw] = weight.dims();
            let first_channel = weight.slice([0..out, 0..1, 0..kh, 0..kw]).swap_dims(0, 1);
            layers.push((layer.to_string(), self.render_spatial(first_channel)?));
        }
        Ok(FeatureMaps { layers })
    }

    fn encode(&self, map: ArrayView2<f32>) -> Result<String> {
        let gray = render::to_gray_image(map);
        let gray = match self.display_size {
            Some(size) => resample::nearest_gray(&gray, size, size),
            None => gray,
        };
        Ok(codec::gray_png_data_uri(&gray)?)
    }

    fn render_spatial<B: Backend>(&self, activation: Tensor<B, 4>) -> Result<LayerMaps> {
        let [_, channels, height, width] = activation.dims();
        let shown = self.channel_cap.min(channels);
        if shown == 0 {
            return Ok(LayerMaps {
                maps: Vec::new(),
                total: channels,
            });
        }

        let values = tensor_values(activation.slice([0..1, 0..shown]))?;
        let plane = height * width;
        let maps = values
            .chunks_exact(plane.max(1))
            .take(shown)
            .map(|chunk| {
                let view = ArrayView2::from_shape((height, width), chunk).map_err(|e| {
                    CoreError::InvalidShape {
                        expected: format!("{height}x{width} plane"),
                        got: e.to_string(),
                    }
                })?;
                self.encode(view)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LayerMaps {
            maps,
            total: channels,
        })
    }

    fn render_flat<B: Backend>(&self, activation: Tensor<B, 2>) -> Result<LayerMaps> {
        let values = tensor_values(activation.slice([0..1]))?;
        let grid = render::vector_to_grid(&values);
        Ok(LayerMaps {
            maps: vec![self.encode(grid.view())?],
            total: 1,
        })
    }
}

/// Run `model` on a `[0, 1]` pixel batch while recording every stage.
pub fn capture_all<B: Backend, M: InspectableModel<B>>(
    model: &M,
    pixels: Tensor<B, 4>,
) -> (Tensor<B, 2>, CaptureContext<B>) {
    let mut ctx = CaptureContext::all();
    let logits = model.forward_pixels_observed(pixels, &mut ctx);
    (logits, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use visxai_core::backend::NdArray;
    use visxai_core::codec::decode_image;

    type TestBackend = NdArray;

    fn spatial(channels: usize, side: usize) -> Activation<TestBackend> {
        let n = channels * side * side;
        let values = (0..n).map(|i| i as f32).collect::<Vec<_>>();
        let data = TensorData::new(values, [1, channels, side, side]);
        Activation::Spatial(Tensor::from_data(data, &Default::default()))
    }

    fn capture() -> ActivationCapture<TestBackend> {
        let mut capture = ActivationCapture::new();
        capture.store("conv_1", spatial(20, 4));
        capture.store("conv_2", spatial(3, 2));
        capture.store(
            "fc_1",
            Activation::Flat(Tensor::from_floats([[1.0, 2.0, 3.0, 4.0, 5.0]], &Default::default())),
        );
        capture
    }

    const ORDER: &[&str] = &["conv_1", "conv_2", "conv_3", "fc_1"];

    #[test]
    fn test_order_and_skip_absent() {
        let maps = FeatureMapAssembler::new(16).assemble(&capture(), ORDER).unwrap();
        assert_eq!(maps.layer_names(), vec!["conv_1", "conv_2", "fc_1"]);
    }

    #[test]
    fn test_channel_cap_and_total() {
        let maps = FeatureMapAssembler::new(16).assemble(&capture(), ORDER).unwrap();

        let conv1 = maps.get("conv_1").unwrap();
        assert_eq!(conv1.maps.len(), 16);
        assert_eq!(conv1.total, 20);

        let conv2 = maps.get("conv_2").unwrap();
        assert_eq!(conv2.maps.len(), 3);
        assert_eq!(conv2.total, 3);
    }

    #[test]
    fn test_flat_layer_single_grid() {
        let maps = FeatureMapAssembler::new(16).assemble(&capture(), ORDER).unwrap();
        let fc = maps.get("fc_1").unwrap();
        assert_eq!(fc.total, 1);
        assert_eq!(fc.maps.len(), 1);

        let image = decode_image(&fc.maps[0]).unwrap();
        assert_eq!((image.width(), image.height()), (3, 3));
    }

    #[test]
    fn test_maps_are_png_data_uris() {
        let maps = FeatureMapAssembler::new(2).assemble(&capture(), ORDER).unwrap();
        for (_, layer) in maps.iter() {
            for uri in &layer.maps {
                assert!(uri.starts_with("data:image/png;base64,"));
            }
        }
    }

    #[test]
    fn test_display_size_upscales() {
        let maps = FeatureMapAssembler::new(1)
            .with_display_size(64)
            .assemble(&capture(), ORDER)
            .unwrap();
        let image = decode_image(&maps.get("conv_2").unwrap().maps[0]).unwrap();
        assert_eq!((image.width(), image.height()), (64, 64));
    }

    #[test]
    fn test_layer_filter() {
        let maps = FeatureMapAssembler::new(16)
            .with_layer_filter(Some("conv_2".to_string()))
            .assemble(&capture(), ORDER)
            .unwrap();
        assert_eq!(maps.layer_names(), vec!["conv_2"]);
    }

    #[test]
    fn test_deterministic() {
        let assembler = FeatureMapAssembler::new(16);
        let a = assembler.assemble(&capture(), ORDER).unwrap();
        let b = assembler.assemble(&capture(), ORDER).unwrap();
        assert_eq!(a, b);
    }

    fn kernels() -> Vec<(&'static str, Tensor<TestBackend, 4>)> {
        let device = Default::default();
        // filter f, channel 0 ramps with f; channel 1 is constant
        let weight = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(
                (0..6 * 2 * 9)
                    .map(|i| {
                        let (filter, channel, cell) = (i / 18, (i / 9) % 2, i % 9);
                        match channel {
                            0 => (filter * 9 + cell) as f32,
                            _ => 1.0,
                        }
                    })
                    .collect::<Vec<_>>(),
                [6, 2, 3, 3],
            ),
            &device,
        );
        vec![
            ("conv1", weight),
            ("conv2", Tensor::<TestBackend, 4>::ones([2, 6, 3, 3], &device)),
        ]
    }

    #[test]
    fn test_kernels_first_input_channel() {
        let maps = FeatureMapAssembler::new(4).assemble_kernels(kernels()).unwrap();
        assert_eq!(maps.layer_names(), vec!["conv1", "conv2"]);

        let conv1 = maps.get("conv1").unwrap();
        assert_eq!((conv1.maps.len(), conv1.total), (4, 6));
        let image = decode_image(&conv1.maps[0]).unwrap().to_luma8();
        assert_eq!(image.dimensions(), (3, 3));
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(2, 2)[0], 255);

        let conv2 = maps.get("conv2").unwrap();
        assert_eq!((conv2.maps.len(), conv2.total), (2, 2));
        assert!(conv2.maps.iter().all(|uri| uri.starts_with("data:image/png;base64,")));
    }

    #[test]
    fn test_kernels_layer_filter_and_display_size() {
        let maps = FeatureMapAssembler::new(8)
            .with_display_size(48)
            .with_layer_filter(Some("conv2".to_string()))
            .assemble_kernels(kernels())
            .unwrap();
        assert_eq!(maps.layer_names(), vec!["conv2"]);
        let image = decode_image(&maps.get("conv2").unwrap().maps[0]).unwrap();
        assert_eq!((image.width(), image.height()), (48, 48));
    }

    #[test]
    fn test_serialized_key_order() {
        let maps = FeatureMapAssembler::new(1).assemble(&capture(), ORDER).unwrap();
        let json = serde_json::to_string(&maps).unwrap();
        let conv1 = json.find("\"conv_1\"").unwrap();
        let conv2 = json.find("\"conv_2\"").unwrap();
        let fc1 = json.find("\"fc_1\"").unwrap();
        assert!(conv1 < conv2 && conv2 < fc1);
    }
}
