//! Architecture metadata: canonical layer order, Grad-CAM targets and
//! input normalization.

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

const VGG16_LAYERS: &[&str] = &[
    "conv_1", "conv_2", "conv_3", "conv_4", "conv_5", "conv_6", "conv_7", "conv_8", "conv_9",
    "conv_10", "conv_11", "conv_12", "conv_13", "fc_1", "fc_2", "fc_3",
];

const RESNET50_LAYERS: &[&str] = &["layer1", "layer2", "layer3", "layer4"];

const DIGIT_LAYERS: &[&str] = &["conv1", "pool1", "conv2", "pool2"];

/// Supported network architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// VGG16: 13 convolutions and 3 fully connected layers.
    Vgg16,
    /// ResNet50: bottleneck residual network with four block groups.
    ResNet50,
    /// Small two-convolution digit classifier on 28×28 grayscale input.
    DigitCnn,
}

impl Architecture {
    /// Registry name of the architecture.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Vgg16 => "vgg16",
            Self::ResNet50 => "resnet50",
            Self::DigitCnn => "mnist",
        }
    }

    /// Canonical presentation order of captured layers.
    #[must_use]
    pub const fn layer_order(&self) -> &'static [&'static str] {
        match self {
            Self::Vgg16 => VGG16_LAYERS,
            Self::ResNet50 => RESNET50_LAYERS,
            Self::DigitCnn => DIGIT_LAYERS,
        }
    }

    /// Layers selectable as Grad-CAM targets, indexed by `layer_index`.
    ///
    /// Empty for architectures without Grad-CAM support.
    #[must_use]
    pub fn gradcam_layers(&self) -> &'static [&'static str] {
        match self {
            Self::Vgg16 => &VGG16_LAYERS[..13],
            Self::ResNet50 => RESNET50_LAYERS,
            Self::DigitCnn => &[],
        }
    }

    /// Per-channel input normalization applied after pixel decoding.
    #[must_use]
    pub fn normalization(&self) -> Normalization {
        match self {
            Self::Vgg16 | Self::ResNet50 => Normalization::imagenet(),
            Self::DigitCnn => Normalization::new(vec![0.5], vec![0.5]),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Architecture {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vgg16" => Ok(Self::Vgg16),
            "resnet50" => Ok(Self::ResNet50),
            "mnist" | "digits" | "digitcnn" => Ok(Self::DigitCnn),
            other => Err(ModelError::UnsupportedArchitecture(other.to_string())),
        }
    }
}

/// Per-channel `(x - mean) / std` normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Per-channel mean.
    pub mean: Vec<f32>,
    /// Per-channel standard deviation.
    pub std: Vec<f32>,
}

impl Normalization {
    /// Create a new normalization.
    #[must_use]
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Self {
        Self { mean, std }
    }

    /// ImageNet statistics.
    #[must_use]
    pub fn imagenet() -> Self {
        Self::new(vec![0.485, 0.456, 0.406], vec![0.229, 0.224, 0.225])
    }

    /// Number of channels this normalization expects.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    /// Apply to a `(N, C, H, W)` pixel tensor. Built from tensor ops so that
    /// gradients flow back to pixel space.
    pub fn apply<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let device = x.device();
        let c = self.channels();
        let mean = Tensor::<B, 1>::from_floats(self.mean.as_slice(), &device).reshape([1, c, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(self.std.as_slice(), &device).reshape([1, c, 1, 1]);
        (x - mean) / std
    }
}
