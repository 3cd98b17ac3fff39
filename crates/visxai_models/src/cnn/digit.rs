//! Two-convolution digit classifier for 28×28 grayscale input.
//!
//! `conv1 (1→16, 3×3) → ReLU → pool1 → conv2 (16→32, 3×3) → ReLU → pool2 →
//! linear (32·7·7 → 10)`. `conv1` and `conv2` are observed before their ReLU.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    loss::CrossEntropyLossConfig,
    pool::{MaxPool2d, MaxPool2dConfig},
    Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

use crate::architecture::Architecture;
use crate::error::{ModelError, Result};
use crate::stage::StageObserver;
use crate::traits::InspectableModel;

/// Configuration for the digit classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitCnnConfig {
    /// Number of output classes.
    pub n_classes: usize,
    /// Side length of the square grayscale input.
    pub input_size: usize,
    /// Channels of the first convolution.
    pub conv1_channels: usize,
    /// Channels of the second convolution.
    pub conv2_channels: usize,
}

impl Default for DigitCnnConfig {
    fn default() -> Self {
        Self {
            n_classes: 10,
            input_size: 28,
            conv1_channels: 16,
            conv2_channels: 32,
        }
    }
}

impl DigitCnnConfig {
    /// Create a new config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the configuration. Two 2×2 poolings need a side divisible by 4.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.input_size % 4 != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "digit input size must be a positive multiple of 4, got {}",
                self.input_size
            )));
        }
        if self.n_classes == 0 {
            return Err(ModelError::InvalidConfig("n_classes must be positive".to_string()));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DigitCnn<B> {
        DigitCnn::new(self.clone(), device)
    }
}

/// Digit classifier with observable convolution and pooling stages.
#[derive(Module, Debug)]
pub struct DigitCnn<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    fc: Linear<B>,
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    n_classes: usize,
}

impl<B: Backend> DigitCnn<B> {
    /// Create a new digit classifier.
    pub fn new(config: DigitCnnConfig, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([1, config.conv1_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([config.conv1_channels, config.conv2_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        let side = config.input_size / 4;
        let fc = LinearConfig::new(config.conv2_channels * side * side, config.n_classes)
            .init(device);

        Self {
            conv1,
            conv2,
            pool,
            fc,
            input_size: config.input_size,
            n_classes: config.n_classes,
        }
    }

    /// Mean cross-entropy of the logits for a normalized batch against `targets`.
    pub fn loss(&self, x: Tensor<B, 4>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let logits = self.forward_logits(x);
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, targets)
    }
}

impl<B: Backend> InspectableModel<B> for DigitCnn<B> {
    fn architecture(&self) -> Architecture {
        Architecture::DigitCnn
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn conv_kernels(&self) -> Vec<(&'static str, Tensor<B, 4>)> {
        vec![("conv1", self.conv1.weight.val()), ("conv2", self.conv2.weight.val())]
    }

    fn forward_observed<O: StageObserver<B>>(
        &self,
        x: Tensor<B, 4>,
        observer: &mut O,
    ) -> Tensor<B, 2> {
        let out = observer.observe_spatial("conv1", self.conv1.forward(x));
        let out = observer.observe_spatial("pool1", self.pool.forward(relu(out)));
        let out = observer.observe_spatial("conv2", self.conv2.forward(out));
        let out = observer.observe_spatial("pool2", self.pool.forward(relu(out)));
        self.fc.forward(out.flatten::<2>(1, 3))
    }
}
