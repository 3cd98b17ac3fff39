//! VGG16 image classifier.
//!
//! Thirteen 3×3 convolutions in five groups separated by 2×2 max pooling,
//! followed by adaptive average pooling and three fully connected layers.
//! Stage outputs are observed *after* the ReLU that follows each layer, so
//! `conv_1`..`conv_13`, `fc_1` and `fc_2` are non-negative. `fc_3` is the
//! raw logits.
//!
//! The classifier's dropout layers are omitted: this network is used for
//! inference and gradient analysis only, and both need a deterministic pass.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

use crate::architecture::Architecture;
use crate::error::{ModelError, Result};
use crate::stage::StageObserver;
use crate::traits::InspectableModel;

/// Output channels of the five convolution groups and their depth.
const GROUPS: [(usize, usize); 5] = [(64, 2), (128, 2), (256, 3), (512, 3), (512, 3)];

/// Hidden width of the first two fully connected layers.
const FC_HIDDEN: usize = 4096;

/// Stage names of the convolutions, in evaluation order.
const CONV_STAGES: [&str; 13] = [
    "conv_1", "conv_2", "conv_3", "conv_4", "conv_5", "conv_6", "conv_7", "conv_8", "conv_9",
    "conv_10", "conv_11", "conv_12", "conv_13",
];

/// Configuration for the VGG16 model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vgg16Config {
    /// Number of output classes.
    pub n_classes: usize,
    /// Side length of the square RGB input.
    pub input_size: usize,
    /// Divides every channel and hidden width (1 = the standard network).
    pub width_divisor: usize,
    /// Output side of the adaptive average pool before the classifier.
    pub pool_size: usize,
}

impl Default for Vgg16Config {
    fn default() -> Self {
        Self {
            n_classes: 1000,
            input_size: 224,
            width_divisor: 1,
            pool_size: 7,
        }
    }
}

impl Vgg16Config {
    /// Create a new config.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            ..Default::default()
        }
    }

    /// Set the input resolution.
    #[must_use]
    pub fn with_input_size(mut self, input_size: usize) -> Self {
        self.input_size = input_size;
        self
    }

    /// Set the width divisor.
    #[must_use]
    pub fn with_width_divisor(mut self, width_divisor: usize) -> Self {
        self.width_divisor = width_divisor;
        self
    }

    /// Set the adaptive pool output size.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Check the configuration.
    ///
    /// Five 2×2 poolings need at least 32 pixels per side.
    pub fn validate(&self) -> Result<()> {
        if self.input_size < 32 {
            return Err(ModelError::InvalidConfig(format!(
                "VGG16 input size must be at least 32, got {}",
                self.input_size
            )));
        }
        if self.n_classes == 0 || self.width_divisor == 0 || self.pool_size == 0 {
            return Err(ModelError::InvalidConfig(
                "VGG16 n_classes, width_divisor and pool_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn width(&self, channels: usize) -> usize {
        (channels / self.width_divisor.max(1)).max(1)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg16<B> {
        Vgg16::new(self.clone(), device)
    }
}

/// VGG16 classifier with observable stages.
#[derive(Module, Debug)]
pub struct Vgg16<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
    avgpool: AdaptiveAvgPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    n_classes: usize,
}

impl<B: Backend> Vgg16<B> {
    /// Create a new VGG16 model.
    pub fn new(config: Vgg16Config, device: &B::Device) -> Self {
        let mut convs = Vec::with_capacity(CONV_STAGES.len());
        let mut in_channels = 3;
        for &(channels, depth) in &GROUPS {
            let out_channels = config.width(channels);
            for _ in 0..depth {
                let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device);
                convs.push(conv);
                in_channels = out_channels;
            }
        }

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let avgpool = AdaptiveAvgPool2dConfig::new([config.pool_size, config.pool_size]).init();

        let hidden = config.width(FC_HIDDEN);
        let flat = in_channels * config.pool_size * config.pool_size;
        let fc1 = LinearConfig::new(flat, hidden).init(device);
        let fc2 = LinearConfig::new(hidden, hidden).init(device);
        let fc3 = LinearConfig::new(hidden, config.n_classes).init(device);

        Self {
            convs,
            pool,
            avgpool,
            fc1,
            fc2,
            fc3,
            input_size: config.input_size,
            n_classes: config.n_classes,
        }
    }
}

impl<B: Backend> InspectableModel<B> for Vgg16<B> {
    fn architecture(&self) -> Architecture {
        Architecture::Vgg16
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn conv_kernels(&self) -> Vec<(&'static str, Tensor<B, 4>)> {
        CONV_STAGES
            .iter()
            .zip(&self.convs)
            .map(|(&name, conv)| (name, conv.weight.val()))
            .collect()
    }

    fn forward_observed<O: StageObserver<B>>(
        &self,
        x: Tensor<B, 4>,
        observer: &mut O,
    ) -> Tensor<B, 2> {
        let mut out = x;
        let mut index = 0;
        for &(_, depth) in &GROUPS {
            for _ in 0..depth {
                let conv = relu(self.convs[index].forward(out));
                out = observer.observe_spatial(CONV_STAGES[index], conv);
                index += 1;
            }
            out = self.pool.forward(out);
        }

        let out = self.avgpool.forward(out);
        let out = out.flatten::<2>(1, 3);

        let out = observer.observe_flat("fc_1", relu(self.fc1.forward(out)));
        let out = observer.observe_flat("fc_2", relu(self.fc2.forward(out)));
        observer.observe_flat("fc_3", self.fc3.forward(out))
    }
}
