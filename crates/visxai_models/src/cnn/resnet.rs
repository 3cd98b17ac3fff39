//! ResNet50 image classifier.
//!
//! Stem (7×7 stride-2 convolution, batch norm, ReLU, 3×3 stride-2 max pool),
//! four groups of bottleneck blocks (`[3, 4, 6, 3]`), global average pooling
//! and a linear classifier. The observable stages are the outputs of the four
//! groups: `layer1`..`layer4`.

use burn::module::Param;
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

const STAGES: [&str; 4] = ["layer1", "layer2", "layer3", "layer4"];

/// Configuration for the ResNet50 model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResNet50Config {
    /// Number of output classes.
    pub n_classes: usize,
    /// Side length of the square RGB input.
    pub input_size: usize,
    /// Divides every channel width (1 = the standard network).
    pub width_divisor: usize,
    /// Blocks per group.
    pub blocks: [usize; 4],
    /// Channel expansion of the last bottleneck convolution.
    pub expansion: usize,
}

impl Default for ResNet50Config {
    fn default() -> Self {
        Self {
            n_classes: 1000,
            input_size: 224,
            width_divisor: 1,
            blocks: [3, 4, 6, 3],
            expansion: 4,
        }
    }
}

impl ResNet50Config {
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

    /// Set the number of blocks per group.
    #[must_use]
    pub fn with_blocks(mut self, blocks: [usize; 4]) -> Self {
        self.blocks = blocks;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.input_size < 32 {
            return Err(ModelError::InvalidConfig(format!(
                "ResNet50 input size must be at least 32, got {}",
                self.input_size
            )));
        }
        if self.n_classes == 0 || self.width_divisor == 0 || self.expansion == 0 {
            return Err(ModelError::InvalidConfig(
                "ResNet50 n_classes, width_divisor and expansion must be positive".to_string(),
            ));
        }
        if self.blocks.iter().any(|&b| b == 0) {
            return Err(ModelError::InvalidConfig(
                "every ResNet50 group needs at least one block".to_string(),
            ));
        }
        Ok(())
    }

    fn width(&self, channels: usize) -> usize {
        (channels / self.width_divisor.max(1)).max(1)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet50<B> {
        ResNet50::new(self.clone(), device)
    }
}

/// Batch normalization that always uses its stored running statistics.
///
/// `y = (x - running_mean) / sqrt(running_var + eps) * gamma + beta`,
/// whether or not the backend tracks gradients.
#[derive(Module, Debug)]
pub struct FrozenBatchNorm2d<B: Backend> {
    gamma: Param<Tensor<B, 1>>,
    beta: Param<Tensor<B, 1>>,
    running_mean: Param<Tensor<B, 1>>,
    running_var: Param<Tensor<B, 1>>,
    #[module(skip)]
    epsilon: f64,
}

impl<B: Backend> FrozenBatchNorm2d<B> {
    /// Identity statistics for `channels` channels.
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([channels], device)),
            beta: Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: Param::from_tensor(Tensor::zeros([channels], device)),
            running_var: Param::from_tensor(Tensor::ones([channels], device)),
            epsilon: 1e-5,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, c, _, _] = x.dims();
        let scale = self.gamma.val() / self.running_var.val().add_scalar(self.epsilon).sqrt();
        let shift = self.beta.val() - self.running_mean.val() * scale.clone();
        x * scale.reshape([1, c, 1, 1]) + shift.reshape([1, c, 1, 1])
    }
}

/// Projection shortcut: strided 1×1 convolution plus batch norm.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm2d<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_bias(false)
            .init(device);
        Self {
            conv,
            bn: FrozenBatchNorm2d::new(out_channels, device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Bottleneck residual block: 1×1 reduce, 3×3 (strided), 1×1 expand.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm2d<B>,
    conv2: Conv2d<B>,
    bn2: FrozenBatchNorm2d<B>,
    conv3: Conv2d<B>,
    bn3: FrozenBatchNorm2d<B>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    /// Create a new bottleneck block.
    pub fn new(
        in_channels: usize,
        width: usize,
        out_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, width], [1, 1])
            .with_bias(false)
            .init(device);
        let conv2 = Conv2dConfig::new([width, width], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let conv3 = Conv2dConfig::new([width, out_channels], [1, 1])
            .with_bias(false)
            .init(device);

        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(in_channels, out_channels, stride, device));

        Self {
            conv1,
            bn1: FrozenBatchNorm2d::new(width, device),
            conv2,
            bn2: FrozenBatchNorm2d::new(width, device),
            conv3,
            bn3: FrozenBatchNorm2d::new(out_channels, device),
            downsample,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None => x.clone(),
        };

        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = relu(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        relu(out + identity)
    }
}

/// ResNet50 classifier with observable block groups.
#[derive(Module, Debug)]
pub struct ResNet50<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_bn: FrozenBatchNorm2d<B>,
    stem_pool: MaxPool2d,
    groups: Vec<Vec<Bottleneck<B>>>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    n_classes: usize,
}

impl<B: Backend> ResNet50<B> {
    /// Create a new ResNet50 model.
    pub fn new(config: ResNet50Config, device: &B::Device) -> Self {
        let stem_channels = config.width(64);
        let stem_conv = Conv2dConfig::new([3, stem_channels], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let stem_pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut groups = Vec::with_capacity(4);
        let mut in_channels = stem_channels;
        for (i, &n_blocks) in config.blocks.iter().enumerate() {
            let width = config.width(64 << i);
            let out_channels = width * config.expansion;
            let first_stride = if i == 0 { 1 } else { 2 };

            let mut blocks = Vec::with_capacity(n_blocks);
            for j in 0..n_blocks {
                let stride = if j == 0 { first_stride } else { 1 };
                blocks.push(Bottleneck::new(in_channels, width, out_channels, stride, device));
                in_channels = out_channels;
            }
            groups.push(blocks);
        }

        Self {
            stem_conv,
            stem_bn: FrozenBatchNorm2d::new(stem_channels, device),
            stem_pool,
            groups,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(in_channels, config.n_classes).init(device),
            input_size: config.input_size,
            n_classes: config.n_classes,
        }
    }
}

impl<B: Backend> InspectableModel<B> for ResNet50<B> {
    fn architecture(&self) -> Architecture {
        Architecture::ResNet50
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Only the 7×7 stem convolution; bottleneck kernels are mostly 1×1.
    fn conv_kernels(&self) -> Vec<(&'static str, Tensor<B, 4>)> {
        vec![("stem", self.stem_conv.weight.val())]
    }

    fn forward_observed<O: StageObserver<B>>(
        &self,
        x: Tensor<B, 4>,
        observer: &mut O,
    ) -> Tensor<B, 2> {
        let out = relu(self.stem_bn.forward(self.stem_conv.forward(x)));
        let mut out = self.stem_pool.forward(out);

        for (&stage, blocks) in STAGES.iter().zip(&self.groups) {
            for block in blocks {
                out = block.forward(out);
            }
            out = observer.observe_spatial(stage, out);
        }

        let out = self.avgpool.forward(out);
        self.fc.forward(out.flatten::<2>(1, 3))
    }
}
