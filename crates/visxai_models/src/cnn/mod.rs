//! Convolutional image classifiers.

mod digit;
mod resnet;
mod vgg;

pub use digit::{DigitCnn, DigitCnnConfig};
pub use resnet::{Bottleneck, Downsample, FrozenBatchNorm2d, ResNet50, ResNet50Config};
pub use vgg::{Vgg16, Vgg16Config};
