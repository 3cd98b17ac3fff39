//! # visxai_models
//!
//! Inspectable image classifiers built on Burn.
//!
//! ## Networks
//! - [`Vgg16`] - 13 convolutions and 3 fully connected layers
//! - [`ResNet50`] - bottleneck residual network
//! - [`DigitCnn`] - two-convolution 28×28 digit classifier
//!
//! Every network implements [`InspectableModel`]: its forward pass hands each
//! named stage output to a [`StageObserver`], in the order given by
//! [`Architecture::layer_order`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod architecture;
pub mod checkpoint;
pub mod cnn;
mod error;
pub mod labels;
pub mod stage;
pub mod traits;

pub use architecture::{Architecture, Normalization};
pub use checkpoint::{load_weights, maybe_load_weights, save_weights};
pub use cnn::*;
pub use error::{ModelError, Result};
pub use labels::ClassLabels;
pub use stage::{Activation, NoCapture, StageObserver, StageTrace};
pub use traits::InspectableModel;
