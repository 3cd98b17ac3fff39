//! Observation points inside a forward pass.
//!
//! Every inspectable network hands each named stage output to a
//! [`StageObserver`] and continues the evaluation with whatever tensor the
//! observer returns. Observers that only record return their input
//! unchanged; the gradient capture in `visxai_explain` returns a detached
//! leaf with the same values so the gradient of that exact tensor survives
//! the backward pass.

use burn::prelude::*;

/// A stage output: a spatial `(N, C, H, W)` map or a flat `(N, F)` vector.
#[derive(Debug, Clone)]
pub enum Activation<B: Backend> {
    /// Convolution / pooling / residual block output.
    Spatial(Tensor<B, 4>),
    /// Fully connected output.
    Flat(Tensor<B, 2>),
}

impl<B: Backend> Activation<B> {
    /// Dimensions of the underlying tensor.
    #[must_use]
    pub fn dims(&self) -> Vec<usize> {
        match self {
            Self::Spatial(t) => t.dims().to_vec(),
            Self::Flat(t) => t.dims().to_vec(),
        }
    }

    /// The spatial tensor, if this is a spatial activation.
    #[must_use]
    pub fn spatial(&self) -> Option<&Tensor<B, 4>> {
        match self {
            Self::Spatial(t) => Some(t),
            Self::Flat(_) => None,
        }
    }
}

/// Receives stage outputs during a forward pass.
pub trait StageObserver<B: Backend> {
    /// Observe a spatial stage output and return the tensor evaluation
    /// continues with.
    fn observe_spatial(&mut self, _stage: &'static str, x: Tensor<B, 4>) -> Tensor<B, 4> {
        x
    }

    /// Observe a flat stage output and return the tensor evaluation
    /// continues with.
    fn observe_flat(&mut self, _stage: &'static str, x: Tensor<B, 2>) -> Tensor<B, 2> {
        x
    }
}

/// Observer that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl<B: Backend> StageObserver<B> for NoCapture {}

/// Records the order in which stages fire. Used by tests and for logging
/// the stage plan of a network.
#[derive(Debug, Default, Clone)]
pub struct StageTrace {
    /// Stage names with the dimensions of their output.
    pub stages: Vec<(&'static str, Vec<usize>)>,
}

impl<B: Backend> StageObserver<B> for StageTrace {
    fn observe_spatial(&mut self, stage: &'static str, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.stages.push((stage, x.dims().to_vec()));
        x
    }

    fn observe_flat(&mut self, stage: &'static str, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.stages.push((stage, x.dims().to_vec()));
        x
    }
}
