//! Common trait for inspectable networks.

use burn::prelude::*;

use crate::architecture::Architecture;
use crate::stage::{NoCapture, StageObserver};

/// A classifier whose named stages can be observed during a forward pass.
pub trait InspectableModel<B: Backend>: Module<B> {
    /// Architecture of this network.
    fn architecture(&self) -> Architecture;

    /// Side length of the square input.
    fn input_size(&self) -> usize;

    /// Number of output classes.
    fn n_classes(&self) -> usize;

    /// Number of input channels.
    fn input_channels(&self) -> usize {
        self.architecture().normalization().channels()
    }

    /// Convolution weights `(out, in, kh, kw)` under their stage names, in
    /// evaluation order.
    fn conv_kernels(&self) -> Vec<(&'static str, Tensor<B, 4>)>;

    /// Forward a normalized `(N, C, H, W)` batch to logits `(N, n_classes)`,
    /// handing each named stage output to `observer`.
    fn forward_observed<O: StageObserver<B>>(
        &self,
        x: Tensor<B, 4>,
        observer: &mut O,
    ) -> Tensor<B, 2>;

    /// Forward a normalized batch without observation.
    fn forward_logits(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_observed(x, &mut NoCapture)
    }

    /// Forward a `[0, 1]` pixel batch: applies the architecture's
    /// normalization inside the graph first.
    fn forward_pixels_observed<O: StageObserver<B>>(
        &self,
        pixels: Tensor<B, 4>,
        observer: &mut O,
    ) -> Tensor<B, 2> {
        let x = self.architecture().normalization().apply(pixels);
        self.forward_observed(x, observer)
    }
}
