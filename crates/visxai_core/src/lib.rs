//! # visxai_core
//!
//! Core types shared by the visxai crates.
//!
//! This crate provides:
//! - [`CoreError`] and the crate [`Result`] alias
//! - [`codec`]: base64 / data-URI image decoding and PNG data-URI encoding
//! - [`render`]: min-max normalization of activations into grayscale images and
//!   the jet-like heatmap colormap
//! - [`resample`]: bilinear and nearest-neighbour resizing of 2D maps
//! - [`PixelTensor`]: decoded images as channel-first `[0, 1]` pixel buffers
//! - [`Seed`] for deterministic weight initialization and synthetic inputs
//!
//! ## Layout Convention
//!
//! Images and activations follow the channel-first convention `(N, C, H, W)`:
//! - `N`: Batch size (always 1 for a single request)
//! - `C`: Channels / feature planes
//! - `H`, `W`: Spatial height and width
//!
//! ## Example
//!
//! ```rust,ignore
//! use visxai_core::{codec, render};
//!
//! let map = ndarray::Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 2.0, 3.0])?;
//! let uri = codec::gray_png_data_uri(&render::to_gray_image(map.view()))?;
//! assert!(uri.starts_with("data:image/png;base64,"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
mod error;
pub mod render;
pub mod resample;
mod seed;
mod tensor;

pub use error::{CoreError, Result};
pub use seed::Seed;
pub use tensor::{tensor_values, PixelTensor};

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    /// CPU backend with automatic differentiation, used for Grad-CAM and
    /// adversarial gradients.
    #[cfg(feature = "backend-ndarray")]
    pub type AutodiffNdArray = burn_autodiff::Autodiff<burn_ndarray::NdArray>;
}
