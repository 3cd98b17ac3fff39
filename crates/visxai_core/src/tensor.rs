//! Pixel buffers and tensor extraction.

use burn::prelude::*;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{CoreError, Result};
use crate::render::unit_to_byte;

/// Read every value of a tensor into a host vector, in row-major order.
pub fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| CoreError::TensorData(format!("{e:?}")))
}

/// A decoded image as a channel-first buffer of `[0, 1]` pixel values.
///
/// This is the "pixel space" of the pipeline: per-model mean/std
/// normalization happens later, inside the differentiated graph, so
/// adversarial perturbations stay bounded in these units.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTensor {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl PixelTensor {
    /// Create from raw channel-first values.
    ///
    /// # Errors
    ///
    /// Returns an error if `data.len() != channels * height * width`.
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != channels * height * width {
            return Err(CoreError::InvalidShape {
                expected: format!(
                    "{channels}x{height}x{width} = {} values",
                    channels * height * width
                ),
                got: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// ImageNet-style preprocessing: resize the shorter side to
    /// `size * 256 / 224`, then center-crop a `size × size` RGB square.
    #[must_use]
    pub fn from_image_center_crop(image: &DynamicImage, size: u32) -> Self {
        let rgb = image.to_rgb8();
        let (w, h) = rgb.dimensions();
        let short_target = (size as f32 * 256.0 / 224.0).round().max(size as f32) as u32;

        let (new_w, new_h) = if w <= h {
            let scaled = (h as f32 * short_target as f32 / w.max(1) as f32) as u32;
            (short_target, scaled.max(size))
        } else {
            let scaled = (w as f32 * short_target as f32 / h.max(1) as f32) as u32;
            (scaled.max(size), short_target)
        };
        let resized = image::imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

        let left = ((new_w - size) as f32 / 2.0).round() as u32;
        let top = ((new_h - size) as f32 / 2.0).round() as u32;
        let cropped = image::imageops::crop_imm(&resized, left, top, size, size).to_image();

        Self::from_rgb(&cropped)
    }

    /// Resize to exactly `size × size` single-channel luminance.
    #[must_use]
    pub fn from_image_gray(image: &DynamicImage, size: u32) -> Self {
        let gray = image
            .resize_exact(size, size, FilterType::Triangle)
            .to_luma8();
        let data = gray.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        Self {
            channels: 1,
            height: size as usize,
            width: size as usize,
            data,
        }
    }

    /// Convert an RGB image without resizing.
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (w, h) = image.dimensions();
        let (w, h) = (w as usize, h as usize);
        let mut data = vec![0.0f32; 3 * h * w];
        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                data[c * h * w + y * w + x] = pixel.0[c] as f32 / 255.0;
            }
        }
        Self {
            channels: 3,
            height: h,
            width: w,
            data,
        }
    }

    /// Read a `[1, C, H, W]` tensor back into pixel space.
    pub fn from_tensor<B: Backend>(tensor: Tensor<B, 4>) -> Result<Self> {
        let [n, c, h, w] = tensor.dims();
        if n != 1 {
            return Err(CoreError::InvalidShape {
                expected: "batch of 1".to_string(),
                got: format!("batch of {n}"),
            });
        }
        Self::new(c, h, w, tensor_values(tensor)?)
    }

    /// Number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Raw channel-first values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Build a `[1, C, H, W]` tensor on `device`.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let data = TensorData::new(self.data.clone(), [1, self.channels, self.height, self.width]);
        Tensor::from_data(data, device)
    }

    /// Render as an RGB image; single-channel buffers are replicated to gray.
    #[must_use]
    pub fn to_rgb_image(&self) -> RgbImage {
        let plane = self.height * self.width;
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let offset = y as usize * self.width + x as usize;
            let channel = |c: usize| {
                let c = c.min(self.channels.saturating_sub(1));
                unit_to_byte(self.data[c * plane + offset])
            };
            Rgb([channel(0), channel(1), channel(2)])
        })
    }

    /// Largest absolute per-value difference to another buffer of the same shape.
    pub fn max_abs_diff(&self, other: &Self) -> Result<f32> {
        if (self.channels, self.height, self.width) != (other.channels, other.height, other.width) {
            return Err(CoreError::InvalidShape {
                expected: format!("{}x{}x{}", self.channels, self.height, self.width),
                got: format!("{}x{}x{}", other.channels, other.height, other.width),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .fold(0.0f32, |acc, (a, b)| acc.max((a - b).abs())))
    }
}
