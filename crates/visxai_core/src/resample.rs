//! Resizing of 2D maps.
//!
//! Bilinear resampling uses half-pixel centers without corner alignment:
//! destination pixel `d` samples source coordinate `(d + 0.5) * in / out - 0.5`,
//! clamped to the source grid.

use ndarray::{Array2, ArrayView2};

use crate::error::{CoreError, Result};

/// Source coordinates and weight for one destination index.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

fn taps(in_len: usize, out_len: usize) -> Vec<Tap> {
    let scale = in_len as f32 / out_len as f32;
    (0..out_len)
        .map(|d| {
            let src = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (src.floor() as usize).min(in_len - 1);
            let hi = (lo + 1).min(in_len - 1);
            Tap {
                lo,
                hi,
                frac: src - lo as f32,
            }
        })
        .collect()
}

/// Bilinear resize of a 2D map to `(out_h, out_w)`.
///
/// An empty source or target yields an all-zero map of the target size.
#[must_use]
pub fn bilinear(src: ArrayView2<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Array2::zeros((out_h, out_w));
    }
    if (in_h, in_w) == (out_h, out_w) {
        return src.to_owned();
    }

    let rows = taps(in_h, out_h);
    let cols = taps(in_w, out_w);

    Array2::from_shape_fn((out_h, out_w), |(y, x)| {
        let r = rows[y];
        let c = cols[x];
        let top = src[[r.lo, c.lo]] * (1.0 - c.frac) + src[[r.lo, c.hi]] * c.frac;
        let bottom = src[[r.hi, c.lo]] * (1.0 - c.frac) + src[[r.hi, c.hi]] * c.frac;
        top * (1.0 - r.frac) + bottom * r.frac
    })
}

/// Bilinear resize of every plane of a channel-first buffer.
///
/// `data` holds `channels` planes of `in_h × in_w` values; the result holds
/// the same number of planes of `out_h × out_w`.
pub fn bilinear_planes(
    data: &[f32],
    channels: usize,
    (in_h, in_w): (usize, usize),
    (out_h, out_w): (usize, usize),
) -> Result<Vec<f32>> {
    let plane = in_h * in_w;
    if data.len() != channels * plane {
        return Err(CoreError::InvalidShape {
            expected: format!("{channels} planes of {in_h}x{in_w}"),
            got: format!("{} values", data.len()),
        });
    }
    let mut out = Vec::with_capacity(channels * out_h * out_w);
    for c in 0..channels {
        let start = c * plane;
        let view = ArrayView2::from_shape((in_h, in_w), &data[start..start + plane]).map_err(|e| {
            CoreError::InvalidShape {
                expected: format!("{in_h}x{in_w}"),
                got: e.to_string(),
            }
        })?;
        out.extend(bilinear(view, out_h, out_w).iter().copied());
    }
    Ok(out)
}

/// Nearest-neighbour resize of a grayscale image, used to enlarge small
/// feature maps for display.
#[must_use]
pub fn nearest_gray(image: &image::GrayImage, width: u32, height: u32) -> image::GrayImage {
    image::imageops::resize(image, width, height, image::imageops::FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_identity_size() {
        let src = array![[1.0f32, 2.0], [3.0, 4.0]];
        assert_eq!(bilinear(src.view(), 2, 2), src);
    }

    #[test]
    fn test_upsample_two_by_two() {
        // Matches half-pixel bilinear upsampling without corner alignment.
        let src = array![[0.0f32, 1.0], [2.0, 3.0]];
        let out = bilinear(src.view(), 4, 4);
        assert_eq!(out.dim(), (4, 4));
        assert!((out[[0, 0]] - 0.0).abs() < 1e-6);
        assert!((out[[0, 1]] - 0.25).abs() < 1e-6);
        assert!((out[[0, 2]] - 0.75).abs() < 1e-6);
        assert!((out[[0, 3]] - 1.0).abs() < 1e-6);
        assert!((out[[3, 3]] - 3.0).abs() < 1e-6);
        assert!((out[[1, 1]] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_upsample_single_pixel_is_constant() {
        let src = array![[5.0f32]];
        let out = bilinear(src.view(), 7, 3);
        assert!(out.iter().all(|&v| (v - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_downsample_stays_in_range() {
        let src = Array2::from_shape_fn((9, 9), |(y, x)| (y * 9 + x) as f32);
        let out = bilinear(src.view(), 3, 3);
        assert!(out.iter().all(|&v| (0.0..=80.0).contains(&v)));
    }

    #[test]
    fn test_bilinear_planes() {
        let data = vec![1.0f32, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let out = bilinear_planes(&data, 2, (2, 2), (3, 3)).unwrap();
        assert_eq!(out.len(), 18);
        assert!(out[..9].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(out[9..].iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_bilinear_planes_rejects_bad_length() {
        assert!(bilinear_planes(&[1.0, 2.0, 3.0], 1, (2, 2), (4, 4)).is_err());
    }

    #[test]
    fn test_nearest_gray() {
        let image = image::GrayImage::from_fn(2, 2, |x, y| image::Luma([(x + 2 * y) as u8 * 50]));
        let big = nearest_gray(&image, 64, 64);
        assert_eq!(big.dimensions(), (64, 64));
        assert_eq!(big.get_pixel(0, 0).0[0], 0);
        assert_eq!(big.get_pixel(63, 63).0[0], 150);
    }
}
