//! Rendering of raw activations into displayable images.
//!
//! Feature maps are min-max normalized over the whole map (not per row),
//! scaled to `[0, 255]` and truncated to bytes. Vectors (fully connected
//! outputs) are laid out row-major on the smallest square grid that holds
//! them, padded with zeros.

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array2, ArrayView2};

/// Ranges narrower than this are treated as constant maps.
pub const RANGE_EPSILON: f32 = 1e-8;

/// Value substituted for every cell of a constant map.
pub const DEGENERATE_FILL: f32 = 0.5;

/// Lay out a vector on a near-square grid.
///
/// A vector of length `L` becomes an `s × s` grid with `s = ceil(sqrt(L))`;
/// cells past `L` stay zero. An empty vector yields a single zero cell.
#[must_use]
pub fn vector_to_grid(values: &[f32]) -> Array2<f32> {
    let side = (values.len() as f64).sqrt().ceil().max(1.0) as usize;
    let mut grid = Array2::<f32>::zeros((side, side));
    for (cell, &value) in grid.iter_mut().zip(values) {
        *cell = value;
    }
    grid
}

/// Min and max of a slice, ignoring NaN.
#[must_use]
pub fn min_max(values: &[f32]) -> (f32, f32) {
    values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Min-max normalize values into `[0, 1]` in place.
///
/// When the range collapses (`max - min < 1e-8`) every value becomes `0.5`
/// instead, so constant maps render as uniform mid-gray and never as NaN.
pub fn normalize_unit_in_place(values: &mut [f32]) {
    let (min, max) = min_max(values);
    let range = max - min;
    if !(range >= RANGE_EPSILON) {
        values.fill(DEGENERATE_FILL);
        return;
    }
    for value in values.iter_mut() {
        *value = (*value - min) / range;
    }
}

/// Min-max normalize a 2D map into `[0, 1]`.
#[must_use]
pub fn normalize_unit(map: ArrayView2<f32>) -> Array2<f32> {
    let mut out = map.to_owned();
    match out.as_slice_mut() {
        Some(values) => normalize_unit_in_place(values),
        None => {
            let mut values: Vec<f32> = out.iter().copied().collect();
            normalize_unit_in_place(&mut values);
            for (cell, value) in out.iter_mut().zip(values) {
                *cell = value;
            }
        }
    }
    out
}

/// Scale a `[0, 1]` value to a byte, truncating.
#[inline]
#[must_use]
pub fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Normalize a 2D map and render it as a grayscale image.
#[must_use]
pub fn to_gray_image(map: ArrayView2<f32>) -> GrayImage {
    let normalized = normalize_unit(map);
    let (rows, cols) = normalized.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([unit_to_byte(normalized[[y as usize, x as usize]])])
    })
}

/// Jet-like colormap: blue → cyan → green → yellow → red.
///
/// Four linear segments with breakpoints at 0, 0.25, 0.5, 0.75 and 1.0.
#[must_use]
pub fn jet(value: f32) -> Rgb<u8> {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let ramp = |t: f32| (t * 255.0) as u8;
    if v < 0.25 {
        Rgb([0, ramp(v * 4.0), 255])
    } else if v < 0.5 {
        Rgb([0, 255, ramp(1.0 - (v - 0.25) * 4.0)])
    } else if v < 0.75 {
        Rgb([ramp((v - 0.5) * 4.0), 255, 0])
    } else {
        Rgb([255, ramp(1.0 - (v - 0.75) * 4.0), 0])
    }
}

/// Render an already normalized `[0, 1]` map through the [`jet`] colormap.
#[must_use]
pub fn colorize(map: ArrayView2<f32>) -> RgbImage {
    let (rows, cols) = map.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| jet(map[[y as usize, x as usize]]))
}
