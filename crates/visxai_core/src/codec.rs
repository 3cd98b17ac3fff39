//! Base64 / data-URI image decoding and PNG data-URI encoding.
//!
//! Clients send images as base64 PNG or JPEG, optionally wrapped in a
//! `data:image/...;base64,` prefix. Every image this backend returns is a
//! `data:image/png;base64,...` string.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::error::{CoreError, Result};

/// Prefix of every image returned to clients.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Strip an optional data-URI header.
///
/// Everything up to and including the first comma is dropped, so both
/// `"data:image/jpeg;base64,AAAA"` and `"AAAA"` yield `"AAAA"`.
#[must_use]
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, body)) => body,
        None => payload,
    }
}

/// Decode a base64 (or data-URI) payload into raw bytes.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let body = strip_data_uri(payload.trim()).trim();
    if body.is_empty() {
        return Err(CoreError::EmptyImage("no image data provided".to_string()));
    }
    Ok(BASE64_STANDARD.decode(body)?)
}

/// Decode a base64 (or data-URI) payload into an image.
pub fn decode_image(payload: &str) -> Result<DynamicImage> {
    let bytes = decode_base64(payload)?;
    image::load_from_memory(&bytes).map_err(CoreError::ImageDecode)
}

/// Wrap raw PNG bytes into a data URI.
#[must_use]
pub fn png_data_uri(png: &[u8]) -> String {
    format!("{PNG_DATA_URI_PREFIX}{}", BASE64_STANDARD.encode(png))
}

/// Encode a grayscale image as a PNG data URI.
pub fn gray_png_data_uri(image: &GrayImage) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(CoreError::ImageEncode)?;
    Ok(png_data_uri(buffer.get_ref()))
}

/// Encode an RGB image as a PNG data URI.
pub fn rgb_png_data_uri(image: &RgbImage) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(CoreError::ImageEncode)?;
    Ok(png_data_uri(buffer.get_ref()))
}
