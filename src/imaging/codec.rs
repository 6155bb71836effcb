//! Decode and encode helpers shared by both backends.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP) | `image::load_from_memory`, normalised to RGBA8 |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (RGB8, alpha dropped) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder::new_lossless` |
//!
//! Every source is normalised to RGBA8 on decode so the client and server
//! paths crop the same pixel values whatever the source colour type was.

use super::backend::ExtractError;
use super::params::{Encoding, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

/// Decode encoded image bytes into an RGBA8 raster.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Decode("empty input".into()));
    }
    image::load_from_memory(bytes)
        .map(DynamicImage::into_rgba8)
        .map_err(|e| ExtractError::Decode(e.to_string()))
}

/// Encode one cropped cell.
///
/// A zero-area cell encodes to an empty payload; no codec accepts zero
/// dimensions and the cell still has to occupy its slot in the sequence.
pub fn encode_rgba(img: &RgbaImage, encoding: Encoding, index: usize) -> Result<Vec<u8>, ExtractError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let mut buf = Vec::new();
    let result = match encoding.format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buf).write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        }
        OutputFormat::Webp => WebPEncoder::new_lossless(&mut buf).write_image(
            img.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut buf, encoding.quality.value() as u8).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
    };
    result.map_err(|e| ExtractError::Encode {
        index,
        message: e.to_string(),
    })?;
    Ok(buf)
}
