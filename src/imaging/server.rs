//! Server-side extraction: decode the uploaded bytes once, crop by offset.
//!
//! The decoded raster is shared read-only by every rayon worker; each cell
//! is an independent `crop_imm` view copied out and encoded.

use super::backend::{EncodedCell, ExtractError, ExtractionBackend};
use super::codec::{decode_rgba, encode_rgba};
use super::params::Encoding;
use crate::grid::ImageBounds;
use crate::partition::PixelRect;
use image::RgbaImage;
use rayon::prelude::*;
use tracing::debug;

pub struct ServerBackend {
    decoded: RgbaImage,
}

impl ServerBackend {
    /// Decode the raw upload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtractError> {
        let decoded = decode_rgba(bytes)?;
        debug!(width = decoded.width(), height = decoded.height(), "decoded upload");
        Ok(Self { decoded })
    }

    pub fn decoded(&self) -> &RgbaImage {
        &self.decoded
    }
}

impl ExtractionBackend for ServerBackend {
    fn name(&self) -> &'static str {
        "server"
    }

    fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.decoded.width(), self.decoded.height())
    }

    fn extract(&self, cells: &[PixelRect], encoding: Encoding) -> Result<Vec<EncodedCell>, ExtractError> {
        debug!(backend = self.name(), cells = cells.len(), format = encoding.format.name(), "extracting");
        let bounds = self.bounds();
        cells
            .par_iter()
            .enumerate()
            .map(|(index, rect)| {
                if !rect.fits(bounds) {
                    return Err(ExtractError::OutOfBounds { index });
                }
                let crop = image::imageops::crop_imm(&self.decoded, rect.x, rect.y, rect.width, rect.height)
                    .to_image();
                let bytes = encode_rgba(&crop, encoding, index)?;
                Ok(EncodedCell {
                    index,
                    rect: *rect,
                    bytes,
                })
            })
            .collect()
    }
}
