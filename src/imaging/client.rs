//! Client-side extraction: rasterize cells from an image already in memory.
//!
//! Each cell is drawn onto a [`Surface`] that is resized to the cell, fully
//! cleared, and then filled from the source at the cell's offset. A surface
//! is mutated by every draw, so it is never shared: rayon's `map_init` hands
//! each worker its own.

use super::backend::{EncodedCell, ExtractError, ExtractionBackend};
use super::codec::encode_rgba;
use super::params::Encoding;
use crate::grid::ImageBounds;
use crate::partition::PixelRect;
use image::{GenericImageView, Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

/// Largest surface the client will allocate, in pixels (16384 × 16384).
pub const MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

/// Reusable drawing surface.
#[derive(Debug)]
pub struct Surface {
    buffer: RgbaImage,
    max_pixels: u64,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(MAX_SURFACE_PIXELS)
    }
}

impl Surface {
    pub fn new(max_pixels: u64) -> Self {
        Self {
            buffer: RgbaImage::new(0, 0),
            max_pixels,
        }
    }

    /// Resize to exactly `width` × `height`.
    ///
    /// Fails when the area exceeds the surface limit.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ExtractError> {
        let area = width as u64 * height as u64;
        if area > self.max_pixels {
            return Err(ExtractError::Surface(format!(
                "{width}x{height} exceeds the {} pixel limit",
                self.max_pixels
            )));
        }
        if self.buffer.dimensions() != (width, height) {
            self.buffer = RgbaImage::new(width, height);
        }
        Ok(())
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        for pixel in self.buffer.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Copy `rect` of `source` to the surface origin.
    pub fn draw(&mut self, source: &RgbaImage, rect: PixelRect) {
        let view = source.view(rect.x, rect.y, rect.width, rect.height);
        image::imageops::replace(&mut self.buffer, &*view, 0, 0);
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.buffer
    }
}

/// Client backend over a decoded RGBA image.
pub struct ClientBackend<'a> {
    source: &'a RgbaImage,
    max_surface_pixels: u64,
}

impl<'a> ClientBackend<'a> {
    pub fn new(source: &'a RgbaImage) -> Self {
        Self {
            source,
            max_surface_pixels: MAX_SURFACE_PIXELS,
        }
    }

    /// Override the surface limit.
    pub fn with_surface_limit(mut self, max_pixels: u64) -> Self {
        self.max_surface_pixels = max_pixels;
        self
    }

    fn render_cell(
        &self,
        surface: &mut Surface,
        index: usize,
        rect: PixelRect,
        encoding: Encoding,
    ) -> Result<EncodedCell, ExtractError> {
        if !rect.fits(self.bounds()) {
            return Err(ExtractError::OutOfBounds { index });
        }
        surface.resize(rect.width, rect.height)?;
        surface.clear();
        if !rect.is_empty() {
            surface.draw(self.source, rect);
        }
        let bytes = encode_rgba(surface.pixels(), encoding, index)?;
        Ok(EncodedCell { index, rect, bytes })
    }
}

impl ExtractionBackend for ClientBackend<'_> {
    fn name(&self) -> &'static str {
        "client"
    }

    fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.source.width(), self.source.height())
    }

    fn extract(&self, cells: &[PixelRect], encoding: Encoding) -> Result<Vec<EncodedCell>, ExtractError> {
        debug!(backend = self.name(), cells = cells.len(), format = encoding.format.name(), "extracting");
        cells
            .par_iter()
            .enumerate()
            .map_init(
                || Surface::new(self.max_surface_pixels),
                |surface, (index, rect)| self.render_cell(surface, index, *rect, encoding),
            )
            .collect()
    }
}
