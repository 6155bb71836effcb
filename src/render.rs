//! Paints the source image with its grid lines.
//!
//! The renderer owns one RGBA surface and repaints it from scratch on every
//! frame: clear, draw the source at natural size, then stroke each line
//! across the full surface. Output depends only on the source, the line set
//! and the [`InteractionState`].

use crate::grid::GridLine;
use crate::interaction::InteractionState;
use image::{Rgba, RgbaImage};

/// Stroke appearance for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStyle {
    pub color: Rgba<u8>,
    /// Stroke width in raster pixels, centred on the line position.
    pub thickness: u32,
}

/// Styles for the three line states. Active wins over hovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTheme {
    pub idle: LineStyle,
    pub hovered: LineStyle,
    pub active: LineStyle,
}

impl Default for LineTheme {
    fn default() -> Self {
        Self {
            idle: LineStyle {
                color: Rgba([255, 48, 48, 255]),
                thickness: 1,
            },
            hovered: LineStyle {
                color: Rgba([255, 190, 0, 255]),
                thickness: 3,
            },
            active: LineStyle {
                color: Rgba([0, 140, 255, 255]),
                thickness: 3,
            },
        }
    }
}

impl LineTheme {
    /// Pick the style for line `index`.
    pub fn style_for(&self, index: usize, state: &InteractionState) -> LineStyle {
        if state.active == Some(index) {
            self.active
        } else if state.hovered == Some(index) {
            self.hovered
        } else {
            self.idle
        }
    }
}

#[derive(Debug, Default)]
pub struct Renderer {
    surface: RgbaImage,
    theme: LineTheme,
}

impl Renderer {
    pub fn new(theme: LineTheme) -> Self {
        Self {
            surface: RgbaImage::new(0, 0),
            theme,
        }
    }

    pub fn theme(&self) -> &LineTheme {
        &self.theme
    }

    /// Paint one frame and return the surface.
    pub fn paint(&mut self, source: &RgbaImage, lines: &[GridLine], state: &InteractionState) -> &RgbaImage {
        if self.surface.dimensions() != source.dimensions() {
            self.surface = RgbaImage::new(source.width(), source.height());
        }
        for pixel in self.surface.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }

        image::imageops::replace(&mut self.surface, source, 0, 0);

        for (index, line) in lines.iter().enumerate() {
            let style = self.theme.style_for(index, state);
            stroke(&mut self.surface, line, style);
        }
        &self.surface
    }
}

/// Stroke a full-width (horizontal) or full-height (vertical) band.
fn stroke(surface: &mut RgbaImage, line: &GridLine, style: LineStyle) {
    let (width, height) = surface.dimensions();
    let extent = if line.is_horizontal { height } else { width };
    let Some(span) = band(line.position, style.thickness, extent) else {
        return;
    };

    for offset in span {
        if line.is_horizontal {
            for x in 0..width {
                surface.put_pixel(x, offset, style.color);
            }
        } else {
            for y in 0..height {
                surface.put_pixel(offset, y, style.color);
            }
        }
    }
}

/// Pixel rows/columns covered by a stroke, clipped to `[0, extent)`.
///
/// A line sitting exactly on the far edge still paints the last pixel.
fn band(position: f64, thickness: u32, extent: u32) -> Option<std::ops::Range<u32>> {
    if extent == 0 || thickness == 0 {
        return None;
    }
    let start = (position - thickness as f64 / 2.0).floor() as i64;
    let end = start + thickness as i64;
    let start = start.clamp(0, extent as i64 - 1) as u32;
    let end = end.clamp(start as i64 + 1, extent as i64) as u32;
    Some(start..end)
}
