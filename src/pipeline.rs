//! The split pipeline: validate → partition → extract → package.
//!
//! ```text
//! Layout ──resolve_cells──▶ [PixelRect] ──backend.extract──▶ [EncodedCell] ──pack──▶ Archive
//! ```
//!
//! Both extraction paths go through [`resolve_cells`], so for the same
//! layout and image they receive the exact same rectangle sequence. Every
//! stage is all-or-nothing; an error at any point returns no cells and no
//! archive.
//!
//! ## Error taxonomy
//!
//! | Stage | Error | Reason code |
//! |---|---|---|
//! | Input | [`InputError`] | `invalid_input` |
//! | Decode / draw | [`ExtractError`] | `decode_failed`, `surface_unavailable`, `encode_failed` |
//! | Packaging | [`ArchiveError`] | `packaging_failed` |

use crate::archive::{self, Archive, ArchiveError};
use crate::grid::{GridLine, ImageBounds};
use crate::imaging::{ClientBackend, EncodedCell, Encoding, ExtractError, ExtractionBackend, ServerBackend};
use crate::partition::{PixelRect, pixel_cells, uniform_cells};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("No image data supplied")]
    MissingImage,
    #[error("Grid must have at least one row and one column (got {rows}x{columns})")]
    InvalidGrid { rows: u32, columns: u32 },
    #[error("Cell {index} has no area")]
    EmptyCell { index: usize },
    #[error("Cell {index} lies outside the {width}x{height} image")]
    OutOfBounds { index: usize, width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("Packaging failed: {0}")]
    Packaging(#[from] ArchiveError),
}

impl SplitError {
    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            SplitError::Input(_) | SplitError::Extraction(ExtractError::OutOfBounds { .. }) => "invalid_input",
            SplitError::Extraction(ExtractError::Decode(_)) => "decode_failed",
            SplitError::Extraction(ExtractError::Surface(_)) => "surface_unavailable",
            SplitError::Extraction(ExtractError::Encode { .. }) => "encode_failed",
            SplitError::Packaging(_) => "packaging_failed",
        }
    }

    /// True when the caller sent something unusable rather than the
    /// extraction itself breaking.
    pub fn is_caller_fault(&self) -> bool {
        matches!(self.reason(), "invalid_input" | "decode_failed")
    }
}

/// Which cells to cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Uniform `floor(width / columns)` × `floor(height / rows)` cells.
    Uniform { rows: u32, columns: u32 },
    /// Custom line positions; tiles the image exactly.
    Lines(Vec<GridLine>),
    /// An explicit rectangle list, used as given.
    Cells(Vec<PixelRect>),
}

/// Knobs shared by both paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOptions {
    pub encoding: Encoding,
    /// Reject zero-area cells instead of emitting empty entries.
    pub strict: bool,
    /// Download name; `None` uses the default.
    pub filename: Option<String>,
}

/// Reject grids with no rows or no columns.
pub fn validate_grid(rows: u32, columns: u32) -> Result<(), InputError> {
    if rows == 0 || columns == 0 {
        return Err(InputError::InvalidGrid { rows, columns });
    }
    Ok(())
}

/// Check every rectangle lies inside the image, and has area when `strict`.
pub fn validate_cells(cells: &[PixelRect], bounds: ImageBounds, strict: bool) -> Result<(), InputError> {
    for (index, cell) in cells.iter().enumerate() {
        if !cell.fits(bounds) {
            return Err(InputError::OutOfBounds {
                index,
                width: bounds.width,
                height: bounds.height,
            });
        }
        if strict && cell.is_empty() {
            return Err(InputError::EmptyCell { index });
        }
    }
    Ok(())
}

/// Turn a layout into the validated rectangle sequence for `bounds`.
pub fn resolve_cells(layout: &Layout, bounds: ImageBounds, strict: bool) -> Result<Vec<PixelRect>, InputError> {
    let cells = match layout {
        Layout::Uniform { rows, columns } => {
            validate_grid(*rows, *columns)?;
            uniform_cells(*rows, *columns, bounds)
        }
        Layout::Lines(lines) => pixel_cells(lines, bounds),
        Layout::Cells(cells) => cells.clone(),
    };
    validate_cells(&cells, bounds, strict)?;
    Ok(cells)
}

/// Resolve the layout against the backend's image and extract every cell.
pub fn extract_with(
    backend: &impl ExtractionBackend,
    layout: &Layout,
    options: &SplitOptions,
) -> Result<Vec<EncodedCell>, SplitError> {
    let cells = resolve_cells(layout, backend.bounds(), options.strict)?;
    let encoded = backend.extract(&cells, options.encoding)?;
    info!(backend = backend.name(), cells = encoded.len(), "extraction complete");
    Ok(encoded)
}

/// Client path: extract from an already-decoded image.
pub fn split_local(image: &RgbaImage, layout: &Layout, options: &SplitOptions) -> Result<Vec<EncodedCell>, SplitError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(InputError::MissingImage.into());
    }
    extract_with(&ClientBackend::new(image), layout, options)
}

/// Server path: decode the raw bytes once, extract, and package.
pub fn split_bytes(bytes: &[u8], layout: &Layout, options: &SplitOptions) -> Result<Archive, SplitError> {
    if bytes.is_empty() {
        return Err(InputError::MissingImage.into());
    }
    let backend = ServerBackend::from_bytes(bytes)?;
    let cells = extract_with(&backend, layout, options)?;
    package(&cells, options)
}

/// Package extracted cells. Failures here are reported as packaging errors
/// so callers know the extraction itself succeeded.
pub fn package(cells: &[EncodedCell], options: &SplitOptions) -> Result<Archive, SplitError> {
    archive::pack(cells, options.encoding.format, options.filename.as_deref()).map_err(|e| {
        warn!(error = %e, "packaging failed after successful extraction");
        SplitError::Packaging(e)
    })
}
