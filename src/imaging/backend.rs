//! Extraction backend trait and shared types.
//!
//! The [`ExtractionBackend`] trait is the one contract both backends honour:
//! given an ordered list of [`PixelRect`]s, return one independently encoded
//! image per rectangle, in the same order, cropped exactly, with no scaling
//! and no padding.
//!
//! | Backend | Source | Crop |
//! |---|---|---|
//! | [`ClientBackend`](super::client::ClientBackend) | decoded RGBA image in memory | per-worker reusable surface, cleared before every draw |
//! | [`ServerBackend`](super::server::ServerBackend) | raw encoded bytes, decoded once | `crop_imm` by integer offsets |
//!
//! Extraction is all-or-nothing: the first failing cell fails the whole call
//! and no partial list is returned.

use super::params::Encoding;
use crate::grid::ImageBounds;
use crate::partition::PixelRect;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to decode source image: {0}")]
    Decode(String),
    #[error("Drawing surface unavailable: {0}")]
    Surface(String),
    #[error("Cell {index} lies outside the source image")]
    OutOfBounds { index: usize },
    #[error("Failed to encode cell {index}: {message}")]
    Encode { index: usize, message: String },
}

/// One extracted cell, ready for packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCell {
    /// Zero-based position in row-major order.
    pub index: usize,
    pub rect: PixelRect,
    /// Encoded image bytes. Empty for a zero-area cell.
    pub bytes: Vec<u8>,
}

/// Trait for cell extraction backends.
///
/// `Sync` so a backend can be shared by rayon workers.
pub trait ExtractionBackend: Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Dimensions of the source raster.
    fn bounds(&self) -> ImageBounds;

    /// Crop and encode every rectangle, preserving order.
    fn extract(&self, cells: &[PixelRect], encoding: Encoding) -> Result<Vec<EncodedCell>, ExtractError>;
}
