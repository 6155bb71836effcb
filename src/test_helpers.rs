//! Shared test utilities for the grid-split test suite.
//!
//! Images are synthesized in memory so tests need no fixture files. The
//! gradient encodes each pixel's coordinates in its colour, which makes any
//! off-by-one crop visible in an equality assertion.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let source = gradient(300, 300);
//! let bytes = png_bytes(&source);
//! let names = archive_names(&zip_bytes);
//! ```

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::{Cursor, Read};

// =========================================================================
// Image fixtures
// =========================================================================

/// An image whose pixel at `(x, y)` is `[x, y, x ^ y, 255]` (wrapping at 256).
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 255])
    })
}

/// PNG-encode an image, as an upload would arrive.
pub fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

// =========================================================================
// Archive readers (panic with a clear message on malformed input)
// =========================================================================

/// Entry names of a ZIP archive in stored order.
pub fn archive_names(bytes: &[u8]) -> Vec<String> {
    archive_entries(bytes).into_iter().map(|(name, _)| name).collect()
}

/// Contents of every entry of a ZIP archive, in stored order.
pub fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("archive should open");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).expect("entry should be readable");
            let mut data = Vec::new();
            entry.read_to_end(&mut data).expect("entry should decompress");
            (entry.name().to_string(), data)
        })
        .collect()
}
