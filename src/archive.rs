//! Archive packager: ordered cell images → one ZIP file.
//!
//! Entries are named `image_<n>.<ext>`, 1-indexed in extraction order. The
//! archive is assembled in memory and only handed back once every entry and
//! the central directory have been written, so a failure never leaves a
//! truncated archive behind.
//!
//! Entries are stored, not deflated: PNG, JPEG and WebP payloads are already
//! compressed.

use crate::imaging::{EncodedCell, OutputFormat};
use std::io::{Cursor, Write};
use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default download name when the caller supplies none.
pub const DEFAULT_ARCHIVE_NAME: &str = "split-images.zip";

/// MIME type of the packaged artifact.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished archive plus the name it should be downloaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub entries: usize,
}

/// Name of the `n`th entry (1-indexed).
pub fn entry_name(n: usize, format: OutputFormat) -> String {
    format!("image_{n}.{}", format.extension())
}

/// Resolve the download name, falling back to [`DEFAULT_ARCHIVE_NAME`].
///
/// A name without an extension gets `.zip` appended.
pub fn archive_filename(requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(name) if !name.is_empty() => {
            if name.to_ascii_lowercase().ends_with(".zip") {
                name.to_string()
            } else {
                format!("{name}.zip")
            }
        }
        _ => DEFAULT_ARCHIVE_NAME.to_string(),
    }
}

/// Pack encoded cells, in the order given, into a ZIP archive.
pub fn pack(cells: &[EncodedCell], format: OutputFormat, filename: Option<&str>) -> Result<Archive, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (i, cell) in cells.iter().enumerate() {
        zip.start_file(entry_name(i + 1, format), options)?;
        zip.write_all(&cell.bytes)?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(entries = cells.len(), bytes = bytes.len(), "archive written");

    Ok(Archive {
        filename: archive_filename(filename),
        bytes,
        entries: cells.len(),
    })
}
