//! Client side of the server extraction path.
//!
//! [`SplitTransport`] is the seam between the pipeline and the network:
//! [`HttpTransport`] posts the image to a running `grid-split serve`, and
//! tests substitute an in-process implementation. [`split_with_fallback`]
//! tries the transport first and, on any transport failure, re-runs the
//! whole split locally with the client backend.

use crate::archive::{Archive, archive_filename};
use crate::grid::ImageBounds;
use crate::imaging::{ExtractError, Quality, decode_rgba};
use crate::partition::{PixelRect, pixel_cells};
use crate::pipeline::{Layout, SplitError, SplitOptions, package, split_local};
use image::ImageReader;
use reqwest::blocking::Client;
use std::io::Cursor;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("Server response is not a ZIP archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),
}

/// Sends one split request to wherever the server backend lives.
pub trait SplitTransport {
    fn split(&self, image: &[u8], layout: &Layout, options: &SplitOptions) -> Result<Archive, TransportError>;
}

/// Which path produced an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Server,
    Client,
}

/// Render the rectangle list as the `cells` query value: `x,y,w,h;x,y,w,h`.
pub fn format_cells_param(cells: &[PixelRect]) -> String {
    cells
        .iter()
        .map(|c| format!("{},{},{},{}", c.x, c.y, c.width, c.height))
        .collect::<Vec<_>>()
        .join(";")
}

/// Query pairs describing `layout`. Custom lines need `bounds` to become
/// rectangles, since the endpoint only accepts rows/columns or cells.
pub fn query_pairs(layout: &Layout, bounds: ImageBounds, options: &SplitOptions) -> Vec<(&'static str, String)> {
    let mut pairs = match layout {
        Layout::Uniform { rows, columns } => vec![("rows", rows.to_string()), ("columns", columns.to_string())],
        Layout::Lines(lines) => vec![("cells", format_cells_param(&pixel_cells(lines, bounds)))],
        Layout::Cells(cells) => vec![("cells", format_cells_param(cells))],
    };
    pairs.push(("format", options.encoding.format.name().to_string()));
    if options.encoding.quality != Quality::default() {
        pairs.push(("quality", options.encoding.quality.value().to_string()));
    }
    if options.strict {
        pairs.push(("strict", "true".to_string()));
    }
    if let Some(name) = &options.filename {
        pairs.push(("filename", name.clone()));
    }
    pairs
}

/// Read image dimensions from the header without a full decode.
fn probe_bounds(image: &[u8]) -> Result<ImageBounds, ExtractError> {
    let (width, height) = ImageReader::new(Cursor::new(image))
        .with_guessed_format()
        .map_err(|e| ExtractError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ExtractError::Decode(e.to_string()))?;
    Ok(ImageBounds::new(width, height))
}

/// Blocking HTTP transport to a `POST /split` endpoint.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// `base` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: format!("{}/split", base.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SplitTransport for HttpTransport {
    fn split(&self, image: &[u8], layout: &Layout, options: &SplitOptions) -> Result<Archive, TransportError> {
        let bounds = match layout {
            Layout::Lines(_) => probe_bounds(image).map_err(|e| TransportError::Status {
                status: 400,
                reason: e.to_string(),
            })?,
            _ => ImageBounds::default(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&query_pairs(layout, bounds, options))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let reason = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason,
            });
        }

        let bytes = response.bytes()?.to_vec();
        let entries = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?.len();
        Ok(Archive {
            filename: archive_filename(options.filename.as_deref()),
            bytes,
            entries,
        })
    }
}

/// Try the server path; on any transport failure re-run the split on the
/// client path from scratch.
pub fn split_with_fallback(
    transport: &dyn SplitTransport,
    image: &[u8],
    layout: &Layout,
    options: &SplitOptions,
) -> Result<(Archive, Route), SplitError> {
    match transport.split(image, layout, options) {
        Ok(archive) => {
            info!(entries = archive.entries, "server extraction succeeded");
            Ok((archive, Route::Server))
        }
        Err(e) => {
            warn!(error = %e, "server extraction failed, falling back to client");
            let decoded = decode_rgba(image)?;
            let cells = split_local(&decoded, layout, options)?;
            Ok((package(&cells, options)?, Route::Client))
        }
    }
}
