//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Cells
//!
//! Explicit rectangles have no row/column shape and get a `Cells on WxH`
//! header instead.
//!
//! ```text
//! Grid 3x3 on 300x300
//! 001 x=0 y=0 100x100
//! 002 x=100 y=0 100x100
//! ...
//! 9 cells
//! ```
//!
//! ## Split
//!
//! ```text
//! 001 image_1.png  100x100  (0, 0)
//! 002 image_2.png  100x100  (100, 0)
//! ...
//! Wrote 9 images → split-images.zip (client)
//! ```
//!
//! Zero-area cells are flagged with `(empty)` so a coincident pair of lines
//! is visible in the listing.
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::archive::entry_name;
use crate::grid::ImageBounds;
use crate::imaging::{EncodedCell, OutputFormat};
use crate::partition::PixelRect;
use crate::transport::Route;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn empty_marker(rect: &PixelRect) -> &'static str {
    if rect.is_empty() { " (empty)" } else { "" }
}

fn route_label(route: Route) -> &'static str {
    match route {
        Route::Server => "server",
        Route::Client => "client",
    }
}

// ============================================================================
// Cells
// ============================================================================

/// Format the cell listing. `shape` is `(rows, columns)` when the cells
/// come from a grid.
pub fn format_cells(shape: Option<(u32, u32)>, bounds: ImageBounds, cells: &[PixelRect]) -> Vec<String> {
    let mut lines = vec![match shape {
        Some((rows, columns)) => format!("Grid {}x{} on {}x{}", rows, columns, bounds.width, bounds.height),
        None => format!("Cells on {}x{}", bounds.width, bounds.height),
    }];
    for (i, cell) in cells.iter().enumerate() {
        lines.push(format!(
            "{} x={} y={} {}x{}{}",
            format_index(i + 1),
            cell.x,
            cell.y,
            cell.width,
            cell.height,
            empty_marker(cell)
        ));
    }
    lines.push(match cells.len() {
        1 => "1 cell".to_string(),
        n => format!("{n} cells"),
    });
    lines
}

pub fn print_cells(shape: Option<(u32, u32)>, bounds: ImageBounds, cells: &[PixelRect]) {
    for line in format_cells(shape, bounds, cells) {
        println!("{}", line);
    }
}

// ============================================================================
// Split
// ============================================================================

/// Format the entry listing and summary of a finished split.
///
/// `cells` is empty when the archive came back from a server, which only
/// reports the entry count.
pub fn format_split_output(
    cells: &[EncodedCell],
    entries: usize,
    format: OutputFormat,
    archive_path: &Path,
    route: Route,
) -> Vec<String> {
    let mut lines: Vec<String> = cells
        .iter()
        .map(|cell| {
            format!(
                "{} {}  {}x{}  ({}, {}){}",
                format_index(cell.index + 1),
                entry_name(cell.index + 1, format),
                cell.rect.width,
                cell.rect.height,
                cell.rect.x,
                cell.rect.y,
                empty_marker(&cell.rect)
            )
        })
        .collect();
    lines.push(format!(
        "Wrote {} images → {} ({})",
        entries,
        archive_path.display(),
        route_label(route)
    ));
    lines
}

pub fn print_split_output(
    cells: &[EncodedCell],
    entries: usize,
    format: OutputFormat,
    archive_path: &Path,
    route: Route,
) {
    for line in format_split_output(cells, entries, format, archive_path, route) {
        println!("{}", line);
    }
}

// ============================================================================
// Preview
// ============================================================================

/// Format the one-line confirmation for a rendered preview.
pub fn format_preview_output(path: &Path, bounds: ImageBounds, line_count: usize) -> String {
    format!(
        "Preview {}x{} with {} lines → {}",
        bounds.width,
        bounds.height,
        line_count,
        path.display()
    )
}

// ============================================================================
// Tests
// ============================================================================
