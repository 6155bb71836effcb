//! Partition calculator: grid lines + image bounds → ordered cell rectangles.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! ## Algorithm
//!
//! ```text
//! lines ──split by axis──▶ [y…] [x…]
//!       ──sort──▶          [y1 ≤ y2 …] [x1 ≤ x2 …]
//!       ──add edges──▶     [0, y1, y2, …, H] [0, x1, …, W]
//!       ──pairs──▶         (y0,y1) × (x0,x1)   row-major
//! ```
//!
//! Emission order is row-major (top row left to right, then the next row)
//! and is the contract that numbers the output files.

use crate::grid::{GridLine, ImageBounds};
use serde::{Deserialize, Serialize};

/// A cell in raster coordinates, derived from line positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Integer crop region shared by both extraction backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the crop covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the rectangle lies entirely inside `bounds`.
    pub fn fits(&self, bounds: ImageBounds) -> bool {
        self.x as u64 + self.width as u64 <= bounds.width as u64
            && self.y as u64 + self.height as u64 <= bounds.height as u64
    }
}

impl From<CellRect> for PixelRect {
    /// Round the rectangle's edges, not its size, so neighbours keep sharing
    /// an edge after conversion.
    fn from(cell: CellRect) -> Self {
        let x0 = round_edge(cell.x);
        let y0 = round_edge(cell.y);
        let x1 = round_edge(cell.x + cell.width);
        let y1 = round_edge(cell.y + cell.height);
        Self {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

fn round_edge(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value.round().min(u32::MAX as f64) as u32
    }
}

/// Sorted boundary list for one axis: `[0, sorted positions…, extent]`.
fn boundaries(lines: &[GridLine], horizontal: bool, extent: f64) -> Vec<f64> {
    let mut positions: Vec<f64> = lines
        .iter()
        .filter(|l| l.is_horizontal == horizontal)
        .map(|l| l.position)
        .collect();
    positions.sort_by(f64::total_cmp);

    let mut edges = Vec::with_capacity(positions.len() + 2);
    edges.push(0.0);
    edges.extend(positions);
    edges.push(extent);
    edges
}

/// Derive the ordered cell rectangles for a line set (any order, duplicates
/// allowed).
///
/// `h` horizontal and `v` vertical lines always give `(h + 1) * (v + 1)`
/// cells. Two lines at the same position give a zero-size cell rather than
/// an error.
pub fn partition(lines: &[GridLine], bounds: ImageBounds) -> Vec<CellRect> {
    let ys = boundaries(lines, true, bounds.height as f64);
    let xs = boundaries(lines, false, bounds.width as f64);

    let mut cells = Vec::with_capacity((ys.len() - 1) * (xs.len() - 1));
    for row in ys.windows(2) {
        for col in xs.windows(2) {
            cells.push(CellRect {
                x: col[0],
                y: row[0],
                width: col[1] - col[0],
                height: row[1] - row[0],
            });
        }
    }
    cells
}

/// Same walk as [`partition`], on edges rounded to whole pixels.
///
/// Rounding the shared boundaries once keeps the integer cells tiling the
/// image exactly, whatever the fractional line positions were.
pub fn pixel_cells(lines: &[GridLine], bounds: ImageBounds) -> Vec<PixelRect> {
    let ys: Vec<u32> = boundaries(lines, true, bounds.height as f64)
        .into_iter()
        .map(round_edge)
        .collect();
    let xs: Vec<u32> = boundaries(lines, false, bounds.width as f64)
        .into_iter()
        .map(round_edge)
        .collect();

    let mut cells = Vec::with_capacity((ys.len() - 1) * (xs.len() - 1));
    for row in ys.windows(2) {
        for col in xs.windows(2) {
            cells.push(PixelRect::new(
                col[0],
                row[0],
                col[1].saturating_sub(col[0]),
                row[1].saturating_sub(row[0]),
            ));
        }
    }
    cells
}

/// Uniform fallback used when no custom lines are supplied.
///
/// Cell size is `floor(width / columns)` × `floor(height / rows)` for every
/// cell. When the image does not divide evenly the remainder pixels along
/// the right and bottom edges are not covered by any cell. Line-based
/// partitions tile the image exactly; this fallback does not.
pub fn uniform_cells(rows: u32, columns: u32, bounds: ImageBounds) -> Vec<PixelRect> {
    if rows == 0 || columns == 0 {
        return Vec::new();
    }
    let cell_w = bounds.width / columns;
    let cell_h = bounds.height / rows;

    (0..rows)
        .flat_map(|r| (0..columns).map(move |c| PixelRect::new(c * cell_w, r * cell_h, cell_w, cell_h)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::regenerate;

    fn rect(x: f64, y: f64, width: f64, height: f64) -> CellRect {
        CellRect {
            x,
            y,
            width,
            height,
        }
    }

    // =========================================================================
    // partition
    // =========================================================================

    #[test]
    fn three_by_three_on_300_square() {
        let bounds = ImageBounds::new(300, 300);
        let cells = partition(&regenerate(3, 3, bounds), bounds);

        assert_eq!(cells.len(), 9);
        assert_eq!(cells[0], rect(0.0, 0.0, 100.0, 100.0));
        assert_eq!(cells[1], rect(100.0, 0.0, 100.0, 100.0));
        assert_eq!(cells[2], rect(200.0, 0.0, 100.0, 100.0));
        assert_eq!(cells[3], rect(0.0, 100.0, 100.0, 100.0));
        assert!(cells.iter().all(|c| c.width == 100.0 && c.height == 100.0));
    }

    #[test]
    fn no_lines_gives_whole_image() {
        let cells = partition(&[], ImageBounds::new(640, 480));
        assert_eq!(cells, vec![rect(0.0, 0.0, 640.0, 480.0)]);
    }

    #[test]
    fn single_axis_lines_give_one_row() {
        let lines = [GridLine::vertical(30.0), GridLine::vertical(10.0)];
        let cells = partition(&lines, ImageBounds::new(50, 20));
        assert_eq!(
            cells,
            vec![
                rect(0.0, 0.0, 10.0, 20.0),
                rect(10.0, 0.0, 20.0, 20.0),
                rect(30.0, 0.0, 20.0, 20.0),
            ]
        );
    }

    #[test]
    fn unsorted_lines_are_sorted_before_emitting() {
        let lines = [
            GridLine::horizontal(80.0),
            GridLine::vertical(70.0),
            GridLine::horizontal(20.0),
            GridLine::vertical(10.0),
        ];
        let cells = partition(&lines, ImageBounds::new(100, 100));
        assert_eq!(cells.len(), 9);
        assert_eq!(cells[0], rect(0.0, 0.0, 10.0, 20.0));
        assert_eq!(cells[4], rect(10.0, 20.0, 60.0, 60.0));
        assert_eq!(cells[8], rect(70.0, 80.0, 30.0, 20.0));
    }

    #[test]
    fn duplicate_horizontal_positions_give_zero_height_row() {
        let lines = [
            GridLine::horizontal(50.0),
            GridLine::horizontal(50.0),
            GridLine::vertical(50.0),
        ];
        let cells = partition(&lines, ImageBounds::new(100, 100));

        assert_eq!(cells.len(), 3 * 2);
        let degenerate: Vec<_> = cells.iter().filter(|c| c.height == 0.0).collect();
        assert_eq!(degenerate.len(), 2);
        assert!(cells.iter().all(|c| c.width >= 0.0 && c.height >= 0.0));
    }

    #[test]
    fn cells_tile_the_image_without_gaps() {
        let bounds = ImageBounds::new(317, 211);
        let lines = [
            GridLine::horizontal(190.5),
            GridLine::vertical(12.25),
            GridLine::horizontal(3.0),
            GridLine::vertical(300.0),
            GridLine::vertical(150.0),
        ];
        let cells = partition(&lines, bounds);
        assert_eq!(cells.len(), 3 * 4);

        let area: f64 = cells.iter().map(|c| c.width * c.height).sum();
        assert!((area - 317.0 * 211.0).abs() < 1e-6);

        // Each cell starts where its left neighbour ends.
        for row in cells.chunks(4) {
            assert_eq!(row[0].x, 0.0);
            for pair in row.windows(2) {
                assert_eq!(pair[0].x + pair[0].width, pair[1].x);
            }
            assert_eq!(row[3].x + row[3].width, 317.0);
        }
    }

    #[test]
    fn count_matches_formula() {
        for h in 0..4 {
            for v in 0..4 {
                let mut lines = Vec::new();
                lines.extend((0..h).map(|i| GridLine::horizontal(i as f64 * 7.0)));
                lines.extend((0..v).map(|i| GridLine::vertical(i as f64 * 11.0)));
                let cells = partition(&lines, ImageBounds::new(100, 100));
                assert_eq!(cells.len(), (h + 1) * (v + 1));
            }
        }
    }

    // =========================================================================
    // pixel_cells / PixelRect
    // =========================================================================

    #[test]
    fn pixel_cells_round_shared_edges() {
        let bounds = ImageBounds::new(100, 10);
        let lines = regenerate(1, 3, bounds);
        let cells = pixel_cells(&lines, bounds);
        // 33.33 → 33, 66.67 → 67
        assert_eq!(
            cells,
            vec![
                PixelRect::new(0, 0, 33, 10),
                PixelRect::new(33, 0, 34, 10),
                PixelRect::new(67, 0, 33, 10),
            ]
        );
    }

    #[test]
    fn pixel_cells_match_cell_rect_conversion_for_whole_positions() {
        let bounds = ImageBounds::new(300, 300);
        let lines = regenerate(3, 3, bounds);
        let converted: Vec<PixelRect> = partition(&lines, bounds).into_iter().map(PixelRect::from).collect();
        assert_eq!(converted, pixel_cells(&lines, bounds));
    }

    #[test]
    fn pixel_rect_fits_and_empty() {
        let bounds = ImageBounds::new(10, 10);
        assert!(PixelRect::new(5, 5, 5, 5).fits(bounds));
        assert!(!PixelRect::new(6, 5, 5, 5).fits(bounds));
        assert!(PixelRect::new(3, 3, 0, 4).is_empty());
        assert_eq!(PixelRect::new(0, 0, 4, 5).area(), 20);
    }

    #[test]
    fn negative_cell_edges_clamp_to_zero() {
        let px = PixelRect::from(rect(-4.0, -1.0, 10.0, 3.0));
        assert_eq!(px, PixelRect::new(0, 0, 6, 2));
    }

    // =========================================================================
    // uniform_cells
    // =========================================================================

    #[test]
    fn uniform_even_division() {
        let cells = uniform_cells(2, 2, ImageBounds::new(200, 100));
        assert_eq!(
            cells,
            vec![
                PixelRect::new(0, 0, 100, 50),
                PixelRect::new(100, 0, 100, 50),
                PixelRect::new(0, 50, 100, 50),
                PixelRect::new(100, 50, 100, 50),
            ]
        );
    }

    #[test]
    fn uniform_drops_remainder_pixels() {
        // 101 / 2 = 50 → the last column ends at x = 100, pixel column 100 is uncovered.
        let cells = uniform_cells(1, 2, ImageBounds::new(101, 10));
        assert_eq!(cells[1], PixelRect::new(50, 0, 50, 10));
        let covered: u64 = cells.iter().map(PixelRect::area).sum();
        assert_eq!(covered, 100 * 10);
    }

    #[test]
    fn uniform_zero_counts_give_nothing() {
        assert!(uniform_cells(0, 3, ImageBounds::new(10, 10)).is_empty());
    }
}
