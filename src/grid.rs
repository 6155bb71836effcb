//! The grid model: the canonical set of movable line positions.
//!
//! Lines live in a fixed-slot `Vec` and a line's slot index is its identity.
//! Dragging changes a position, never a slot, so a line keeps its identity
//! even after it has been moved past its neighbours. Nothing here sorts the
//! storage; the [`partition`](crate::partition) module sorts derived boundary
//! values when it needs them.
//!
//! ## Slot layout
//!
//! ```text
//! rows = 3, columns = 4
//!
//! slot:  0    1    2    3    4
//!        H    H    V    V    V
//!        1/3  2/3  1/4  2/4  3/4   (fraction of height / width)
//! ```

use serde::{Deserialize, Serialize};

/// Dimensions of the source raster in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Far bound on the axis a line divides: height for horizontal lines,
    /// width for vertical ones.
    pub fn extent(&self, horizontal: bool) -> f64 {
        if horizontal {
            self.height as f64
        } else {
            self.width as f64
        }
    }
}

/// A single movable divider.
///
/// `position` is a y-coordinate for horizontal lines and an x-coordinate for
/// vertical lines, in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLine {
    pub position: f64,
    pub is_horizontal: bool,
}

impl GridLine {
    pub fn horizontal(position: f64) -> Self {
        Self {
            position,
            is_horizontal: true,
        }
    }

    pub fn vertical(position: f64) -> Self {
        Self {
            position,
            is_horizontal: false,
        }
    }
}

/// Clamp a candidate position into `[0, extent]`.
///
/// NaN collapses to 0 so a stored position is always comparable.
pub fn clamp_position(position: f64, extent: f64) -> f64 {
    if position.is_nan() {
        return 0.0;
    }
    position.clamp(0.0, extent.max(0.0))
}

/// Evenly spaced lines for a `rows` × `columns` grid.
///
/// Horizontal line `i` (1-indexed, `i < rows`) sits at `i / rows * height`,
/// vertical line `j` at `j / columns * width`. Horizontal lines come first.
pub fn regenerate(rows: u32, columns: u32, bounds: ImageBounds) -> Vec<GridLine> {
    let height = bounds.height as f64;
    let width = bounds.width as f64;

    let horizontal = (1..rows).map(|i| GridLine::horizontal(i as f64 / rows as f64 * height));
    let vertical = (1..columns).map(|j| GridLine::vertical(j as f64 / columns as f64 * width));

    horizontal.chain(vertical).collect()
}

/// Owner of the line set for one loaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct GridModel {
    rows: u32,
    columns: u32,
    bounds: ImageBounds,
    lines: Vec<GridLine>,
}

impl GridModel {
    /// Create a model with evenly spaced lines.
    pub fn new(rows: u32, columns: u32, bounds: ImageBounds) -> Self {
        Self {
            rows,
            columns,
            bounds,
            lines: regenerate(rows, columns, bounds),
        }
    }

    /// Adopt an externally supplied line set, clamping every position.
    ///
    /// Row and column counts are derived from the number of lines per axis.
    pub fn from_lines(lines: Vec<GridLine>, bounds: ImageBounds) -> Self {
        let horizontal = lines.iter().filter(|l| l.is_horizontal).count() as u32;
        let vertical = lines.len() as u32 - horizontal;
        let lines = lines
            .into_iter()
            .map(|l| GridLine {
                position: clamp_position(l.position, bounds.extent(l.is_horizontal)),
                ..l
            })
            .collect();
        Self {
            rows: horizontal + 1,
            columns: vertical + 1,
            bounds,
            lines,
        }
    }

    /// Discard custom positions and recreate the evenly spaced defaults.
    pub fn regenerate(&mut self, rows: u32, columns: u32, bounds: ImageBounds) -> &[GridLine] {
        self.rows = rows;
        self.columns = columns;
        self.bounds = bounds;
        self.lines = regenerate(rows, columns, bounds);
        &self.lines
    }

    /// Regenerate from the current rows, columns and bounds.
    pub fn reset(&mut self) -> &[GridLine] {
        self.lines = regenerate(self.rows, self.columns, self.bounds);
        &self.lines
    }

    /// Move one line, clamped to `[0, bound]` on its axis.
    ///
    /// Other lines are untouched. An index outside the line set is a no-op.
    pub fn update_line(&mut self, index: usize, position: f64) -> &[GridLine] {
        let bounds = self.bounds;
        if let Some(line) = self.lines.get_mut(index) {
            line.position = clamp_position(position, bounds.extent(line.is_horizontal));
        }
        &self.lines
    }

    pub fn lines(&self) -> &[GridLine] {
        &self.lines
    }

    pub fn bounds(&self) -> ImageBounds {
        self.bounds
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(lines: &[GridLine], horizontal: bool) -> Vec<f64> {
        lines
            .iter()
            .filter(|l| l.is_horizontal == horizontal)
            .map(|l| l.position)
            .collect()
    }

    // =========================================================================
    // regenerate
    // =========================================================================

    #[test]
    fn regenerate_line_counts() {
        let lines = regenerate(4, 3, ImageBounds::new(300, 400));
        assert_eq!(lines.len(), 3 + 2);
        assert_eq!(positions(&lines, true).len(), 3);
        assert_eq!(positions(&lines, false).len(), 2);
    }

    #[test]
    fn regenerate_even_spacing() {
        let lines = regenerate(4, 3, ImageBounds::new(300, 400));
        assert_eq!(positions(&lines, true), vec![100.0, 200.0, 300.0]);
        assert_eq!(positions(&lines, false), vec![100.0, 200.0]);
    }

    #[test]
    fn regenerate_horizontal_slots_first() {
        let lines = regenerate(2, 2, ImageBounds::new(10, 10));
        assert!(lines[0].is_horizontal);
        assert!(!lines[1].is_horizontal);
    }

    #[test]
    fn regenerate_single_row_and_column_has_no_lines() {
        assert!(regenerate(1, 1, ImageBounds::new(50, 50)).is_empty());
    }

    #[test]
    fn regenerate_uneven_division_keeps_fractions() {
        let lines = regenerate(3, 1, ImageBounds::new(10, 100));
        let ys = positions(&lines, true);
        assert!((ys[0] - 100.0 / 3.0).abs() < 1e-9);
        assert!((ys[1] - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn regenerate_all_within_bounds() {
        for rows in 2..8 {
            for columns in 2..8 {
                let bounds = ImageBounds::new(123, 77);
                for line in regenerate(rows, columns, bounds) {
                    let extent = bounds.extent(line.is_horizontal);
                    assert!(line.position >= 0.0 && line.position <= extent);
                }
            }
        }
    }

    // =========================================================================
    // GridModel
    // =========================================================================

    #[test]
    fn update_line_moves_only_that_line() {
        let mut model = GridModel::new(3, 3, ImageBounds::new(300, 300));
        let before = model.lines().to_vec();
        model.update_line(2, 42.0);

        assert_eq!(model.lines()[2].position, 42.0);
        for (i, line) in model.lines().iter().enumerate() {
            if i != 2 {
                assert_eq!(*line, before[i]);
            }
        }
    }

    #[test]
    fn update_line_clamps_to_axis_bound() {
        let mut model = GridModel::new(2, 2, ImageBounds::new(300, 200));
        model.update_line(0, 999.0);
        model.update_line(1, -5.0);
        assert_eq!(model.lines()[0].position, 200.0);
        assert_eq!(model.lines()[1].position, 0.0);
    }

    #[test]
    fn update_line_does_not_resort() {
        let mut model = GridModel::new(1, 4, ImageBounds::new(400, 100));
        model.update_line(0, 350.0);
        let xs = positions(model.lines(), false);
        assert_eq!(xs, vec![350.0, 200.0, 300.0]);
    }

    #[test]
    fn update_line_out_of_range_is_noop() {
        let mut model = GridModel::new(2, 2, ImageBounds::new(100, 100));
        let before = model.lines().to_vec();
        model.update_line(17, 5.0);
        assert_eq!(model.lines(), before.as_slice());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut model = GridModel::new(3, 3, ImageBounds::new(300, 300));
        model.update_line(0, 5.0);
        model.update_line(3, 250.0);
        model.reset();
        assert_eq!(model.lines(), regenerate(3, 3, ImageBounds::new(300, 300)).as_slice());
    }

    #[test]
    fn regenerate_replaces_counts_and_bounds() {
        let mut model = GridModel::new(3, 3, ImageBounds::new(300, 300));
        model.regenerate(2, 5, ImageBounds::new(500, 100));
        assert_eq!(model.rows(), 2);
        assert_eq!(model.columns(), 5);
        assert_eq!(model.bounds(), ImageBounds::new(500, 100));
        assert_eq!(model.lines().len(), 1 + 4);
    }

    #[test]
    fn from_lines_clamps_and_counts() {
        let model = GridModel::from_lines(
            vec![
                GridLine::horizontal(-3.0),
                GridLine::vertical(80.0),
                GridLine::vertical(500.0),
            ],
            ImageBounds::new(200, 100),
        );
        assert_eq!(model.rows(), 2);
        assert_eq!(model.columns(), 3);
        assert_eq!(model.lines()[0].position, 0.0);
        assert_eq!(model.lines()[2].position, 200.0);
    }

    #[test]
    fn clamp_is_idempotent_at_bound() {
        let once = clamp_position(1e9, 300.0);
        assert_eq!(once, 300.0);
        assert_eq!(clamp_position(once, 300.0), 300.0);
        assert_eq!(clamp_position(f64::NAN, 300.0), 0.0);
    }
}
