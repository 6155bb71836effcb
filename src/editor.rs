//! Editing session: one loaded image, its grid, and the pointer state.
//!
//! The [`Editor`] wires the [`GridModel`], the [`DragController`] and the
//! [`Renderer`] together. Pointer events arrive in viewport coordinates and
//! are mapped through the current [`ViewportMapping`]; every event updates
//! state synchronously, so the next [`frame`](Editor::frame) always reflects
//! it. Loading a new image discards the grid along with any drag.

use crate::archive::Archive;
use crate::config::SplitConfig;
use crate::grid::{GridLine, GridModel, ImageBounds};
use crate::imaging::{EncodedCell, decode_rgba};
use crate::interaction::{Cursor, DragController, InteractionState, Phase, ViewportMapping};
use crate::partition::{PixelRect, pixel_cells};
use crate::pipeline::{InputError, Layout, SplitError, SplitOptions, package, split_local, validate_grid};
use crate::render::{LineTheme, Renderer};
use image::RgbaImage;
use tracing::debug;

#[derive(Debug)]
pub struct Editor {
    image: RgbaImage,
    model: GridModel,
    controller: DragController,
    renderer: Renderer,
    mapping: ViewportMapping,
}

fn bounds_of(image: &RgbaImage) -> Result<ImageBounds, InputError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(InputError::MissingImage);
    }
    Ok(ImageBounds::new(image.width(), image.height()))
}

impl Editor {
    /// Start a session on a decoded image with an evenly spaced grid.
    pub fn new(image: RgbaImage, rows: u32, columns: u32, hit_threshold: f64) -> Result<Self, InputError> {
        validate_grid(rows, columns)?;
        let bounds = bounds_of(&image)?;
        Ok(Self {
            image,
            model: GridModel::new(rows, columns, bounds),
            controller: DragController::new(hit_threshold),
            renderer: Renderer::new(LineTheme::default()),
            mapping: ViewportMapping::identity(bounds),
        })
    }

    /// Decode `bytes` and start a session with the configured grid.
    pub fn open(bytes: &[u8], config: &SplitConfig) -> Result<Self, SplitError> {
        if bytes.is_empty() {
            return Err(InputError::MissingImage.into());
        }
        let image = decode_rgba(bytes)?;
        Ok(Self::new(image, config.grid.rows, config.grid.columns, config.grid.hit_threshold)?)
    }

    /// Replace the image. The grid is regenerated with the current counts.
    pub fn load(&mut self, image: RgbaImage) -> Result<&[GridLine], InputError> {
        let bounds = bounds_of(&image)?;
        self.image = image;
        self.controller.clear();
        self.mapping = ViewportMapping::identity(bounds);
        let (rows, columns) = (self.model.rows(), self.model.columns());
        debug!(width = bounds.width, height = bounds.height, "image loaded");
        Ok(self.model.regenerate(rows, columns, bounds))
    }

    /// Change the row/column counts, discarding custom positions.
    pub fn set_grid(&mut self, rows: u32, columns: u32) -> Result<&[GridLine], InputError> {
        validate_grid(rows, columns)?;
        self.controller.clear();
        let bounds = self.model.bounds();
        Ok(self.model.regenerate(rows, columns, bounds))
    }

    /// Adopt externally supplied lines, clamped into the image.
    pub fn set_lines(&mut self, lines: Vec<GridLine>) -> &[GridLine] {
        self.controller.clear();
        self.model = GridModel::from_lines(lines, self.model.bounds());
        self.model.lines()
    }

    /// Back to even spacing.
    pub fn reset(&mut self) -> &[GridLine] {
        self.controller.clear();
        self.model.reset()
    }

    /// Where and how large the image is currently displayed.
    pub fn set_viewport(&mut self, origin: (f64, f64), displayed: (f64, f64)) {
        self.mapping = ViewportMapping {
            origin,
            displayed,
            natural: self.model.bounds(),
        };
    }

    /// Called with the full line set after every drag update.
    pub fn set_observer(&mut self, observer: impl FnMut(&[GridLine], ImageBounds) + 'static) {
        self.controller.set_observer(observer);
    }

    // =========================================================================
    // Pointer events (viewport coordinates)
    // =========================================================================

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.controller.pointer_move(&mut self.model, &self.mapping, x, y);
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.controller.pointer_down(&self.model, &self.mapping, x, y);
    }

    pub fn pointer_up(&mut self) {
        self.controller.pointer_up();
    }

    pub fn pointer_leave(&mut self) {
        self.controller.pointer_leave();
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn model(&self) -> &GridModel {
        &self.model
    }

    pub fn lines(&self) -> &[GridLine] {
        self.model.lines()
    }

    pub fn bounds(&self) -> ImageBounds {
        self.model.bounds()
    }

    pub fn state(&self) -> InteractionState {
        self.controller.state()
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn cursor(&self) -> Cursor {
        self.controller.cursor(self.model.lines())
    }

    /// Paint the current frame.
    pub fn frame(&mut self) -> &RgbaImage {
        let state = self.controller.state();
        self.renderer.paint(&self.image, self.model.lines(), &state)
    }

    /// Current cell rectangles in row-major order.
    pub fn cells(&self) -> Vec<PixelRect> {
        pixel_cells(self.model.lines(), self.model.bounds())
    }

    /// The grid as a pipeline layout.
    pub fn layout(&self) -> Layout {
        Layout::Lines(self.model.lines().to_vec())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Extract every cell with the client backend.
    pub fn extract(&self, options: &SplitOptions) -> Result<Vec<EncodedCell>, SplitError> {
        split_local(&self.image, &self.layout(), options)
    }

    /// Extract and package into an archive.
    pub fn export(&self, options: &SplitOptions) -> Result<Archive, SplitError> {
        package(&self.extract(options)?, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::decode_rgba;
    use crate::test_helpers::{archive_names, gradient, png_bytes};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor_300() -> Editor {
        Editor::new(gradient(300, 300), 3, 3, 10.0).unwrap()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    #[test]
    fn new_session_has_even_grid() {
        let editor = editor_300();
        assert_eq!(editor.lines().len(), 4);
        assert_eq!(editor.cells().len(), 9);
        assert_eq!(editor.cells()[3], PixelRect::new(0, 100, 100, 100));
    }

    #[test]
    fn empty_image_rejected() {
        assert!(matches!(
            Editor::new(RgbaImage::new(0, 10), 2, 2, 10.0),
            Err(InputError::MissingImage)
        ));
    }

    #[test]
    fn open_uses_config_grid() {
        let mut config = SplitConfig::default();
        config.grid.rows = 2;
        config.grid.columns = 4;
        let editor = Editor::open(&png_bytes(&gradient(80, 40)), &config).unwrap();
        assert_eq!(editor.cells().len(), 8);
        assert_eq!(editor.bounds(), ImageBounds::new(80, 40));
    }

    #[test]
    fn loading_new_image_discards_custom_lines() {
        let mut editor = editor_300();
        editor.pointer_down(100.0, 50.0);
        editor.pointer_move(150.0, 50.0);
        editor.pointer_up();

        let lines = editor.load(gradient(600, 300)).unwrap().to_vec();
        assert_eq!(lines[2], GridLine::vertical(200.0));
        assert_eq!(editor.phase(), Phase::Idle);
    }

    #[test]
    fn set_grid_validates_counts() {
        let mut editor = editor_300();
        assert!(editor.set_grid(0, 2).is_err());
        assert_eq!(editor.set_grid(2, 2).unwrap().len(), 2);
    }

    // =========================================================================
    // Pointer editing
    // =========================================================================

    #[test]
    fn drag_updates_cells_and_notifies_observer() {
        let mut editor = editor_300();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        editor.set_observer(move |lines, _| sink.borrow_mut().push(lines.to_vec()));

        editor.pointer_down(101.0, 20.0);
        assert_eq!(editor.cursor(), Cursor::ColumnResize);
        editor.pointer_move(130.0, 20.0);
        editor.pointer_up();

        assert_eq!(editor.cells()[0], PixelRect::new(0, 0, 130, 100));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn scaled_viewport_maps_to_raster() {
        let mut editor = editor_300();
        // Displayed at half size, offset by (10, 10).
        editor.set_viewport((10.0, 10.0), (150.0, 150.0));

        editor.pointer_down(60.0, 30.0); // raster (100, 40)
        assert_eq!(editor.phase(), Phase::Dragging(2));
        editor.pointer_move(85.0, 30.0); // raster (150, 40)
        assert_eq!(editor.lines()[2], GridLine::vertical(150.0));
    }

    #[test]
    fn drag_past_edge_clamps() {
        let mut editor = editor_300();
        editor.pointer_down(100.0, 5.0);
        editor.pointer_move(500.0, 5.0);
        assert_eq!(editor.lines()[2].position, 300.0);
    }

    #[test]
    fn leave_clears_hover_and_drag() {
        let mut editor = editor_300();
        editor.pointer_down(100.0, 5.0);
        editor.pointer_leave();
        assert_eq!(editor.state(), InteractionState::default());
        assert_eq!(editor.cursor(), Cursor::Default);
    }

    // =========================================================================
    // Frame + export
    // =========================================================================

    #[test]
    fn frame_has_image_dimensions() {
        let mut editor = editor_300();
        assert_eq!(editor.frame().dimensions(), (300, 300));
    }

    #[test]
    fn export_follows_dragged_grid() {
        let mut editor = Editor::new(gradient(100, 60), 1, 2, 10.0).unwrap();
        editor.pointer_down(50.0, 30.0);
        editor.pointer_move(30.0, 30.0);
        editor.pointer_up();

        let cells = editor.extract(&SplitOptions::default()).unwrap();
        let right = decode_rgba(&cells[1].bytes).unwrap();
        assert_eq!(right.dimensions(), (70, 60));
        assert_eq!(right.get_pixel(0, 0), editor.image().get_pixel(30, 0));

        let archive = editor.export(&SplitOptions::default()).unwrap();
        assert_eq!(archive_names(&archive.bytes), vec!["image_1.png", "image_2.png"]);
    }
}
