//! Hit-testing and the drag lifecycle for grid lines.
//!
//! The controller is a small state machine driven by pointer events:
//!
//! ```text
//!            move (line near)            down (line near)
//!   Idle ─────────────────────▶ Hovering ─────────────────▶ Dragging
//!    ▲  ◀───────────────────── │                              │
//!    │       move (none near)                                 │
//!    └─────────────────── up / leave ─────────────────────────┘
//! ```
//!
//! Pointer events arrive in viewport coordinates (the displayed image's
//! on-screen space) and are mapped into raster pixels before any distance
//! is measured, so the hit threshold is expressed in image pixels whatever
//! the zoom level.

use crate::grid::{GridLine, GridModel, ImageBounds};

/// Distance in raster pixels within which the pointer targets a line.
pub const DEFAULT_HIT_THRESHOLD: f64 = 10.0;

/// Maps viewport coordinates onto raster coordinates.
///
/// `origin` is the viewport position of the displayed image's top-left
/// corner and `displayed` its on-screen size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMapping {
    pub origin: (f64, f64),
    pub displayed: (f64, f64),
    pub natural: ImageBounds,
}

impl ViewportMapping {
    /// Image displayed at natural size at the viewport origin.
    pub fn identity(natural: ImageBounds) -> Self {
        Self {
            origin: (0.0, 0.0),
            displayed: (natural.width as f64, natural.height as f64),
            natural,
        }
    }

    /// Convert a viewport point into raster pixels.
    ///
    /// A zero displayed size maps with a ratio of 1 rather than dividing by
    /// zero.
    pub fn to_raster(&self, x: f64, y: f64) -> (f64, f64) {
        let ratio = |natural: u32, displayed: f64| {
            if displayed > 0.0 {
                natural as f64 / displayed
            } else {
                1.0
            }
        };
        let sx = ratio(self.natural.width, self.displayed.0);
        let sy = ratio(self.natural.height, self.displayed.1);
        ((x - self.origin.0) * sx, (y - self.origin.1) * sy)
    }
}

/// Transient pointer feedback. Not part of the grid model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionState {
    pub active: Option<usize>,
    pub hovered: Option<usize>,
}

/// The controller's state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Hovering(usize),
    Dragging(usize),
}

/// Cursor affordance for the current target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    /// Vertical resize, shown over horizontal lines.
    RowResize,
    /// Horizontal resize, shown over vertical lines.
    ColumnResize,
}

/// Find the line nearest to a raster point, strictly within `threshold`.
///
/// Distance is `|y - position|` for horizontal lines and `|x - position|`
/// for vertical ones. Ties go to the lowest index.
pub fn hit_test(lines: &[GridLine], x: f64, y: f64, threshold: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, line) in lines.iter().enumerate() {
        let distance = if line.is_horizontal {
            (y - line.position).abs()
        } else {
            (x - line.position).abs()
        };
        // NaN distances never hit.
        if !(distance < threshold) {
            continue;
        }
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

type LineObserver = Box<dyn FnMut(&[GridLine], ImageBounds)>;

/// Owns the single active drag and the hover feedback.
pub struct DragController {
    state: InteractionState,
    threshold: f64,
    observer: Option<LineObserver>,
}

impl std::fmt::Debug for DragController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragController")
            .field("state", &self.state)
            .field("threshold", &self.threshold)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(DEFAULT_HIT_THRESHOLD)
    }
}

impl DragController {
    pub fn new(threshold: f64) -> Self {
        Self {
            state: InteractionState::default(),
            threshold,
            observer: None,
        }
    }

    /// Register a callback that receives the full line set after every
    /// drag update.
    pub fn set_observer(&mut self, observer: impl FnMut(&[GridLine], ImageBounds) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn phase(&self) -> Phase {
        match (self.state.active, self.state.hovered) {
            (Some(index), _) => Phase::Dragging(index),
            (None, Some(index)) => Phase::Hovering(index),
            (None, None) => Phase::Idle,
        }
    }

    /// Cursor for the dragged line, else the hovered line, else default.
    pub fn cursor(&self, lines: &[GridLine]) -> Cursor {
        let target = self.state.active.or(self.state.hovered);
        match target.and_then(|i| lines.get(i)) {
            Some(line) if line.is_horizontal => Cursor::RowResize,
            Some(_) => Cursor::ColumnResize,
            None => Cursor::Default,
        }
    }

    /// Forget any drag or hover, e.g. after the grid was regenerated.
    pub fn clear(&mut self) {
        self.state = InteractionState::default();
    }

    pub fn pointer_move(&mut self, model: &mut GridModel, mapping: &ViewportMapping, x: f64, y: f64) {
        let (rx, ry) = mapping.to_raster(x, y);

        let Some(index) = self.state.active else {
            self.state.hovered = hit_test(model.lines(), rx, ry, self.threshold);
            return;
        };

        let Some(line) = model.lines().get(index).copied() else {
            self.state.active = None;
            return;
        };
        let candidate = if line.is_horizontal { ry } else { rx };
        let bounds = model.bounds();
        let lines = model.update_line(index, candidate);
        if let Some(observer) = self.observer.as_mut() {
            observer(lines, bounds);
        }
    }

    pub fn pointer_down(&mut self, model: &GridModel, mapping: &ViewportMapping, x: f64, y: f64) {
        let (rx, ry) = mapping.to_raster(x, y);
        let hit = hit_test(model.lines(), rx, ry, self.threshold);
        self.state.hovered = hit;
        self.state.active = hit;
    }

    pub fn pointer_up(&mut self) {
        self.state.active = None;
    }

    pub fn pointer_leave(&mut self) {
        self.state.active = None;
        self.state.hovered = None;
    }
}
