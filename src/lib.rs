//! # grid-split
//!
//! Partition a raster image into rectangular cells along an adjustable grid
//! and export every cell as its own image, packaged into one ZIP archive.
//!
//! # Architecture: Model → Partition → Extract → Package
//!
//! ```text
//! GridModel ──partition──▶ [PixelRect] ──ExtractionBackend──▶ [EncodedCell] ──archive::pack──▶ .zip
//!     ▲                                    (client | server)
//!     │
//! DragController ◀── pointer events        Renderer ◀── GridModel + InteractionState
//! ```
//!
//! Grid lines live in stable-indexed storage and are never re-sorted; only
//! derived boundaries are. The [`partition`] functions are pure, so both
//! extraction backends receive the exact same rectangle sequence for the same
//! grid, which is what makes their output interchangeable.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`grid`] | Grid model: movable line positions, even-spacing regeneration, clamped updates |
//! | [`interaction`] | Hit-testing, drag lifecycle, viewport → raster mapping, cursor affordance |
//! | [`render`] | Paints the source image plus state-styled grid lines |
//! | [`partition`] | Lines + bounds → row-major cell rectangles (float and pixel), uniform fallback |
//! | [`imaging`] | Two extraction backends over the `image` crate, plus encode/decode helpers |
//! | [`archive`] | Packs encoded cells into a ZIP as `image_1..image_N` |
//! | [`pipeline`] | Input validation, backend dispatch and packaging, with a reason code per failure |
//! | [`editor`] | An editing session tying image, grid, controller and renderer together |
//! | [`endpoint`] | `POST /split` HTTP server for the server extraction path |
//! | [`transport`] | HTTP client for that endpoint, with fallback to local extraction |
//! | [`config`] | `config.toml` loading, merging over stock defaults, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Edge Rounding
//!
//! Float cell rectangles become integer crops by rounding each *boundary*,
//! never each size. Adjacent cells therefore share an edge exactly and the
//! cells tile the image with no gap or overlap.
//!
//! ## RGBA Everywhere
//!
//! Sources are normalized to RGBA8 on decode. Both backends crop the same
//! buffer type with the same rectangles and encode with the same settings, so
//! their crops are pixel-identical.
//!
//! ## Uniform Fallback
//!
//! A server request with only `rows`/`columns` uses `floor(width / columns)` ×
//! `floor(height / rows)` for every cell. Remainder pixels on the right and
//! bottom are not covered. Send explicit `cells` for exact tiling.

pub mod archive;
pub mod config;
pub mod editor;
pub mod endpoint;
pub mod grid;
pub mod imaging;
pub mod interaction;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod render;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;
