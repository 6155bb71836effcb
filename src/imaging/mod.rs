//! Cell extraction: two interchangeable backends over the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` → RGBA8 |
//! | **Client crop** | reusable [`Surface`], `imageops::replace` from a sub-view |
//! | **Server crop** | `imageops::crop_imm` on the shared decoded raster |
//! | **Encode** | PNG / JPEG / lossless WebP encoders from `image::codecs` |
//! | **Parallelism** | `rayon` `par_iter`, collected in order |
//!
//! The module is split into:
//! - **Parameters**: [`Encoding`], [`OutputFormat`], [`Quality`]
//! - **Backend**: [`ExtractionBackend`] trait + [`EncodedCell`]
//! - **Codec**: decode/encode helpers shared by both backends
//! - **Client** / **Server**: the two implementations

pub mod backend;
pub mod client;
pub mod codec;
mod params;
pub mod server;

pub use backend::{EncodedCell, ExtractError, ExtractionBackend};
pub use client::{ClientBackend, MAX_SURFACE_PIXELS, Surface};
pub use codec::decode_rgba;
pub use params::{Encoding, OutputFormat, Quality};
pub use server::ServerBackend;
