//! Parameter types for cell encoding.
//!
//! These describe *what* each cell is encoded as, not *how*. Both backends
//! take the same [`Encoding`], which is what keeps their output comparable.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`OutputFormat`]: PNG (default), JPEG or lossless WebP.
//! - [`Encoding`]: format + quality pair handed to a backend.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Codec used for every cell of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Webp,
}

impl OutputFormat {
    /// File extension used for archive entry names.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }

    /// Parse a format name as it appears in config files and query strings.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
        }
    }
}

/// How each extracted cell is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Encoding {
    pub format: OutputFormat,
    /// Only used by JPEG.
    pub quality: Quality,
}

impl Encoding {
    pub fn new(format: OutputFormat, quality: Quality) -> Self {
        Self { format, quality }
    }

    pub fn png() -> Self {
        Self::default()
    }
}
