//! Configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it wants to change. CLI flags override the merged
//! result.
//!
//! ## Config File Location
//!
//! Pass `--config <path>`, or place `config.toml` in the working directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [grid]
//! rows = 3                  # Rows for a freshly generated grid
//! columns = 3               # Columns for a freshly generated grid
//! hit_threshold = 10.0      # Pointer distance (raster px) that grabs a line
//!
//! [output]
//! format = "png"            # png | jpeg | webp
//! quality = 90              # JPEG quality (1-100)
//! archive_name = "split-images.zip"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! max_body_bytes = 67108864 # Largest accepted upload
//! ```
//!
//! ## Partial Configuration
//!
//! ```toml
//! # Only switch the output codec
//! [output]
//! format = "jpeg"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::archive::DEFAULT_ARCHIVE_NAME;
use crate::imaging::{Encoding, OutputFormat, Quality};
use crate::interaction::DEFAULT_HIT_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    /// Default grid shape and pointer tolerance.
    pub grid: GridConfig,
    /// Cell encoding and archive naming.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// HTTP endpoint settings for `serve`.
    pub server: ServerConfig,
}

impl SplitConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(ConfigError::Validation(
                "grid.rows and grid.columns must be at least 1".into(),
            ));
        }
        if !(self.grid.hit_threshold.is_finite() && self.grid.hit_threshold > 0.0) {
            return Err(ConfigError::Validation(
                "grid.hit_threshold must be a positive number".into(),
            ));
        }
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation("output.quality must be 1-100".into()));
        }
        if self.output.archive_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.archive_name must not be empty".into(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.max_body_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Encoding for extracted cells.
    pub fn encoding(&self) -> Encoding {
        Encoding::new(self.output.format, Quality::new(self.output.quality))
    }
}

/// Grid defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub rows: u32,
    pub columns: u32,
    /// Maximum pointer distance, in raster pixels, that targets a line.
    pub hit_threshold: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            columns: 3,
            hit_threshold: DEFAULT_HIT_THRESHOLD,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Codec used for every cell.
    pub format: OutputFormat,
    /// JPEG quality (1 = worst, 100 = best). Ignored by PNG and WebP.
    pub quality: u32,
    /// Download name for the archive.
    pub archive_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            quality: Quality::default().value(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel extraction workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Uploads larger than this are rejected with 413.
    pub max_body_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SplitConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SplitConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SplitConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, `config.toml` in `dir` is used
/// when present, and stock defaults otherwise.
pub fn load_config(path: Option<&Path>, dir: &Path) -> Result<SplitConfig, ConfigError> {
    let overlay = match path {
        Some(path) => Some(load_raw_config(path)?),
        None => {
            let discovered = dir.join("config.toml");
            if discovered.exists() {
                Some(load_raw_config(&discovered)?)
            } else {
                None
            }
        }
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# grid-split Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Grid
# ---------------------------------------------------------------------------
[grid]
# Shape of a freshly generated grid. Lines are spaced evenly.
rows = 3
columns = 3

# Maximum pointer distance, in image pixels, at which a line can be grabbed.
hit_threshold = 10.0

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Codec for every cell: "png" (lossless), "jpeg", or "webp" (lossless).
format = "png"

# JPEG quality (1 = worst, 100 = best). Ignored by png and webp.
quality = 90

# Download name of the archive.
archive_name = "split-images.zip"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel extraction workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Server (grid-split serve)
# ---------------------------------------------------------------------------
[server]
bind = "127.0.0.1:8080"

# Uploads larger than this are rejected.
max_body_bytes = 67108864
"##
}
