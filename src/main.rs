use clap::{Args, Parser, Subcommand};
use grid_split::archive::archive_filename;
use grid_split::config::{self, SplitConfig};
use grid_split::endpoint::{Server, parse_cells};
use grid_split::grid::{GridLine, ImageBounds, regenerate};
use grid_split::imaging::{Encoding, OutputFormat, Quality, decode_rgba};
use grid_split::interaction::InteractionState;
use grid_split::output;
use grid_split::pipeline::{Layout, SplitOptions, package, resolve_cells, split_local, validate_grid};
use grid_split::render::{LineTheme, Renderer};
use grid_split::transport::{HttpTransport, Route, split_with_fallback};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grid-split")]
#[command(about = "Split an image into grid cells and package them as a ZIP archive")]
#[command(long_about = "\
Split an image into grid cells and package them as a ZIP archive

The grid is either evenly spaced (--rows/--columns), a set of custom line
positions (--lines lines.json), or an explicit list of rectangles (--cells).
Cells are emitted in row-major order as image_1, image_2, ... inside the archive.

lines.json is an array of lines:

  [{\"position\": 120.0, \"is_horizontal\": false},
   {\"position\": 80.5,  \"is_horizontal\": true}]

Extraction runs locally by default. With --server the image is sent to a
running 'grid-split serve'; if that fails the split is redone locally.

Run 'grid-split gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags describing the grid.
#[derive(Args, Clone)]
struct GridArgs {
    /// Number of rows (defaults to config)
    #[arg(long)]
    rows: Option<u32>,

    /// Number of columns (defaults to config)
    #[arg(long)]
    columns: Option<u32>,

    /// JSON file with custom line positions
    #[arg(long, conflicts_with_all = ["rows", "columns", "cells"])]
    lines: Option<PathBuf>,

    /// Explicit rectangles: x,y,w,h;x,y,w,h;...
    #[arg(long, conflicts_with_all = ["rows", "columns"])]
    cells: Option<String>,

    /// Use floor-sized uniform cells (remainder pixels dropped)
    #[arg(long, conflicts_with_all = ["lines", "cells"])]
    uniform: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every cell and write the archive
    Split {
        image: PathBuf,

        #[command(flatten)]
        grid: GridArgs,

        /// Cell image format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// JPEG quality (1-100)
        #[arg(long)]
        quality: Option<u32>,

        /// Fail on zero-area cells instead of writing empty entries
        #[arg(long)]
        strict: bool,

        /// Archive name
        #[arg(long)]
        filename: Option<String>,

        /// Output file or directory (defaults to the archive name in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Base URL of a 'grid-split serve' instance
        #[arg(long)]
        server: Option<String>,
    },
    /// Print the cell rectangles without extracting
    Cells {
        image: PathBuf,

        #[command(flatten)]
        grid: GridArgs,
    },
    /// Render the grid overlay onto the image
    Preview {
        image: PathBuf,

        #[command(flatten)]
        grid: GridArgs,

        /// Line index to draw as hovered
        #[arg(long)]
        hover: Option<usize>,

        /// Line index to draw as being dragged
        #[arg(long)]
        active: Option<usize>,

        /// Output PNG
        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
    },
    /// Serve POST /split over HTTP
    Serve {
        /// Listen address (defaults to config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let load = || -> Result<SplitConfig, config::ConfigError> {
        let site_config = config::load_config(cli.config.as_deref(), &cwd)?;
        init_thread_pool(&site_config.processing);
        Ok(site_config)
    };

    match cli.command {
        Command::Split {
            image,
            grid,
            format,
            quality,
            strict,
            filename,
            out,
            server,
        } => {
            let site_config = load()?;
            let bytes = std::fs::read(&image)?;
            let encoding = Encoding::new(
                format.unwrap_or(site_config.output.format),
                Quality::new(quality.unwrap_or(site_config.output.quality)),
            );
            let options = SplitOptions {
                encoding,
                strict,
                filename: Some(filename.unwrap_or_else(|| site_config.output.archive_name.clone())),
            };
            let out_path = resolve_out_path(out.as_deref(), &archive_filename(options.filename.as_deref()));

            match server {
                Some(base) => {
                    let layout = match build_layout(&grid, &site_config, None)? {
                        Some(layout) => layout,
                        None => {
                            let bounds = probe(&image)?;
                            build_layout(&grid, &site_config, Some(bounds))?.unwrap_or(Layout::Lines(Vec::new()))
                        }
                    };
                    let transport = HttpTransport::new(&base)?;
                    let (archive, route) = split_with_fallback(&transport, &bytes, &layout, &options)?;
                    std::fs::write(&out_path, &archive.bytes)?;
                    output::print_split_output(&[], archive.entries, encoding.format, &out_path, route);
                }
                None => {
                    let decoded = decode_rgba(&bytes)?;
                    let bounds = ImageBounds::new(decoded.width(), decoded.height());
                    let layout = build_layout(&grid, &site_config, Some(bounds))?.unwrap_or(Layout::Lines(Vec::new()));
                    let cells = split_local(&decoded, &layout, &options)?;
                    let archive = package(&cells, &options)?;
                    std::fs::write(&out_path, &archive.bytes)?;
                    output::print_split_output(&cells, archive.entries, encoding.format, &out_path, Route::Client);
                }
            }
        }
        Command::Cells { image, grid } => {
            let site_config = load()?;
            let bounds = probe(&image)?;
            let layout = build_layout(&grid, &site_config, Some(bounds))?.unwrap_or(Layout::Lines(Vec::new()));
            let cells = resolve_cells(&layout, bounds, false)?;
            output::print_cells(grid_shape(&layout), bounds, &cells);
        }
        Command::Preview {
            image,
            grid,
            hover,
            active,
            out,
        } => {
            let site_config = load()?;
            let source = decode_rgba(&std::fs::read(&image)?)?;
            let bounds = ImageBounds::new(source.width(), source.height());
            let lines = preview_lines(&grid, &site_config, bounds)?;
            let state = InteractionState {
                active,
                hovered: hover,
            };
            let mut renderer = Renderer::new(LineTheme::default());
            renderer.paint(&source, &lines, &state).save(&out)?;
            println!("{}", output::format_preview_output(&out, bounds, lines.len()));
        }
        Command::Serve { bind } => {
            let mut site_config = load()?;
            if let Some(bind) = bind {
                site_config.server.bind = bind;
            }
            Server::bind(site_config)?.run()?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Read only the image header.
fn probe(path: &Path) -> Result<ImageBounds, Box<dyn std::error::Error>> {
    let (width, height) = image::image_dimensions(path)?;
    Ok(ImageBounds::new(width, height))
}

fn read_lines(path: &Path) -> Result<Vec<GridLine>, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Build the layout from CLI flags and config.
///
/// Returns `Ok(None)` when an evenly spaced grid is requested but `bounds`
/// is not yet known.
fn build_layout(
    grid: &GridArgs,
    config: &SplitConfig,
    bounds: Option<ImageBounds>,
) -> Result<Option<Layout>, Box<dyn std::error::Error>> {
    if let Some(cells) = &grid.cells {
        return Ok(Some(Layout::Cells(parse_cells(cells)?)));
    }
    if let Some(path) = &grid.lines {
        return Ok(Some(Layout::Lines(read_lines(path)?)));
    }
    let rows = grid.rows.unwrap_or(config.grid.rows);
    let columns = grid.columns.unwrap_or(config.grid.columns);
    validate_grid(rows, columns)?;
    if grid.uniform {
        return Ok(Some(Layout::Uniform { rows, columns }));
    }
    Ok(bounds.map(|bounds| Layout::Lines(regenerate(rows, columns, bounds))))
}

/// Lines to draw for a preview. Explicit cells have no lines, so their
/// boundaries are drawn as the lines of the equivalent even grid.
fn preview_lines(
    grid: &GridArgs,
    config: &SplitConfig,
    bounds: ImageBounds,
) -> Result<Vec<GridLine>, Box<dyn std::error::Error>> {
    if let Some(path) = &grid.lines {
        return read_lines(path);
    }
    let rows = grid.rows.unwrap_or(config.grid.rows);
    let columns = grid.columns.unwrap_or(config.grid.columns);
    validate_grid(rows, columns)?;
    Ok(regenerate(rows, columns, bounds))
}

/// Row and column counts for the cell listing header. Explicit cells have none.
fn grid_shape(layout: &Layout) -> Option<(u32, u32)> {
    match layout {
        Layout::Uniform { rows, columns } => Some((*rows, *columns)),
        Layout::Lines(lines) => {
            let horizontal = lines.iter().filter(|l| l.is_horizontal).count() as u32;
            let vertical = lines.len() as u32 - horizontal;
            Some((horizontal + 1, vertical + 1))
        }
        Layout::Cells(_) => None,
    }
}

/// `out` may name a file or an existing directory.
fn resolve_out_path(out: Option<&Path>, filename: &str) -> PathBuf {
    match out {
        Some(path) if path.is_dir() => path.join(filename),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(filename),
    }
}
