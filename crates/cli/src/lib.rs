use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_raster_core::{QueryShape, RenderContextId};
use pdf_raster_render::{OutlineRenderer, RasterFile, ResolutionEditor};
use serde::Serialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "pdf-raster-cli")]
#[command(about = "PDF raster adapter CLI")]
pub struct Cli {
    /// Log debug detail to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable tile geometry for a PDF.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one tile block to PNG.
    RenderBlock {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        level: u8,
        /// Block column within the level's tile grid.
        #[arg(long, default_value_t = 0)]
        x: u64,
        /// Block row within the level's tile grid.
        #[arg(long, default_value_t = 0)]
        y: u64,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render a pixel region to PNG, warming the cache with a look-ahead
    /// pass first.
    RenderRegion {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        level: u8,
        /// Region as x0,y0,x1,y1 in level pixels.
        #[arg(long)]
        region: String,
        #[arg(long)]
        output: PathBuf,
        /// Skip the look-ahead pass and render tiles one by one.
        #[arg(long)]
        no_look_ahead: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageInfo>,
}

#[derive(Debug, Serialize)]
struct PageInfo {
    width_px: u64,
    height_px: u64,
    level_count: u8,
    tiles_across: u64,
    tiles_down: u64,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::RenderBlock { file, page, level, x, y, output } => {
            run_render_block(&file, page, level, x, y, &output)
        }
        Commands::RenderRegion { file, page, level, region, output, no_look_ahead } => {
            run_render_region(&file, page, level, &region, &output, no_look_ahead)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_raster_file(file: &Path) -> Result<RasterFile> {
    if !file.exists() {
        anyhow::bail!("file does not exist: {}", file.display());
    }
    let renderer = OutlineRenderer::open(file).context("failed to open PDF")?;
    RasterFile::open(Arc::new(renderer)).context("failed to build tile grids")
}

fn run_info(file: &Path) -> Result<()> {
    let raster = open_raster_file(file)?;

    let mut pages = Vec::with_capacity(raster.page_count() as usize);
    for page in 0..raster.page_count() {
        let grid = raster.grid(page)?;
        pages.push(PageInfo {
            width_px: grid.page_width(),
            height_px: grid.page_height(),
            level_count: grid.level_count(),
            tiles_across: grid.tiles_across(0),
            tiles_down: grid.tiles_down(0),
        });
    }

    let payload =
        InfoOutput { path: file.display().to_string(), page_count: raster.page_count(), pages };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_render_block(
    file: &Path,
    page: u32,
    level: u8,
    x: u64,
    y: u64,
    output: &Path,
) -> Result<()> {
    let raster = open_raster_file(file)?;
    let editor = raster.create_editor(page, level, RenderContextId::new(0))?;

    let grid = editor.grid();
    if x >= grid.tiles_across(level) || y >= grid.tiles_down(level) {
        anyhow::bail!(
            "block ({x}, {y}) outside the {}x{} grid at level {level}",
            grid.tiles_across(level),
            grid.tiles_down(level)
        );
    }

    let block = editor.read_block(x, y).context("failed to render block")?;
    save_png(output, block.width(), block.height(), block.into_pixels())
}

fn run_render_region(
    file: &Path,
    page: u32,
    level: u8,
    region: &str,
    output: &Path,
    no_look_ahead: bool,
) -> Result<()> {
    let raster = open_raster_file(file)?;
    let (x0, y0, x1, y1) = parse_region(region)?;

    let editor = raster.create_editor(page, level, RenderContextId::new(0))?;
    let grid = editor.grid().clone();
    let (level_w, level_h) = grid.level_extent(level);
    if x1 > level_w || y1 > level_h {
        anyhow::bail!("region exceeds the {level_w}x{level_h} page extent at level {level}");
    }

    if !no_look_ahead {
        let cached = raster.set_look_ahead(
            RenderContextId::new(0),
            page,
            level,
            &QueryShape::rect(x0 as f64, y0 as f64, x1 as f64, y1 as f64),
        );
        log::debug!("look-ahead warmed {cached} block(s)");
    }

    let pixels = stitch_region(&editor, x0, y0, x1, y1)?;
    save_png(output, (x1 - x0) as u32, (y1 - y0) as u32, pixels)
}

/// Assemble a pixel region from its covering tile blocks.
fn stitch_region(
    editor: &ResolutionEditor,
    x0: u64,
    y0: u64,
    x1: u64,
    y1: u64,
) -> Result<Vec<u8>> {
    let grid = editor.grid();
    let tile_w = u64::from(grid.tile_width());
    let tile_h = u64::from(grid.tile_height());

    let out_w = (x1 - x0) as usize;
    let out_h = (y1 - y0) as usize;
    let mut out = vec![255u8; out_w * out_h * 3];

    for tile_row in y0 / tile_h..=(y1 - 1) / tile_h {
        for tile_col in x0 / tile_w..=(x1 - 1) / tile_w {
            let block = editor
                .read_block(tile_col, tile_row)
                .with_context(|| format!("failed to render block ({tile_col}, {tile_row})"))?;

            let tile_min_x = tile_col * tile_w;
            let tile_min_y = tile_row * tile_h;
            let copy_x0 = x0.max(tile_min_x);
            let copy_x1 = x1.min(tile_min_x + tile_w);
            let copy_len = (copy_x1 - copy_x0) as usize * 3;

            for y in y0.max(tile_min_y)..y1.min(tile_min_y + tile_h) {
                let src =
                    ((y - tile_min_y) as usize * tile_w as usize + (copy_x0 - tile_min_x) as usize)
                        * 3;
                let dst = ((y - y0) as usize * out_w + (copy_x0 - x0) as usize) * 3;
                out[dst..dst + copy_len].copy_from_slice(&block.pixels()[src..src + copy_len]);
            }
        }
    }

    Ok(out)
}

fn parse_region(region: &str) -> Result<(u64, u64, u64, u64)> {
    let parts: Vec<u64> = region
        .split(',')
        .map(|part| part.trim().parse::<u64>().context("region values must be integers"))
        .collect::<Result<_>>()?;
    let &[x0, y0, x1, y1] = parts.as_slice() else {
        anyhow::bail!("region must be x0,y0,x1,y1");
    };
    if x1 <= x0 || y1 <= y0 {
        anyhow::bail!("region must have positive width and height");
    }
    Ok((x0, y0, x1, y1))
}

fn save_png(output: &Path, width: u32, height: u32, pixels: Vec<u8>) -> Result<()> {
    let image = image::RgbImage::from_raw(width, height, pixels)
        .context("pixel buffer does not match image dimensions")?;
    image.save(output).with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}
