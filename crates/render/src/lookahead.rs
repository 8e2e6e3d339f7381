//! Look-ahead planner
//!
//! The prefetch pass behind `RasterFile::set_look_ahead`: rasterize the
//! minimal tile-aligned rectangle covering a query shape in one renderer
//! call, slice the result into canonical tile blocks, and hand them to
//! the cache. Best-effort throughout: a renderer failure caches nothing
//! and is never surfaced to the caller, because the direct-render
//! fallback in the editor still serves every read.

use pdf_raster_cache::TileCache;
use pdf_raster_core::{
    PixelBlock, PixelRect, QueryShape, RenderContextId, TileGrid, TileId, BYTES_PER_PIXEL,
};

use crate::renderer::{check_region_buffer, PageRenderer};

/// Run one look-ahead pass. Returns the number of blocks cached (zero for
/// an empty or off-grid shape, and zero when the render failed).
pub(crate) fn prefetch(
    renderer: &dyn PageRenderer,
    cache: &TileCache,
    grid: &TileGrid,
    context: RenderContextId,
    page: u32,
    level: u8,
    shape: &QueryShape,
) -> usize {
    let tiles = grid.tiles_in_shape(shape, level);
    let Some(region) = covering_rect(grid, &tiles) else {
        return 0; // nothing overlapped: silent no-op, not an error
    };

    // One renderer call amortized over every covered tile.
    let buffer = match renderer
        .render_region(page, level, &region, context)
        .and_then(|buffer| check_region_buffer(&region, &buffer).map(|()| buffer))
    {
        Ok(buffer) => buffer,
        Err(error) => {
            log::debug!("look-ahead for page {page} level {level} skipped: {error}");
            return 0;
        }
    };

    let stride = region.width() as usize * BYTES_PER_PIXEL;
    let tile_w = grid.tile_width() as usize;
    let tile_h = grid.tile_height() as usize;

    for &id in &tiles {
        let rect = grid.tile_rect(id);
        let mut pixels = Vec::with_capacity(tile_w * tile_h * BYTES_PER_PIXEL);
        for row in 0..tile_h {
            let src_y = (rect.min_y - region.min_y) as usize + row;
            let src_x = (rect.min_x - region.min_x) as usize;
            let start = src_y * stride + src_x * BYTES_PER_PIXEL;
            pixels.extend_from_slice(&buffer[start..start + tile_w * BYTES_PER_PIXEL]);
        }
        cache.insert(
            context,
            page,
            id,
            PixelBlock::from_pixels(grid.tile_width(), grid.tile_height(), pixels),
        );
    }

    log::debug!("look-ahead cached {} block(s) for page {page} level {level}", tiles.len());
    tiles.len()
}

/// Minimal tile-aligned rectangle covering `tiles`, or `None` when there
/// is nothing to cover.
fn covering_rect(grid: &TileGrid, tiles: &[TileId]) -> Option<PixelRect> {
    tiles.iter().map(|&id| grid.tile_rect(id)).reduce(|a, b| {
        PixelRect::new(
            a.min_x.min(b.min_x),
            a.min_y.min(b.min_y),
            a.max_x.max(b.max_x),
            a.max_y.max(b.max_y),
        )
    })
}
