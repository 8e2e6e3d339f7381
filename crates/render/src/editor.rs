//! Resolution editors
//!
//! The per-(page, level, context) read path. An editor drains the cache
//! opportunistically: blocks warmed by a look-ahead pass are consumed on
//! first read, and anything else is rendered directly, one tile at a
//! time. Editors never populate the cache (that is the planner's job),
//! and they tear their own slice of it down when dropped.

use std::sync::Arc;

use pdf_raster_cache::TileCache;
use pdf_raster_core::{PixelBlock, PixelRect, RenderContextId, TileGrid};

use crate::renderer::{check_region_buffer, PageRenderer, RenderResult};

pub struct ResolutionEditor {
    renderer: Arc<dyn PageRenderer>,
    cache: Arc<TileCache>,
    grid: TileGrid,
    page: u32,
    level: u8,
    context: RenderContextId,
}

impl ResolutionEditor {
    pub(crate) fn new(
        renderer: Arc<dyn PageRenderer>,
        cache: Arc<TileCache>,
        grid: TileGrid,
        page: u32,
        level: u8,
        context: RenderContextId,
    ) -> Self {
        Self { renderer, cache, grid, page, level, context }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn context(&self) -> RenderContextId {
        self.context
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Read one tile block by its block coordinates within this editor's
    /// level.
    ///
    /// A cached block is consumed and returned without touching the
    /// renderer. On a miss the tile's rectangle is rendered directly and
    /// the result is returned uncached. Block coordinates outside the
    /// level's grid are a caller bug.
    pub fn read_block(&self, block_x: u64, block_y: u64) -> RenderResult<PixelBlock> {
        let tile_w = u64::from(self.grid.tile_width());
        let tile_h = u64::from(self.grid.tile_height());
        let id = self.grid.encode(block_x * tile_w, block_y * tile_h, self.level);
        debug_assert!(
            id.is_valid(),
            "block ({block_x}, {block_y}) outside the level {} grid",
            self.level
        );

        if let Some(block) = self.cache.try_take_block(self.context, self.page, id) {
            return Ok(block);
        }

        let region = self.grid.tile_rect(id);
        let pixels = self.renderer.render_region(self.page, self.level, &region, self.context)?;
        check_region_buffer(&region, &pixels)?;
        Ok(PixelBlock::from_pixels(self.grid.tile_width(), self.grid.tile_height(), pixels))
    }

    /// Read an arbitrary tile-aligned rectangle in one renderer call,
    /// bypassing the cache entirely.
    ///
    /// The corners must lie on tile boundaries with `max > min` on both
    /// axes; anything else is a caller bug.
    pub fn read_block_rect(&self, region: &PixelRect) -> RenderResult<PixelBlock> {
        let tile_w = u64::from(self.grid.tile_width());
        let tile_h = u64::from(self.grid.tile_height());
        debug_assert!(
            region.min_x % tile_w == 0
                && region.min_y % tile_h == 0
                && region.max_x % tile_w == 0
                && region.max_y % tile_h == 0,
            "region {region:?} is not tile-aligned"
        );
        debug_assert!(!region.is_empty(), "region {region:?} is inverted or empty");

        let pixels = self.renderer.render_region(self.page, self.level, region, self.context)?;
        check_region_buffer(region, &pixels)?;
        Ok(PixelBlock::from_pixels(region.width() as u32, region.height() as u32, pixels))
    }
}

impl Drop for ResolutionEditor {
    /// No block cached for this editor outlives it.
    fn drop(&mut self) {
        self.cache.evict_level(self.context, self.page, &self.grid, self.level);
    }
}
