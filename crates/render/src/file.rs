//! Raster file facade
//!
//! The surface the raster-file framework talks to: one `RasterFile` per
//! document, owning the renderer, the shared tile cache, and a tile grid
//! per page. Editors are created from here, and look-ahead requests and
//! their teardown run through here.

use std::sync::Arc;

use pdf_raster_cache::TileCache;
use pdf_raster_core::{QueryShape, RenderContextId, TileGrid, DEFAULT_TILE_SIZE};

use crate::editor::ResolutionEditor;
use crate::lookahead;
use crate::renderer::{PageRenderer, RenderError, RenderResult};

pub struct RasterFile {
    renderer: Arc<dyn PageRenderer>,
    cache: Arc<TileCache>,
    grids: Vec<TileGrid>,
    look_ahead_enabled: bool,
}

impl RasterFile {
    /// Open a document with the default tile size.
    pub fn open(renderer: Arc<dyn PageRenderer>) -> RenderResult<Self> {
        Self::with_tile_size(renderer, DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE)
    }

    /// Open a document with an explicit tile size.
    pub fn with_tile_size(
        renderer: Arc<dyn PageRenderer>,
        tile_width: u32,
        tile_height: u32,
    ) -> RenderResult<Self> {
        Self::with_cache(renderer, Arc::new(TileCache::new()), tile_width, tile_height)
    }

    /// Open a document sharing an existing cache.
    ///
    /// Callers on different threads each construct their own renderer and
    /// `RasterFile` but pass the same cache, which is the only piece of
    /// shared state.
    pub fn with_cache(
        renderer: Arc<dyn PageRenderer>,
        cache: Arc<TileCache>,
        tile_width: u32,
        tile_height: u32,
    ) -> RenderResult<Self> {
        let mut grids = Vec::with_capacity(renderer.page_count() as usize);
        for page in 0..renderer.page_count() {
            let (width, height) = renderer.page_extent(page)?;
            grids.push(TileGrid::new(width, height, tile_width, tile_height));
        }
        Ok(Self { renderer, cache, grids, look_ahead_enabled: true })
    }

    pub fn page_count(&self) -> u32 {
        self.grids.len() as u32
    }

    /// Tile grid of a page.
    pub fn grid(&self, page: u32) -> RenderResult<&TileGrid> {
        self.grids.get(page as usize).ok_or(RenderError::PageOutOfRange {
            page,
            page_count: self.grids.len() as u32,
        })
    }

    /// Shared handle to the tile cache.
    pub fn cache(&self) -> Arc<TileCache> {
        Arc::clone(&self.cache)
    }

    pub fn look_ahead_enabled(&self) -> bool {
        self.look_ahead_enabled
    }

    /// Turn look-ahead off (or back on). With look-ahead off,
    /// `set_look_ahead` becomes a no-op and every read renders directly.
    pub fn set_look_ahead_enabled(&mut self, enabled: bool) {
        self.look_ahead_enabled = enabled;
    }

    /// Create the read path for one (page, level) under a rendering
    /// context.
    pub fn create_editor(
        &self,
        page: u32,
        level: u8,
        context: RenderContextId,
    ) -> RenderResult<ResolutionEditor> {
        let grid = self.grid(page)?;
        if level >= grid.level_count() {
            return Err(RenderError::LevelOutOfRange { level, level_count: grid.level_count() });
        }
        Ok(ResolutionEditor::new(
            Arc::clone(&self.renderer),
            Arc::clone(&self.cache),
            grid.clone(),
            page,
            level,
            context,
        ))
    }

    /// Warm the cache for a query region ahead of reads.
    ///
    /// Best-effort: returns the number of blocks cached, with zero for an
    /// empty shape, an out-of-range page or level, a failed render, or
    /// look-ahead disabled. Never an error; readers always have the
    /// direct-render fallback.
    pub fn set_look_ahead(
        &self,
        context: RenderContextId,
        page: u32,
        level: u8,
        shape: &QueryShape,
    ) -> usize {
        if !self.look_ahead_enabled {
            return 0;
        }
        let Ok(grid) = self.grid(page) else {
            log::debug!("set_look_ahead: page {page} out of range");
            return 0;
        };
        if level >= grid.level_count() {
            log::debug!("set_look_ahead: level {level} out of range for page {page}");
            return 0;
        }
        lookahead::prefetch(self.renderer.as_ref(), &self.cache, grid, context, page, level, shape)
    }

    /// Drop every block cached for (context, page). Returns the number
    /// dropped.
    pub fn stop_look_ahead(&self, context: RenderContextId, page: u32) -> usize {
        self.cache.evict_page(context, page)
    }

    /// Drop the blocks cached for (context, page) at one level only.
    /// Returns the number dropped.
    pub fn remove_look_ahead(&self, context: RenderContextId, page: u32, level: u8) -> usize {
        let Ok(grid) = self.grid(page) else {
            return 0;
        };
        self.cache.evict_level(context, page, grid, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRenderer;

    const CTX: RenderContextId = RenderContextId::new(1);

    fn file_4096() -> (Arc<ScriptedRenderer>, RasterFile) {
        let renderer = Arc::new(ScriptedRenderer::single_page(4096, 4096));
        let file = RasterFile::with_tile_size(renderer.clone(), 1024, 1024)
            .expect("grids built from page extents");
        (renderer, file)
    }

    #[test]
    fn grids_follow_the_renderer_geometry() {
        let (_, file) = file_4096();
        assert_eq!(file.page_count(), 1);

        let grid = file.grid(0).expect("page 0 exists");
        assert_eq!(grid.tiles_across(0), 4);
        assert_eq!(grid.level_count(), 3);
        assert!(matches!(file.grid(3), Err(RenderError::PageOutOfRange { .. })));
    }

    #[test]
    fn create_editor_validates_page_and_level() {
        let (_, file) = file_4096();
        assert!(file.create_editor(0, 0, CTX).is_ok());
        assert!(matches!(
            file.create_editor(0, 9, CTX),
            Err(RenderError::LevelOutOfRange { level: 9, level_count: 3 })
        ));
        assert!(matches!(
            file.create_editor(5, 0, CTX),
            Err(RenderError::PageOutOfRange { .. })
        ));
    }

    #[test]
    fn warmed_reads_hit_then_fall_back() {
        // 4096x4096 page, 1024x1024 tiles, level 0. Look-ahead over the
        // (0,0)-(2048,2048) rectangle renders once and caches four tiles;
        // the first read of (0,0) consumes its block, the second renders
        // directly.
        let (renderer, file) = file_4096();

        let cached =
            file.set_look_ahead(CTX, 0, 0, &QueryShape::rect(0.0, 0.0, 2048.0, 2048.0));
        assert_eq!(cached, 4);
        assert_eq!(renderer.call_count(), 1);

        let editor = file.create_editor(0, 0, CTX).expect("editor");
        let block = editor.read_block(0, 0).expect("cache hit");
        assert_eq!(&block.pixels()[..3], &ScriptedRenderer::sample(0, 0, 0));
        assert_eq!(renderer.call_count(), 1);

        let _ = editor.read_block(0, 0).expect("direct fallback");
        assert_eq!(renderer.call_count(), 2);
    }

    #[test]
    fn disabled_look_ahead_is_a_no_op() {
        let (renderer, mut file) = file_4096();
        file.set_look_ahead_enabled(false);
        assert!(!file.look_ahead_enabled());

        let cached =
            file.set_look_ahead(CTX, 0, 0, &QueryShape::rect(0.0, 0.0, 2048.0, 2048.0));
        assert_eq!(cached, 0);
        assert_eq!(renderer.call_count(), 0);
        assert!(file.cache().is_empty());
    }

    #[test]
    fn out_of_range_requests_are_best_effort_no_ops() {
        let (renderer, file) = file_4096();
        let shape = QueryShape::rect(0.0, 0.0, 100.0, 100.0);

        assert_eq!(file.set_look_ahead(CTX, 9, 0, &shape), 0);
        assert_eq!(file.set_look_ahead(CTX, 0, 9, &shape), 0);
        assert_eq!(renderer.call_count(), 0);
    }

    #[test]
    fn stop_look_ahead_clears_the_context_page() {
        let (_, file) = file_4096();

        file.set_look_ahead(CTX, 0, 0, &QueryShape::rect(0.0, 0.0, 2048.0, 2048.0));
        assert_eq!(file.cache().block_count(CTX, 0), 4);

        assert_eq!(file.stop_look_ahead(CTX, 0), 4);
        assert!(file.cache().is_empty());
    }

    #[test]
    fn remove_look_ahead_clears_one_level() {
        let (_, file) = file_4096();

        file.set_look_ahead(CTX, 0, 0, &QueryShape::rect(0.0, 0.0, 2048.0, 2048.0));
        file.set_look_ahead(CTX, 0, 1, &QueryShape::rect(0.0, 0.0, 2048.0, 2048.0));
        assert_eq!(file.cache().block_count(CTX, 0), 8);

        assert_eq!(file.remove_look_ahead(CTX, 0, 1), 4);
        assert_eq!(file.cache().block_count(CTX, 0), 4);
    }

    #[test]
    fn editors_share_the_warmed_cache_across_instances() {
        let (renderer, file) = file_4096();

        file.set_look_ahead(CTX, 0, 0, &QueryShape::rect(0.0, 0.0, 2048.0, 2048.0));

        // Two editors over the same (page, level, context) drain the same
        // pool of blocks.
        let first = file.create_editor(0, 0, CTX).expect("editor");
        let second = file.create_editor(0, 0, CTX).expect("editor");
        assert!(first.read_block(0, 0).is_ok());
        assert!(second.read_block(1, 0).is_ok());
        assert_eq!(renderer.call_count(), 1);
    }
}
