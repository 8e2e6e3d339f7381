//! PDF Raster Cache Library
//!
//! Read-once tile cache for prefetched page blocks.
//!
//! The cache is a three-level table: rendering context -> page -> tile id
//! -> pixel block. A look-ahead pass fills it in bulk; readers drain it
//! one block at a time. Reads consume: a block handed to a reader leaves
//! the table, which bounds memory without any LRU machinery. The only
//! other way out is explicit eviction by page or by resolution level.

use std::collections::HashMap;
use std::sync::Mutex;

use pdf_raster_core::{PixelBlock, RenderContextId, TileGrid, TileId};

/// Counters describing cache traffic.
///
/// Observability only; nothing reads these to make decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Blocks currently resident in the table.
    pub resident_blocks: usize,

    /// Total insertions, including overwrites.
    pub inserts: u64,

    /// Successful consuming reads.
    pub hits: u64,

    /// Reads that found nothing.
    pub misses: u64,

    /// Blocks dropped by overwrite or explicit eviction without ever
    /// being consumed.
    pub evicted: u64,
}

/// Table state behind the cache's single lock.
#[derive(Default)]
struct CacheState {
    contexts: HashMap<RenderContextId, HashMap<u32, HashMap<TileId, PixelBlock>>>,
    stats: CacheStats,
}

impl CacheState {
    fn page_blocks(&mut self, context: RenderContextId, page: u32) -> Option<&mut HashMap<TileId, PixelBlock>> {
        self.contexts.get_mut(&context)?.get_mut(&page)
    }

    /// Drop empty inner maps so torn-down contexts do not linger.
    fn prune(&mut self, context: RenderContextId, page: u32) {
        if let Some(pages) = self.contexts.get_mut(&context) {
            if pages.get(&page).is_some_and(HashMap::is_empty) {
                pages.remove(&page);
            }
            if pages.is_empty() {
                self.contexts.remove(&context);
            }
        }
    }
}

/// Read-once tile cache shared by every editor of one page object.
///
/// One coarse mutex guards the whole table for the full duration of each
/// operation; rendering never happens under this lock. Cache operations
/// never fail; a miss is `None`, never an error.
pub struct TileCache {
    state: Mutex<CacheState>,
}

impl TileCache {
    pub fn new() -> Self {
        Self { state: Mutex::new(CacheState::default()) }
    }

    /// Store a block under (context, page, id), overwriting any existing
    /// entry for that exact tile. The overwritten block is dropped.
    pub fn insert(&self, context: RenderContextId, page: u32, id: TileId, block: PixelBlock) {
        debug_assert!(id.is_valid(), "caching the invalid sentinel");
        debug_assert!(block.byte_len() > 0, "caching an empty block");

        let mut state = self.state.lock().unwrap();
        state.stats.inserts += 1;

        let replaced = state
            .contexts
            .entry(context)
            .or_default()
            .entry(page)
            .or_default()
            .insert(id, block);

        if replaced.is_some() {
            state.stats.evicted += 1;
        } else {
            state.stats.resident_blocks += 1;
        }
    }

    /// Consume the block cached under (context, page, id).
    ///
    /// On a hit the entry is removed and ownership of the block moves to
    /// the caller; an immediate second call with the same key misses.
    pub fn try_take_block(
        &self,
        context: RenderContextId,
        page: u32,
        id: TileId,
    ) -> Option<PixelBlock> {
        let mut state = self.state.lock().unwrap();

        let block = state.page_blocks(context, page).and_then(|blocks| blocks.remove(&id));
        match block {
            Some(block) => {
                state.stats.hits += 1;
                state.stats.resident_blocks -= 1;
                state.prune(context, page);
                Some(block)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Drop every block cached under (context, page). Returns the number
    /// of blocks dropped.
    pub fn evict_page(&self, context: RenderContextId, page: u32) -> usize {
        let mut state = self.state.lock().unwrap();

        let dropped = state
            .contexts
            .get_mut(&context)
            .and_then(|pages| pages.remove(&page))
            .map_or(0, |blocks| blocks.len());

        state.stats.resident_blocks -= dropped;
        state.stats.evicted += dropped as u64;
        state.prune(context, page);

        if dropped > 0 {
            log::debug!(
                "evict_page: dropped {dropped} block(s) for context {} page {page}",
                context.raw()
            );
        }
        dropped
    }

    /// Drop every block cached under (context, page) whose tile sits at
    /// `level`, leaving other levels untouched. Returns the number of
    /// blocks dropped.
    ///
    /// This scans the page's entries and decodes each id through the
    /// grid; eviction only happens on editor teardown, so the scan is not
    /// worth indexing.
    pub fn evict_level(
        &self,
        context: RenderContextId,
        page: u32,
        grid: &TileGrid,
        level: u8,
    ) -> usize {
        let mut state = self.state.lock().unwrap();

        let dropped = match state.page_blocks(context, page) {
            Some(blocks) => {
                let before = blocks.len();
                blocks.retain(|&id, _| grid.level_of(id) != level);
                before - blocks.len()
            }
            None => 0,
        };

        state.stats.resident_blocks -= dropped;
        state.stats.evicted += dropped as u64;
        state.prune(context, page);

        if dropped > 0 {
            log::debug!(
                "evict_level: dropped {dropped} block(s) at level {level} for context {} page {page}",
                context.raw()
            );
        }
        dropped
    }

    /// Number of blocks resident under (context, page).
    pub fn block_count(&self, context: RenderContextId, page: u32) -> usize {
        let state = self.state.lock().unwrap();
        state
            .contexts
            .get(&context)
            .and_then(|pages| pages.get(&page))
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.stats.resident_blocks == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        state.stats
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: RenderContextId = RenderContextId::new(1);
    const OTHER_CTX: RenderContextId = RenderContextId::new(2);

    fn grid() -> TileGrid {
        TileGrid::new(4096, 4096, 1024, 1024)
    }

    fn block(fill: u8) -> PixelBlock {
        PixelBlock::from_pixels(4, 4, vec![fill; 4 * 4 * 3])
    }

    #[test]
    fn take_consumes_the_entry() {
        let cache = TileCache::new();
        let grid = grid();
        let id = grid.encode(0, 0, 0);

        cache.insert(CTX, 0, id, block(9));

        let taken = cache.try_take_block(CTX, 0, id).expect("first take hits");
        assert_eq!(taken.pixels()[0], 9);

        // Read removes: the same key now misses.
        assert!(cache.try_take_block(CTX, 0, id).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.resident_blocks, 0);
    }

    #[test]
    fn insert_overwrites_the_same_key() {
        let cache = TileCache::new();
        let grid = grid();
        let id = grid.encode(1024, 0, 0);

        cache.insert(CTX, 0, id, block(1));
        cache.insert(CTX, 0, id, block(2));

        assert_eq!(cache.block_count(CTX, 0), 1);
        let taken = cache.try_take_block(CTX, 0, id).expect("one entry retrievable");
        assert_eq!(taken.pixels()[0], 2);
        assert_eq!(cache.stats().evicted, 1);
    }

    #[test]
    fn miss_is_not_an_error() {
        let cache = TileCache::new();
        let grid = grid();

        assert!(cache.try_take_block(CTX, 0, grid.encode(0, 0, 0)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn contexts_are_isolated() {
        let cache = TileCache::new();
        let grid = grid();
        let id = grid.encode(0, 0, 0);

        cache.insert(CTX, 0, id, block(1));
        cache.insert(OTHER_CTX, 0, id, block(2));

        let taken = cache.try_take_block(CTX, 0, id).expect("ctx 1 entry");
        assert_eq!(taken.pixels()[0], 1);
        // The other context still holds its own block for the same tile.
        assert_eq!(cache.block_count(OTHER_CTX, 0), 1);
    }

    #[test]
    fn evict_page_scopes_to_context_and_page() {
        let cache = TileCache::new();
        let grid = grid();

        cache.insert(CTX, 0, grid.encode(0, 0, 0), block(1));
        cache.insert(CTX, 0, grid.encode(1024, 0, 0), block(2));
        cache.insert(CTX, 1, grid.encode(0, 0, 0), block(3));
        cache.insert(OTHER_CTX, 0, grid.encode(0, 0, 0), block(4));

        assert_eq!(cache.evict_page(CTX, 0), 2);

        assert_eq!(cache.block_count(CTX, 0), 0);
        assert_eq!(cache.block_count(CTX, 1), 1);
        assert_eq!(cache.block_count(OTHER_CTX, 0), 1);

        // Evicting an absent page is a no-op, not an error.
        assert_eq!(cache.evict_page(CTX, 7), 0);
    }

    #[test]
    fn evict_level_removes_only_matching_levels() {
        let cache = TileCache::new();
        let grid = grid();

        cache.insert(CTX, 0, grid.encode(0, 0, 0), block(1));
        cache.insert(CTX, 0, grid.encode(1024, 1024, 0), block(2));
        cache.insert(CTX, 0, grid.encode(0, 0, 1), block(3));
        cache.insert(CTX, 0, grid.encode(0, 0, 2), block(4));

        assert_eq!(cache.evict_level(CTX, 0, &grid, 0), 2);
        assert_eq!(cache.block_count(CTX, 0), 2);

        // Tiles at other levels remain retrievable afterward.
        assert!(cache.try_take_block(CTX, 0, grid.encode(0, 0, 1)).is_some());
        assert!(cache.try_take_block(CTX, 0, grid.encode(0, 0, 2)).is_some());
    }

    #[test]
    fn is_empty_tracks_residency() {
        let cache = TileCache::new();
        let grid = grid();
        assert!(cache.is_empty());

        cache.insert(CTX, 0, grid.encode(0, 0, 0), block(1));
        assert!(!cache.is_empty());

        cache.evict_page(CTX, 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_insert_and_take_stay_consistent() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(TileCache::new());
        let grid = Arc::new(TileGrid::new(64 * 1024, 1024, 16, 16));

        let mut handles = Vec::new();
        for thread_id in 0..4u64 {
            let cache = Arc::clone(&cache);
            let grid = Arc::clone(&grid);
            handles.push(thread::spawn(move || {
                let ctx = RenderContextId::new(thread_id);
                let mut hits = 0usize;
                for col in 0..256u64 {
                    let id = grid.encode(col * 16, 0, 0);
                    cache.insert(ctx, 0, id, PixelBlock::zeroed(16, 16));
                    if cache.try_take_block(ctx, 0, id).is_some() {
                        hits += 1;
                    }
                }
                hits
            }));
        }

        // Each thread works under its own context, so every take hits.
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 4 * 256);
        assert!(cache.is_empty());
    }
}
