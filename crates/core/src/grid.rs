//! Tile grids and tile identifiers
//!
//! A page is divided into fixed-size tiles at every resolution level of a
//! halving pyramid. Each tile has a single integer id derived from the
//! page's pixel dimensions and the tile size, so ids round-trip to grid
//! positions without auxiliary state.

use crate::shape::QueryShape;

/// Default tile size in pixels (1024x1024).
pub const DEFAULT_TILE_SIZE: u32 = 1024;

/// Pixel extent of a page at a resolution level.
///
/// Levels halve the extent, rounding up, so every level covers the whole
/// page. Grids and renderer backends both use this so they agree on level
/// geometry.
pub fn scale_extent(extent: u64, level: u8) -> u64 {
    let shift = u32::from(level);
    (extent + (1u64 << shift) - 1) >> shift
}

/// Integer identifier of one tile within a page's tile pyramid.
///
/// Ids are assigned row-major within a level, offset by the tile count of
/// all finer levels, so an id encodes (column, row, level) in one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(u64);

impl TileId {
    /// Reserved sentinel for a position outside the page's tile grid.
    pub const INVALID: TileId = TileId(u64::MAX);

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Axis-aligned pixel rectangle, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub min_x: u64,
    pub min_y: u64,
    pub max_x: u64,
    pub max_y: u64,
}

impl PixelRect {
    pub fn new(min_x: u64, min_y: u64, max_x: u64, max_y: u64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> u64 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u64 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn is_empty(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }
}

/// Tile grid of one page: pixel extent, tile size, and the id layout of
/// every resolution level.
///
/// The grid is the sole authority for encoding and decoding tile ids;
/// everything else (cache eviction, the look-ahead planner, editors) goes
/// through it.
#[derive(Debug, Clone)]
pub struct TileGrid {
    page_width: u64,
    page_height: u64,
    tile_width: u32,
    tile_height: u32,
    level_count: u8,
    /// Id offset per level; `level_offsets[level_count]` is the total
    /// tile count over all levels.
    level_offsets: Vec<u64>,
}

impl TileGrid {
    /// Build the grid for a page of `page_width` x `page_height` pixels at
    /// full resolution.
    ///
    /// The level count is derived: levels halve the extent until a single
    /// tile covers the page.
    pub fn new(page_width: u64, page_height: u64, tile_width: u32, tile_height: u32) -> Self {
        debug_assert!(page_width > 0 && page_height > 0, "page extent must be non-zero");
        debug_assert!(tile_width > 0 && tile_height > 0, "tile size must be non-zero");

        let mut level_count = 1u8;
        while scale_extent(page_width, level_count - 1) > u64::from(tile_width)
            || scale_extent(page_height, level_count - 1) > u64::from(tile_height)
        {
            level_count += 1;
        }

        let mut level_offsets = Vec::with_capacity(usize::from(level_count) + 1);
        let mut offset = 0u64;
        for level in 0..level_count {
            level_offsets.push(offset);
            let across = scale_extent(page_width, level).div_ceil(u64::from(tile_width));
            let down = scale_extent(page_height, level).div_ceil(u64::from(tile_height));
            offset += across * down;
        }
        level_offsets.push(offset);

        Self { page_width, page_height, tile_width, tile_height, level_count, level_offsets }
    }

    pub fn page_width(&self) -> u64 {
        self.page_width
    }

    pub fn page_height(&self) -> u64 {
        self.page_height
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn level_count(&self) -> u8 {
        self.level_count
    }

    /// Page pixel extent at a resolution level.
    pub fn level_extent(&self, level: u8) -> (u64, u64) {
        (scale_extent(self.page_width, level), scale_extent(self.page_height, level))
    }

    /// Number of tile columns at a level.
    pub fn tiles_across(&self, level: u8) -> u64 {
        scale_extent(self.page_width, level).div_ceil(u64::from(self.tile_width))
    }

    /// Number of tile rows at a level.
    pub fn tiles_down(&self, level: u8) -> u64 {
        scale_extent(self.page_height, level).div_ceil(u64::from(self.tile_height))
    }

    /// Number of tiles at a level.
    pub fn tile_count(&self, level: u8) -> u64 {
        self.tiles_across(level) * self.tiles_down(level)
    }

    /// Total tile count over every level of the pyramid.
    pub fn total_tile_count(&self) -> u64 {
        *self.level_offsets.last().expect("offsets are never empty")
    }

    /// Encode a tile position into its id.
    ///
    /// `pixel_x`/`pixel_y` are the tile's top-left corner in the level's
    /// pixel space and must be multiples of the tile size (unaligned input
    /// is a caller bug). A position outside the level's grid, or a level
    /// outside the pyramid, yields [`TileId::INVALID`].
    pub fn encode(&self, pixel_x: u64, pixel_y: u64, level: u8) -> TileId {
        debug_assert!(
            pixel_x % u64::from(self.tile_width) == 0
                && pixel_y % u64::from(self.tile_height) == 0,
            "tile position ({pixel_x}, {pixel_y}) is not tile-aligned"
        );

        if level >= self.level_count {
            return TileId::INVALID;
        }

        let col = pixel_x / u64::from(self.tile_width);
        let row = pixel_y / u64::from(self.tile_height);
        if col >= self.tiles_across(level) || row >= self.tiles_down(level) {
            return TileId::INVALID;
        }

        TileId(self.level_offsets[usize::from(level)] + row * self.tiles_across(level) + col)
    }

    /// Resolution level of an id produced by [`encode`](Self::encode) on
    /// this grid.
    pub fn level_of(&self, id: TileId) -> u8 {
        debug_assert!(id.is_valid(), "level_of on the invalid sentinel");
        debug_assert!(id.raw() < self.total_tile_count(), "id from a different grid");

        let mut level = 0u8;
        while id.raw() >= self.level_offsets[usize::from(level) + 1] {
            level += 1;
        }
        level
    }

    /// Top-left pixel position of a tile, in its level's pixel space.
    /// Inverse of [`encode`](Self::encode) for the x/y components.
    pub fn decode(&self, id: TileId) -> (u64, u64) {
        let level = self.level_of(id);
        let index = id.raw() - self.level_offsets[usize::from(level)];
        let across = self.tiles_across(level);
        let col = index % across;
        let row = index / across;
        (col * u64::from(self.tile_width), row * u64::from(self.tile_height))
    }

    /// Pixel rectangle of a tile, in its level's pixel space.
    ///
    /// Always canonical tile size: the last row and column overhang the
    /// page extent, and renderers pad the overhang.
    pub fn tile_rect(&self, id: TileId) -> PixelRect {
        let (x, y) = self.decode(id);
        PixelRect::new(x, y, x + u64::from(self.tile_width), y + u64::from(self.tile_height))
    }

    /// Every tile of `level` whose rectangle overlaps `shape` (with
    /// positive area), in row-major order. Out-of-grid tiles are never
    /// produced; an empty or fully off-page shape yields nothing.
    pub fn tiles_in_shape(&self, shape: &QueryShape, level: u8) -> Vec<TileId> {
        if level >= self.level_count {
            return Vec::new();
        }
        let Some((bx0, by0, bx1, by1)) = shape.bounding_box() else {
            return Vec::new();
        };

        let (level_w, level_h) = self.level_extent(level);
        if bx1 <= 0.0 || by1 <= 0.0 || bx0 >= level_w as f64 || by0 >= level_h as f64 {
            return Vec::new();
        }

        let tw = u64::from(self.tile_width);
        let th = u64::from(self.tile_height);
        let col0 = (bx0.max(0.0) as u64) / tw;
        let row0 = (by0.max(0.0) as u64) / th;
        let col1 = ((bx1.min(level_w as f64) as u64) / tw).min(self.tiles_across(level) - 1);
        let row1 = ((by1.min(level_h as f64) as u64) / th).min(self.tiles_down(level) - 1);

        let mut tiles = Vec::new();
        for row in row0..=row1 {
            for col in col0..=col1 {
                let rect =
                    PixelRect::new(col * tw, row * th, col * tw + tw, row * th + th);
                if shape.overlaps_rect(&rect) {
                    tiles.push(self.encode(col * tw, row * th, level));
                }
            }
        }
        tiles
    }
}
