//! Test support: a deterministic scripted renderer.

use std::cell::Cell;

use pdf_raster_core::{PixelRect, RenderContextId, BYTES_PER_PIXEL};

use crate::renderer::{PageRenderer, RenderError, RenderResult};

/// In-memory renderer whose output encodes the level-space position of
/// every sample, with a call counter and scriptable failure modes.
pub(crate) struct ScriptedRenderer {
    extents: Vec<(u64, u64)>,
    calls: Cell<usize>,
    fail: Cell<bool>,
    short_buffer: Cell<bool>,
}

impl ScriptedRenderer {
    pub fn single_page(width: u64, height: u64) -> Self {
        Self {
            extents: vec![(width, height)],
            calls: Cell::new(0),
            fail: Cell::new(false),
            short_buffer: Cell::new(false),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.get()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn set_short_buffer(&self, short: bool) {
        self.short_buffer.set(short);
    }

    /// The RGB sample rendered at a level-space position.
    pub fn sample(x: u64, y: u64, level: u8) -> [u8; 3] {
        [(x % 251) as u8, (y % 251) as u8, level]
    }
}

impl PageRenderer for ScriptedRenderer {
    fn page_count(&self) -> u32 {
        self.extents.len() as u32
    }

    fn page_extent(&self, page: u32) -> RenderResult<(u64, u64)> {
        self.extents.get(page as usize).copied().ok_or(RenderError::PageOutOfRange {
            page,
            page_count: self.extents.len() as u32,
        })
    }

    fn render_region(
        &self,
        _page: u32,
        level: u8,
        region: &PixelRect,
        _context: RenderContextId,
    ) -> RenderResult<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);

        if self.fail.get() {
            return Err(RenderError::Backend("scripted failure".to_owned()));
        }
        if self.short_buffer.get() {
            return Ok(vec![0u8; 1]);
        }
        if region.is_empty() {
            return Err(RenderError::MalformedRegion { region: *region });
        }

        let mut buffer =
            Vec::with_capacity(region.width() as usize * region.height() as usize * BYTES_PER_PIXEL);
        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                buffer.extend_from_slice(&Self::sample(x, y, level));
            }
        }
        Ok(buffer)
    }
}
