//! Outline renderer, the default backend
//!
//! Loads a real PDF with `lopdf` for its geometry and renders placeholder
//! content: white fill with a one-pixel light-gray page border. No native
//! library, fully deterministic, works everywhere; the PDFium backend
//! replaces it when real content rasterization is needed.

use std::fs;
use std::path::Path;

use lopdf::Document;
use pdf_raster_core::{scale_extent, PixelRect, RenderContextId, BYTES_PER_PIXEL};

use crate::renderer::{PageRenderer, RenderError, RenderResult};

/// Default point-to-pixel factor (144 dpi over 72 pt/inch).
pub const DEFAULT_RASTER_SCALE: f32 = 2.0;

const BORDER_GRAY: u8 = 220;

/// Geometry-only rendering backend over `lopdf`.
pub struct OutlineRenderer {
    page_extents: Vec<(u64, u64)>,
}

impl OutlineRenderer {
    /// Load a PDF file at the default raster scale.
    pub fn open<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Load PDF data at the default raster scale.
    pub fn from_bytes(bytes: Vec<u8>) -> RenderResult<Self> {
        Self::from_bytes_scaled(bytes, DEFAULT_RASTER_SCALE)
    }

    /// Load PDF data with an explicit point-to-pixel factor.
    pub fn from_bytes_scaled(bytes: Vec<u8>, scale: f32) -> RenderResult<Self> {
        let scale = if scale <= 0.0 { DEFAULT_RASTER_SCALE } else { scale };
        Ok(Self { page_extents: Self::parse_extents(&bytes, scale)? })
    }

    fn parse_extents(bytes: &[u8], scale: f32) -> RenderResult<Vec<(u64, u64)>> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(RenderError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut extents = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let (width_pt, height_pt) = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(((x1 - x0).abs(), (y1 - y0).abs()))
                })
                .unwrap_or((612.0, 792.0));

            extents.push((
                (width_pt * scale).round().max(1.0) as u64,
                (height_pt * scale).round().max(1.0) as u64,
            ));
        }

        if extents.is_empty() {
            return Err(RenderError::Backend("document has no pages".to_owned()));
        }

        Ok(extents)
    }
}

impl PageRenderer for OutlineRenderer {
    fn page_count(&self) -> u32 {
        self.page_extents.len() as u32
    }

    fn page_extent(&self, page: u32) -> RenderResult<(u64, u64)> {
        self.page_extents.get(page as usize).copied().ok_or(RenderError::PageOutOfRange {
            page,
            page_count: self.page_extents.len() as u32,
        })
    }

    fn render_region(
        &self,
        page: u32,
        level: u8,
        region: &PixelRect,
        _context: RenderContextId,
    ) -> RenderResult<Vec<u8>> {
        if region.is_empty() {
            return Err(RenderError::MalformedRegion { region: *region });
        }

        let (page_w, page_h) = self.page_extent(page)?;
        let level_w = scale_extent(page_w, level);
        let level_h = scale_extent(page_h, level);

        let width = region.width() as usize;
        let mut buffer =
            vec![255u8; width * region.height() as usize * BYTES_PER_PIXEL];

        for (row, y) in (region.min_y..region.max_y).enumerate() {
            if y >= level_h {
                break; // overhang stays white
            }
            let row_start = row * width * BYTES_PER_PIXEL;
            for (col, x) in (region.min_x..region.max_x.min(level_w)).enumerate() {
                if y == 0 || y == level_h - 1 || x == 0 || x == level_w - 1 {
                    let offset = row_start + col * BYTES_PER_PIXEL;
                    buffer[offset..offset + BYTES_PER_PIXEL].fill(BORDER_GRAY);
                }
            }
        }

        Ok(buffer)
    }
}
