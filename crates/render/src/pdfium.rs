//! PDFium renderer
//!
//! Real content rasterization through `pdfium-render`. The page is
//! rendered whole at the level's target extent, then the requested
//! sub-rectangle is copied out row by row (RGBA to RGB), padding any
//! overhang with white.
//!
//! The PDFium library binding is shared per thread through a
//! reference-counted handle: the first renderer constructed on a thread
//! binds the library, the last one dropped releases it. Document and page
//! objects are acquired inside each call and released on every exit path.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::{Rc, Weak};

use pdfium_render::prelude::*;

use pdf_raster_core::{scale_extent, PixelRect, RenderContextId, BYTES_PER_PIXEL};

use crate::renderer::{PageRenderer, RenderError, RenderResult};

thread_local! {
    static LIBRARY: RefCell<Weak<Pdfium>> = RefCell::new(Weak::new());
}

/// Acquire this thread's shared PDFium binding, binding the library if no
/// handle is currently alive on the thread.
///
/// Search order follows the usual packaging layout: the executable's
/// directory, the working directory, then the system library path.
fn acquire_library() -> RenderResult<Rc<Pdfium>> {
    LIBRARY.with(|slot| {
        if let Some(library) = slot.borrow().upgrade() {
            return Ok(library);
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

        let bindings = exe_dir
            .as_deref()
            .map(|dir| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)))
            .unwrap_or_else(|| Pdfium::bind_to_system_library())
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|error| RenderError::Backend(error.to_string()))?;

        let library = Rc::new(Pdfium::new(bindings));
        *slot.borrow_mut() = Rc::downgrade(&library);
        Ok(library)
    })
}

/// Content-rasterizing backend over PDFium.
pub struct PdfiumRenderer {
    library: Rc<Pdfium>,
    bytes: Vec<u8>,
    page_extents: Vec<(u64, u64)>,
}

impl PdfiumRenderer {
    /// Load a PDF file at the default raster scale.
    pub fn open<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Load PDF data at the default raster scale.
    pub fn from_bytes(bytes: Vec<u8>) -> RenderResult<Self> {
        Self::from_bytes_scaled(bytes, crate::outline::DEFAULT_RASTER_SCALE)
    }

    /// Load PDF data with an explicit point-to-pixel factor.
    pub fn from_bytes_scaled(bytes: Vec<u8>, scale: f32) -> RenderResult<Self> {
        let scale = if scale <= 0.0 { crate::outline::DEFAULT_RASTER_SCALE } else { scale };
        let library = acquire_library()?;

        let page_extents = {
            let document = library
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|error| RenderError::Backend(error.to_string()))?;
            document
                .pages()
                .iter()
                .map(|page| {
                    (
                        (page.width().value * scale).round().max(1.0) as u64,
                        (page.height().value * scale).round().max(1.0) as u64,
                    )
                })
                .collect::<Vec<_>>()
        };

        if page_extents.is_empty() {
            return Err(RenderError::Backend("document has no pages".to_owned()));
        }

        Ok(Self { library, bytes, page_extents })
    }
}

impl PageRenderer for PdfiumRenderer {
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

        let target_w = i32::try_from(level_w)
            .map_err(|_| RenderError::Backend(format!("level extent {level_w} overflows")))?;
        let target_h = i32::try_from(level_h)
            .map_err(|_| RenderError::Backend(format!("level extent {level_h} overflows")))?;

        // Scoped document/page acquisition: both release on every exit
        // path, including errors.
        let document = self
            .library
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|error| RenderError::Backend(error.to_string()))?;
        let pdf_page = document
            .pages()
            .get(page as u16)
            .map_err(|_| RenderError::PageOutOfRange { page, page_count: self.page_count() })?;

        let config =
            PdfRenderConfig::new().set_target_width(target_w).set_target_height(target_h);
        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|error| RenderError::Backend(error.to_string()))?;
        let rgba = bitmap.as_rgba_bytes();

        let width = region.width() as usize;
        let mut buffer =
            vec![255u8; width * region.height() as usize * BYTES_PER_PIXEL];

        let render_w = level_w as usize;
        for (row, y) in (region.min_y..region.max_y).enumerate() {
            if y >= level_h {
                break; // overhang stays white
            }
            let row_start = row * width * BYTES_PER_PIXEL;
            for (col, x) in (region.min_x..region.max_x.min(level_w)).enumerate() {
                let src = (y as usize * render_w + x as usize) * 4;
                let dst = row_start + col * BYTES_PER_PIXEL;
                buffer[dst..dst + BYTES_PER_PIXEL].copy_from_slice(&rgba[src..src + 3]);
            }
        }

        Ok(buffer)
    }
}
