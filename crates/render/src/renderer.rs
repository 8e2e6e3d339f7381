//! Page renderer capability
//!
//! The rendering backend is a capability chosen at construction time:
//! callers pick a concrete implementation (outline placeholder, PDFium)
//! and the rest of the adapter only sees this trait.

use pdf_raster_core::{PixelRect, RenderContextId, BYTES_PER_PIXEL};

/// Errors surfaced by a rendering backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("level {level} out of range (level_count={level_count})")]
    LevelOutOfRange { level: u8, level_count: u8 },
    #[error("malformed render region {region:?}")]
    MalformedRegion { region: PixelRect },
    #[error("encrypted documents are not supported by this backend")]
    EncryptedUnsupported,
    #[error("renderer backend error: {0}")]
    Backend(String),
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Rasterizes pixel rectangles of a document's pages.
///
/// `render_region` fills an interleaved RGB8 buffer of exactly
/// `width * height * 3` bytes for a rectangle in the pixel space of a
/// resolution level (level 0 is full resolution; each level halves the
/// extent, rounding up). The rectangle may overhang the page's level
/// extent on the bottom/right (the last tile row and column do) and the
/// backend fills the overhang with white.
///
/// Backends fail with `Err`, never panic, across this boundary; internal
/// faults are caught and converted. Each backend manages its own document
/// handle discipline inside the call (acquire on entry, release on every
/// exit path), which is why implementations need not be `Send`: callers
/// on different threads construct their own backend and share only the
/// tile cache.
pub trait PageRenderer {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Full-resolution pixel extent of a page.
    fn page_extent(&self, page: u32) -> RenderResult<(u64, u64)>;

    /// Rasterize one rectangle of a page at a resolution level.
    ///
    /// The rendering context distinguishes independent viewing sessions;
    /// backends that have no per-session settings ignore it.
    fn render_region(
        &self,
        page: u32,
        level: u8,
        region: &PixelRect,
        context: RenderContextId,
    ) -> RenderResult<Vec<u8>>;
}

/// Validate that a backend returned a buffer of the contractual size for
/// `region`. A mismatch is a backend fault, reported as such rather than
/// propagated into slicing arithmetic.
pub(crate) fn check_region_buffer(region: &PixelRect, buffer: &[u8]) -> RenderResult<()> {
    let expected = region.width() as usize * region.height() as usize * BYTES_PER_PIXEL;
    if buffer.len() != expected {
        return Err(RenderError::Backend(format!(
            "backend returned {} bytes for a {}x{} region (expected {expected})",
            buffer.len(),
            region.width(),
            region.height()
        )));
    }
    Ok(())
}
