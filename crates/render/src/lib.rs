//! PDF Raster Render Library
//!
//! The raster adapter's rendering layer: the page-renderer capability
//! trait with its concrete backends, the look-ahead prefetch planner, and
//! the per-resolution read path over the shared tile cache.

pub mod editor;
pub mod file;
mod lookahead;
pub mod outline;
#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod renderer;
#[cfg(test)]
pub(crate) mod testing;

pub use editor::ResolutionEditor;
pub use file::RasterFile;
pub use outline::{OutlineRenderer, DEFAULT_RASTER_SCALE};
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;
pub use renderer::{PageRenderer, RenderError, RenderResult};
