//! PDF-to-image conversion for invoice documents.
//!
//! The server may send the fiscal invoice as a raw PDF instead of an image.
//! [`Rasterizer`] turns the first page into a PNG through an injected
//! [`DocumentRenderer`]. Hosts without a renderer still get something to
//! show: the raw PDF is passed through as [`ReceiptImage::Document`].
//!
//! # Data Flow
//!
//! ```text
//! base64 ──▶ decode ──▶ load ──▶ render page 1 ──▶ PNG ──▶ data URL
//!                      (renderer)   (scale 2.0×)
//! ```
//!
//! Rendering is CPU-bound and runs on tokio's blocking pool.

use crate::config::DEFAULT_RENDER_SCALE;
use crate::error::{Error, Result};
use crate::model::{ImageBytes, ReceiptImage};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageOutputFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

#[cfg(feature = "pdfium")]
pub mod pdfium;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;

/// An RGBA8 raster of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A loaded, paged document.
pub trait PagedDocument {
    fn page_count(&self) -> usize;

    /// Render one page, upscaled by `scale`.
    ///
    /// # Errors
    /// Returns `Error::ConversionError` if the page cannot be rendered.
    fn render_page(&self, index: usize, scale: f32) -> Result<RasterPage>;
}

/// Capability to open PDF bytes as a paged document.
pub trait DocumentRenderer: Send + Sync {
    /// # Errors
    /// Returns `Error::ConversionError` if the bytes are not a readable document.
    fn load<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PagedDocument + 'a>>;
}

/// Converts base64 PDFs to PNG images of their first page.
#[derive(Clone)]
pub struct Rasterizer {
    renderer: Option<Arc<dyn DocumentRenderer>>,
    scale: f32,
}

impl Rasterizer {
    pub fn new(renderer: Arc<dyn DocumentRenderer>) -> Self {
        Rasterizer {
            renderer: Some(renderer),
            scale: DEFAULT_RENDER_SCALE,
        }
    }

    /// A rasterizer for hosts with no rendering capability.
    pub fn unavailable() -> Self {
        Rasterizer {
            renderer: None,
            scale: DEFAULT_RENDER_SCALE,
        }
    }

    /// Use the system pdfium library when it can be bound, fall back to
    /// pass-through otherwise.
    #[cfg(feature = "pdfium")]
    pub fn from_system() -> Self {
        match PdfiumRenderer::bind() {
            Some(renderer) => Rasterizer::new(Arc::new(renderer)),
            None => Rasterizer::unavailable(),
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn is_available(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Convert a base64 PDF to an image of its first page.
    ///
    /// Without a renderer the PDF is returned untouched as
    /// [`ReceiptImage::Document`].
    ///
    /// # Errors
    /// Returns `Error::ConversionError` for malformed base64, an unreadable
    /// document, a document without pages or a PNG encoding failure.
    pub async fn rasterize(&self, pdf_base64: &str) -> Result<ReceiptImage> {
        let Some(renderer) = self.renderer.clone() else {
            info!("No document renderer available, passing PDF through");
            return Ok(ReceiptImage::Document(pdf_base64.to_string()));
        };

        let payload = pdf_base64.to_string();
        let scale = self.scale;
        let png = tokio::task::spawn_blocking(move || {
            render_first_page(renderer.as_ref(), &payload, scale)
        })
        .await??;

        debug!("✓ Rasterized invoice PDF to {} bytes of PNG", png.len());
        Ok(ReceiptImage::Image(ImageBytes::from_png(&png)))
    }
}

/// Decode, load and render page one to PNG bytes. Blocking.
///
/// # Errors
/// Returns `Error::ConversionError` on any failure along the way.
pub fn render_first_page(
    renderer: &dyn DocumentRenderer,
    pdf_base64: &str,
    scale: f32,
) -> Result<Vec<u8>> {
    let bytes = STANDARD.decode(ImageBytes::new(pdf_base64.trim()).payload())?;
    let document = renderer.load(&bytes)?;

    if document.page_count() == 0 {
        return Err(Error::ConversionError(
            "PDF document has no pages".to_string(),
        ));
    }

    let page = document.render_page(0, scale)?;
    encode_png(page)
}

/// Encode an RGBA raster as PNG.
///
/// # Errors
/// Returns `Error::ConversionError` if the buffer does not match the
/// dimensions or encoding fails.
pub fn encode_png(page: RasterPage) -> Result<Vec<u8>> {
    let (width, height) = (page.width, page.height);
    let buffer = RgbaImage::from_raw(width, height, page.rgba).ok_or_else(|| {
        Error::ConversionError(format!(
            "Raster buffer does not match {}x{} RGBA",
            width, height
        ))
    })?;

    let mut png = Cursor::new(Vec::new());
    buffer.write_to(&mut png, ImageOutputFormat::Png)?;
    Ok(png.into_inner())
}
