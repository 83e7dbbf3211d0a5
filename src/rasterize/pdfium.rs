//! pdfium-backed document renderer.
//!
//! pdfium is a shared library loaded at runtime. When it is not installed,
//! [`PdfiumRenderer::bind`] returns `None` and callers fall back to showing
//! the raw PDF.

use super::{DocumentRenderer, PagedDocument, RasterPage};
use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// Renderer backed by a bound pdfium library.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    /// Bind the system pdfium library.
    pub fn bind() -> Option<Self> {
        match Pdfium::bind_to_system_library() {
            Ok(bindings) => {
                info!("✓ pdfium bound from system library");
                Some(PdfiumRenderer {
                    pdfium: Pdfium::new(bindings),
                })
            }
            Err(e) => {
                warn!("pdfium unavailable, invoices will be shown as PDF: {}", e);
                None
            }
        }
    }

    /// Bind pdfium from a directory containing the platform library.
    pub fn bind_at(directory: &str) -> Option<Self> {
        let path = Pdfium::pdfium_platform_library_name_at_path(directory);
        match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(PdfiumRenderer {
                pdfium: Pdfium::new(bindings),
            }),
            Err(e) => {
                warn!("pdfium unavailable at {}: {}", directory, e);
                None
            }
        }
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

fn conversion(context: &str, e: PdfiumError) -> Error {
    Error::ConversionError(format!("{}: {}", context, e))
}

impl PagedDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RasterPage> {
        let page = self
            .document
            .pages()
            .get(index as PdfPageIndex)
            .map_err(|e| conversion("Failed to open page", e))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let image = page
            .render_with_config(&config)
            .map_err(|e| conversion("Failed to render page", e))?
            .as_image()
            .to_rgba8();

        Ok(RasterPage {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        })
    }
}

impl DocumentRenderer for PdfiumRenderer {
    fn load<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PagedDocument + 'a>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| conversion("Failed to load PDF", e))?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}
