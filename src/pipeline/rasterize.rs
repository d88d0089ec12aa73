//! PDF rasterisation: one PDF in, ordered page images out.
//!
//! ## Why a trait?
//!
//! The orchestrator consumes rasterisation as a black box. Hiding pdfium
//! behind [`PageRasterizer`] keeps the job loop testable with a fake that
//! fabricates pages instantly, and leaves room to swap the backend without
//! touching orchestration code.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state; it must not run on the
//! async workers. `tokio::task::spawn_blocking` moves rendering onto the
//! blocking pool so CPU-heavy pages don't stall unrelated jobs.
//!
//! ## Why a scale factor, and why PNG?
//!
//! Pages render at a fixed upscaling factor (2.0× by default) favouring OCR
//! fidelity over file size: small print survives the model's own
//! downsampling. PNG keeps rendered text crisp — JPEG artefacts on glyph
//! edges measurably degrade extraction accuracy.

use crate::error::RunError;
use crate::pipeline::PageImage;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Converts a multi-page document into an ordered sequence of page images.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Rasterise every page of the PDF at `path`, upscaled by `scale`.
    async fn rasterize(&self, path: &Path, scale: f32) -> Result<Vec<PageImage>, RunError>;
}

/// pdfium-backed rasteriser.
#[derive(Debug, Default)]
pub struct PdfiumRasterizer;

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, path: &Path, scale: f32) -> Result<Vec<PageImage>, RunError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || rasterize_blocking(&path, scale))
            .await
            .map_err(|e| RunError::Internal(format!("render task panicked: {e}")))?
    }
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(path: &Path, scale: f32) -> Result<Vec<PageImage>, RunError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| RunError::Rasterization {
            detail: format!("failed to open '{}': {:?}", path.display(), e),
        })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("Rasterising {} pages from {}", total, path.display());

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut images = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RunError::Rasterization {
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        images.push(encode_png(&image).map_err(|e| RunError::Rasterization {
            detail: format!("page {}: PNG encoding failed: {}", idx + 1, e),
        })?);
    }

    Ok(images)
}

/// Encode a rendered page as a base64 PNG [`PageImage`].
pub fn encode_png(img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    Ok(PageImage {
        data: STANDARD.encode(&buf),
        mime_type: "image/png".into(),
    })
}
