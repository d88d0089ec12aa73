//! Pipeline stages between a submission and its extracted text.
//!
//! Each submodule implements exactly one transformation step, kept separate
//! so every stage is independently testable and swappable behind its trait.
//!
//! ## Data Flow
//!
//! ```text
//! source ────▶ rasterize ────▶ extract
//! (id/URL/     (pdfium, 2.0×   (vision endpoint,
//!  payload/     upscale, PNG    retry + timeout)
//!  path)        + base64)
//! ```
//!
//! 1. [`source`]    — resolve the submission's tagged input variant into an
//!    ordered sequence of page images, so the orchestrator's per-page loop
//!    has exactly one code path regardless of origin
//! 2. [`rasterize`] — turn a PDF into per-page images; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`extract`]   — drive the vision endpoint call for one page with
//!    retry/backoff; the only stage with network I/O during the loop

pub mod extract;
pub mod rasterize;
pub mod source;

use serde::{Deserialize, Serialize};

/// One page of a resolved document, ready to be sent to the vision endpoint.
///
/// `data` is the base64-encoded image body; non-PDF inputs pass through
/// exactly as submitted, rasterised PDF pages are lossless PNG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub data: String,
    pub mime_type: String,
}
