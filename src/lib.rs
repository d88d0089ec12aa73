//! # textlift
//!
//! Extract text from PDFs and images using vision language models, with the
//! messy middle — multi-page documents, per-page retries, progress tracking,
//! partial failures — wrapped into a single trackable asynchronous job.
//!
//! ## Why this crate?
//!
//! Calling a vision OCR endpoint for one image is easy. Turning "here is a
//! 40-page scan" into something a caller can submit, walk away from, and
//! poll is not: pages must be rasterised, each page extracted with its own
//! retry budget, progress made visible mid-run, and any failure folded into
//! one coherent terminal state instead of a half-finished mystery. textlift
//! is that orchestration core.
//!
//! ## Pipeline Overview
//!
//! ```text
//! submission (file id / URL / base64 payload / path)
//!  │
//!  ├─ 1. Validate  synchronous checks; caller gets a pending Job at once
//!  ├─ 2. Resolve   source → ordered page images (pdfium for PDFs, 2.0×)
//!  ├─ 3. Extract   per page, in order, via the vision endpoint (retries)
//!  ├─ 4. Progress  persisted after every page; observable while running
//!  └─ 5. Publish   aggregate result or failure → terminal job state
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use textlift::{JobStatus, OcrConfig, OcrEngine, SubmitRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Defaults target an Ollama endpoint at http://localhost:11434.
//!     let engine = OcrEngine::with_defaults(OcrConfig::from_env());
//!
//!     let job = engine.submit_path("scan.pdf", SubmitRequest::default()).await?;
//!     println!("submitted job {}", job.id);
//!
//!     loop {
//!         let view = engine.get_status(job.id)?;
//!         if view.status.is_terminal() {
//!             break;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!     }
//!
//!     let job = engine.get_result(job.id)?;
//!     match job.status {
//!         JobStatus::Completed => println!("{}", job.result.unwrap().text),
//!         _ => eprintln!("failed: {}", job.error.unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `textlift` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! textlift = { version = "0.1", default-features = false }
//! ```
//!
//! ## Guarantees
//!
//! * A job returned by a submission operation is `pending` and already
//!   registered; everything that can still go wrong surfaces through
//!   polling, never as a crash.
//! * Pages are extracted strictly in document order; progress is
//!   monotonically non-decreasing across reads.
//! * Terminal jobs are immutable: repeated reads return identical data.
//! * A failed job keeps no partial output — resubmit to retry.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod prompts;
pub mod storage;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrConfig, OcrConfigBuilder};
pub use engine::{JobStatusView, OcrEngine, SubmitRequest};
pub use error::{OcrError, RunError};
pub use job::{
    ExtractionResult, FileId, FileRecord, Job, JobId, JobOptions, JobProgress, JobStatus,
    OutputFormat, PageText, Provenance, ResultMetadata, PAGE_BREAK,
};
pub use pipeline::extract::{Extraction, OllamaExtractor, TextExtractor};
pub use pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
pub use pipeline::source::{is_url, DocumentSource, ResolvedPages};
pub use pipeline::PageImage;
pub use storage::FileStorage;
pub use store::JobStore;
