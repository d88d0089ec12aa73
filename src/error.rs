//! Error types for the textlift library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrError`] — **Synchronous**: the submission or query itself is
//!   rejected (unknown id, malformed URL, oversized upload). Returned as
//!   `Err(OcrError)` directly to the caller; no job is created.
//!
//! * [`RunError`] — **Asynchronous**: something went wrong inside a job's
//!   background run (download, rasterisation, extraction). Never returned to
//!   the submitting caller — by then they already hold a `pending` job
//!   handle. Instead the run records the error's description into the job
//!   and moves it to the terminal `failed` state.
//!
//! The separation keeps the submission API honest: a `Job` you got back is a
//! real job, and everything that can still go wrong shows up through polling.

use crate::job::{FileId, JobId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced directly to callers of submission and query operations.
#[derive(Debug, Error)]
pub enum OcrError {
    /// No uploaded file is registered under this id.
    #[error("file '{id}' not found")]
    FileNotFound { id: FileId },

    /// No job is registered under this id.
    #[error("job '{id}' not found")]
    JobNotFound { id: JobId },

    /// A by-path submission named a path that does not exist or is not
    /// accessible.
    #[error("no readable file at path '{}'", path.display())]
    PathNotFound { path: PathBuf },

    /// A by-URL submission carried a string that does not parse as an
    /// http/https URL.
    #[error("invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// Upload exceeds the configured size limit.
    #[error("file is {size} bytes, exceeding the {limit} byte upload limit")]
    FileTooLarge { size: u64, limit: u64 },

    /// Upload MIME type is not in the configured allow-list.
    #[error("unsupported media type '{mime}' (allowed: PDF, PNG, JPEG)")]
    UnsupportedMediaType { mime: String },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing uploaded bytes to the upload directory failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Errors occurring inside a job's asynchronous run.
///
/// These are captured by the orchestrator, rendered with `Display`, and
/// stored into the job's `error` field alongside the `failed` status.
#[derive(Debug, Error)]
pub enum RunError {
    /// The source URL could not be fetched (transport error or non-success
    /// status).
    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The source URL fetch exceeded the configured timeout.
    #[error("download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// An inline base64 payload declared as PDF did not decode.
    #[error("invalid base64 payload: {reason}")]
    InvalidPayload { reason: String },

    /// The document could not be rasterised into page images.
    #[error("rasterisation failed: {detail}")]
    Rasterization { detail: String },

    /// The vision endpoint exhausted every retry for a page.
    #[error("text extraction failed after {attempts} attempts: {detail}")]
    Extraction { attempts: u32, detail: String },

    /// Reading the source document from disk failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error (panicked blocking task etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_display_names_attempts() {
        let e = RunError::Extraction {
            attempts: 3,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"), "got: {msg}");
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn file_too_large_display() {
        let e = OcrError::FileTooLarge {
            size: 60_000_000,
            limit: 52_428_800,
        };
        assert!(e.to_string().contains("52428800"));
    }

    #[test]
    fn invalid_url_display() {
        let e = OcrError::InvalidUrl {
            input: "notaurl".into(),
            reason: "relative URL without a base".into(),
        };
        assert!(e.to_string().contains("notaurl"));
    }

    #[test]
    fn download_timeout_display() {
        let e = RunError::DownloadTimeout {
            url: "https://example.com/doc.pdf".into(),
            secs: 120,
        };
        assert!(e.to_string().contains("120s"));
    }
}
