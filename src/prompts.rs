//! Extraction prompts.
//!
//! Centralising prompt text here keeps behaviour changes in one place and
//! lets tests inspect prompts without a live endpoint. A submission may
//! override the default via `SubmitRequest::prompt`; this constant is used
//! only when no override is provided.

/// Default prompt sent with every page image when the submission carries
/// no prompt of its own.
pub const DEFAULT_PROMPT: &str = "Extract all text from this image.";

/// Fallback instruction used when a job somehow carries an empty prompt.
/// Vision OCR models treat this as "transcribe everything you see".
pub const FREE_OCR_PROMPT: &str = "Free OCR.";
