//! Job and file record data model.
//!
//! A [`Job`] is one tracked unit of document-to-text extraction work. It is
//! created in `pending` by a submission operation, mutated only by the
//! orchestrator task driving it, and becomes immutable once it reaches a
//! terminal state (`completed` or `failed`).
//!
//! All types serialise with camelCase field names and omit absent optionals,
//! matching the polling API consumed by callers. Terminal jobs therefore
//! serialise byte-identically on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Separator inserted between page texts in the aggregated document text.
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

/// Unique job identifier. Distinct namespace from [`FileId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An ingested source document registered with the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
}

/// Lifecycle state of a [`Job`].
///
/// `Pending` and `Processing` are transient; `Completed` and `Failed` are
/// terminal and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-page progress of an in-flight job.
///
/// Written by the orchestrator after each page completes, so successive
/// reads observe monotonically non-decreasing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub current_page: usize,
    pub total_pages: usize,
    pub percentage: u8,
}

impl JobProgress {
    /// Progress after `current_page` of `total_pages` pages have completed.
    pub fn at(current_page: usize, total_pages: usize) -> Self {
        let percentage = if total_pages == 0 {
            100
        } else {
            ((current_page as f64 / total_pages as f64) * 100.0).round() as u8
        };
        Self {
            current_page,
            total_pages,
            percentage,
        }
    }
}

/// Requested output format, forwarded untouched into the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

/// Caller-supplied extraction options.
///
/// Pass-through configuration: the orchestrator stores these on the job but
/// computes neither page-range filtering nor confidence scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_confidence: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
}

/// Extracted text of a single page. Page numbers are 1-indexed and appear in
/// document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
}

/// Where the job's input came from. Exactly one tag is recorded per result.
///
/// Serialises flattened into [`ResultMetadata`], so the JSON carries exactly
/// one of `sourceUrl`, `sourcePath`, or `filename`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    SourceUrl(String),
    SourcePath(String),
    Filename(String),
}

/// Metadata attached to a completed extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub total_pages: usize,
    pub processed_at: DateTime<Utc>,
    pub model: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// Aggregate result of a completed job. Owned exclusively by its job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// All page texts joined with [`PAGE_BREAK`].
    pub text: String,
    pub pages: Vec<PageText>,
    pub metadata: ResultMetadata,
}

impl ExtractionResult {
    /// Assemble the document-level result from per-page texts in page order.
    pub fn assemble(texts: Vec<String>, model: String, provenance: Provenance) -> Self {
        let total_pages = texts.len();
        let pages = texts
            .iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page_number: i + 1,
                text: text.clone(),
            })
            .collect();
        Self {
            text: texts.join(PAGE_BREAK),
            pages,
            metadata: ResultMetadata {
                total_pages,
                processed_at: Utc::now(),
                model,
                provenance,
            },
        }
    }
}

/// One tracked unit of extraction work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    /// Set only for jobs submitted against an uploaded file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    /// The extraction prompt, resolved at submission time (caller-supplied
    /// or the configured default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<JobOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new job in `pending` state.
    pub fn new(prompt: Option<String>, options: Option<JobOptions>) -> Self {
        Self {
            id: JobId::new(),
            file_id: None,
            status: JobStatus::Pending,
            progress: None,
            prompt,
            options,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition `pending → processing`, stamping `started_at`.
    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Transition into terminal `completed` with the assembled result.
    pub fn complete(&mut self, result: ExtractionResult) {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Transition into terminal `failed`. Any result accumulated so far is
    /// discarded — a failed job carries an error and nothing else.
    pub fn fail(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.result = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
