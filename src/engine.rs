//! The job orchestration core.
//!
//! [`OcrEngine`] owns the full lifecycle of an extraction job:
//!
//! 1. **Submission** — validate the input synchronously, register a
//!    `pending` job, spawn a detached task, and hand the job back
//!    immediately. The caller never blocks on completion.
//! 2. **Run** — the spawned task drives `pending → processing →
//!    {completed | failed}`: resolve the source into page images, extract
//!    each page **sequentially in document order** (bounding load on the
//!    inference endpoint and keeping progress monotonic), persist progress
//!    after every page, then aggregate and publish the terminal state.
//! 3. **Query** — read-only polling surface: status with progress, the full
//!    job record, and file deletion.
//!
//! Failure containment: everything that goes wrong inside a run is captured
//! by the task, rendered into the job's `error` field with `failed` status,
//! and never escapes to crash other jobs. Only submission-time validation
//! returns errors to the caller.
//!
//! Concurrency: one task per job; jobs interleave freely. The only shared
//! mutable state is the injected [`JobStore`], and each job's record is
//! written exclusively by the task that owns it.

use crate::config::OcrConfig;
use crate::error::{OcrError, RunError};
use crate::job::{
    ExtractionResult, FileId, FileRecord, Job, JobId, JobOptions, JobProgress, JobStatus,
};
use crate::pipeline::extract::{OllamaExtractor, TextExtractor};
use crate::pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
use crate::pipeline::source::DocumentSource;
use crate::storage::FileStorage;
use crate::store::JobStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Caller-supplied parameters of a submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    /// Extraction prompt; the configured default is used when absent.
    pub prompt: Option<String>,
    /// Pass-through options recorded on the job.
    pub options: Option<JobOptions>,
}

/// Snapshot returned by [`OcrEngine::get_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
}

/// Drives extraction jobs from submission to terminal state.
///
/// Cheap to clone: all collaborators sit behind `Arc`s. Collaborators are
/// injected at construction so tests can substitute fakes for the
/// rasteriser and the vision endpoint.
#[derive(Clone)]
pub struct OcrEngine {
    config: Arc<OcrConfig>,
    store: Arc<JobStore>,
    storage: Arc<FileStorage>,
    rasterizer: Arc<dyn PageRasterizer>,
    extractor: Arc<dyn TextExtractor>,
}

impl OcrEngine {
    /// Build an engine with explicit collaborators.
    pub fn new(
        config: OcrConfig,
        store: Arc<JobStore>,
        storage: Arc<FileStorage>,
        rasterizer: Arc<dyn PageRasterizer>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            storage,
            rasterizer,
            extractor,
        }
    }

    /// Build an engine with the production collaborators: pdfium
    /// rasterisation and an Ollama-style vision endpoint.
    pub fn with_defaults(config: OcrConfig) -> Self {
        let storage = Arc::new(FileStorage::new(&config.upload_dir));
        let extractor = Arc::new(OllamaExtractor::new(&config));
        Self::new(
            config,
            Arc::new(JobStore::new()),
            storage,
            Arc::new(PdfiumRasterizer),
            extractor,
        )
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    // ── Upload boundary ──────────────────────────────────────────────────

    /// Accept an uploaded file, enforcing the size limit and MIME
    /// allow-list, and register its record.
    pub async fn upload_file(
        &self,
        original_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<FileRecord, OcrError> {
        let size = bytes.len() as u64;
        if size > self.config.max_file_size {
            return Err(OcrError::FileTooLarge {
                size,
                limit: self.config.max_file_size,
            });
        }
        if !self
            .config
            .allowed_mime_types
            .iter()
            .any(|m| m == mime_type)
        {
            return Err(OcrError::UnsupportedMediaType {
                mime: mime_type.to_string(),
            });
        }

        let id = FileId::new();
        let path = self.storage.save(&id.to_string(), original_name, bytes).await?;

        let record = FileRecord {
            id,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            size,
            path,
            uploaded_at: Utc::now(),
        };
        self.store.put_file(record.clone());
        info!("Uploaded '{}' as file {}", original_name, id);
        Ok(record)
    }

    // ── Submission operations ────────────────────────────────────────────

    /// Submit an extraction job against a previously uploaded file.
    pub async fn submit_file(
        &self,
        file_id: FileId,
        req: SubmitRequest,
    ) -> Result<Job, OcrError> {
        let record = self
            .store
            .get_file(file_id)
            .ok_or(OcrError::FileNotFound { id: file_id })?;

        let mut job = self.create_job(req);
        job.file_id = Some(file_id);
        self.store.put_job(job.clone());
        self.spawn_run(job.id, DocumentSource::File(record));
        Ok(job)
    }

    /// Submit an extraction job against a document URL.
    ///
    /// Only the URL's syntax is validated here; fetch and content-type
    /// problems surface later as job failure.
    pub async fn submit_url(&self, url: &str, req: SubmitRequest) -> Result<Job, OcrError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| OcrError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(OcrError::InvalidUrl {
                input: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let job = self.create_job(req);
        self.store.put_job(job.clone());
        self.spawn_run(job.id, DocumentSource::Url(url.to_string()));
        Ok(job)
    }

    /// Submit an extraction job for an inline base64 payload.
    ///
    /// The payload is accepted as-is; decoding errors surface as job
    /// failure.
    pub async fn submit_inline(
        &self,
        data: String,
        filename: String,
        mime_type: String,
        req: SubmitRequest,
    ) -> Result<Job, OcrError> {
        let job = self.create_job(req);
        self.store.put_job(job.clone());
        self.spawn_run(
            job.id,
            DocumentSource::Inline {
                data,
                filename,
                mime_type,
            },
        );
        Ok(job)
    }

    /// Submit an extraction job for a file already on this machine.
    pub async fn submit_path(
        &self,
        path: impl AsRef<Path>,
        req: SubmitRequest,
    ) -> Result<Job, OcrError> {
        let path = path.as_ref();
        tokio::fs::metadata(path)
            .await
            .map_err(|_| OcrError::PathNotFound {
                path: path.to_path_buf(),
            })?;

        let job = self.create_job(req);
        self.store.put_job(job.clone());
        self.spawn_run(job.id, DocumentSource::Path(PathBuf::from(path)));
        Ok(job)
    }

    // ── Query façade ─────────────────────────────────────────────────────

    /// Current status and progress of a job.
    pub fn get_status(&self, job_id: JobId) -> Result<JobStatusView, OcrError> {
        let job = self
            .store
            .get_job(job_id)
            .ok_or(OcrError::JobNotFound { id: job_id })?;
        Ok(JobStatusView {
            status: job.status,
            progress: job.progress,
        })
    }

    /// The full job record, regardless of state. Callers distinguish
    /// in-flight from terminal jobs by `status`.
    pub fn get_result(&self, job_id: JobId) -> Result<Job, OcrError> {
        self.store
            .get_job(job_id)
            .ok_or(OcrError::JobNotFound { id: job_id })
    }

    /// Delete an uploaded file record and, best-effort, its stored bytes.
    pub async fn delete_file(&self, file_id: FileId) -> Result<(), OcrError> {
        let record = self
            .store
            .delete_file(file_id)
            .ok_or(OcrError::FileNotFound { id: file_id })?;
        self.storage.delete(&record.path).await;
        info!("Deleted file {}", file_id);
        Ok(())
    }

    /// All registered file records.
    pub fn list_files(&self) -> Vec<FileRecord> {
        self.store.list_files()
    }

    /// Probe the vision endpoint without throwing.
    pub async fn check_extractor_health(&self) -> bool {
        self.extractor.check_health().await
    }

    // ── Orchestration run ────────────────────────────────────────────────

    fn create_job(&self, req: SubmitRequest) -> Job {
        let prompt = req
            .prompt
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.default_prompt.clone());
        let mut options = req.options;
        if let Some(opts) = options.as_mut() {
            if opts.language.is_none() {
                opts.language = Some(self.config.default_language.clone());
            }
        }
        Job::new(Some(prompt), options)
    }

    /// Detach the run from the submitting caller. The task owns the job id
    /// exclusively from here on.
    fn spawn_run(&self, job_id: JobId, source: DocumentSource) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(err) = engine.run(job_id, source).await {
                error!("Job {} failed: {}", job_id, err);
                if let Some(mut job) = engine.store.get_job(job_id) {
                    job.fail(err.to_string());
                    engine.store.update_job(job);
                }
            }
        });
    }

    async fn run(&self, job_id: JobId, source: DocumentSource) -> Result<(), RunError> {
        let mut job = self
            .store
            .get_job(job_id)
            .ok_or_else(|| RunError::Internal(format!("job {job_id} vanished from the store")))?;

        job.start();
        self.store.update_job(job.clone());
        info!("Job {} started", job_id);

        // Resolve the source into page images; one code path from here on.
        let resolved = source.resolve(self.rasterizer.as_ref(), &self.config).await?;
        let total_pages = resolved.pages.len();
        if total_pages > self.config.max_pages {
            warn!(
                "Job {}: document has {} pages, above the documented limit of {}",
                job_id, total_pages, self.config.max_pages
            );
        }
        debug!("Job {}: {} pages to extract", job_id, total_pages);

        let prompt = job
            .prompt
            .clone()
            .unwrap_or_else(|| self.config.default_prompt.clone());

        // Pages run strictly in document order. Progress is persisted after
        // every page so polling readers observe it mid-run.
        let mut texts: Vec<String> = Vec::with_capacity(total_pages);
        let mut model = self.config.model.clone();

        for (i, page) in resolved.pages.iter().enumerate() {
            let extraction = self.extractor.extract(page, &prompt).await?;
            texts.push(extraction.text);
            if !extraction.model.is_empty() {
                model = extraction.model;
            }

            job.progress = Some(JobProgress::at(i + 1, total_pages));
            self.store.update_job(job.clone());
            debug!("Job {}: page {}/{} done", job_id, i + 1, total_pages);
        }

        let result = ExtractionResult::assemble(texts, model, resolved.provenance);
        job.complete(result);
        self.store.update_job(job);
        info!("Job {} completed: {} pages", job_id, total_pages);
        Ok(())
    }
}
