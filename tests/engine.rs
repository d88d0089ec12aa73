//! Integration tests for the job orchestration core.
//!
//! Fake collaborators are injected through the `PageRasterizer` and
//! `TextExtractor` trait seams, so these tests exercise the real engine,
//! store, and source-resolution code without pdfium or a live inference
//! endpoint. The fakes fabricate page images named `page-N` and extract
//! them into `text of page-N`, which makes aggregation and ordering easy
//! to assert.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use textlift::{
    Extraction, FileId, FileStorage, Job, JobId, JobStatus, JobStore, OcrConfig, OcrEngine,
    OcrError, PageImage, PageRasterizer, Provenance, RunError, SubmitRequest, TextExtractor,
    PAGE_BREAK,
};

// ── Fake collaborators ───────────────────────────────────────────────────

/// Fabricates `pages` synthetic page images for any PDF it is handed.
struct FakeRasterizer {
    pages: usize,
}

#[async_trait]
impl PageRasterizer for FakeRasterizer {
    async fn rasterize(&self, _path: &Path, _scale: f32) -> Result<Vec<PageImage>, RunError> {
        Ok((1..=self.pages)
            .map(|i| PageImage {
                data: format!("page-{i}"),
                mime_type: "image/png".into(),
            })
            .collect())
    }
}

/// Always fails, as a rasteriser would on a corrupt document.
struct BrokenRasterizer;

#[async_trait]
impl PageRasterizer for BrokenRasterizer {
    async fn rasterize(&self, path: &Path, _scale: f32) -> Result<Vec<PageImage>, RunError> {
        Err(RunError::Rasterization {
            detail: format!("failed to open '{}': corrupt trailer", path.display()),
        })
    }
}

/// Scripted extractor: succeeds with `text of <data>` unless the page's
/// data is listed in `fail_pages`, in which case it reports an exhausted
/// retry budget the way the real client would.
struct FakeExtractor {
    fail_pages: HashSet<String>,
    delay: Duration,
}

impl FakeExtractor {
    fn ok() -> Self {
        Self {
            fail_pages: HashSet::new(),
            delay: Duration::ZERO,
        }
    }

    fn failing_on(page: &str) -> Self {
        Self {
            fail_pages: HashSet::from([page.to_string()]),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, page: &PageImage, _prompt: &str) -> Result<Extraction, RunError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_pages.contains(&page.data) {
            return Err(RunError::Extraction {
                attempts: 3,
                detail: format!("endpoint refused {}", page.data),
            });
        }
        Ok(Extraction {
            text: format!("text of {}", page.data),
            model: "fake-model".into(),
        })
    }

    async fn check_health(&self) -> bool {
        true
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    engine: OcrEngine,
    store: Arc<JobStore>,
    dir: tempfile::TempDir,
}

fn harness(rasterizer: impl PageRasterizer + 'static, extractor: impl TextExtractor + 'static) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let upload_dir = dir.path().join("uploads");
    let config = OcrConfig::builder()
        .upload_dir(&upload_dir)
        .max_file_size(1024 * 1024)
        .build()
        .expect("valid config");
    let store = Arc::new(JobStore::new());
    let engine = OcrEngine::new(
        config,
        Arc::clone(&store),
        Arc::new(FileStorage::new(upload_dir)),
        Arc::new(rasterizer),
        Arc::new(extractor),
    );
    Harness { engine, store, dir }
}

/// Write a placeholder document under the harness temp dir and return its path.
fn seed_file(h: &Harness, name: &str) -> PathBuf {
    let path = h.dir.path().join(name);
    std::fs::write(&path, b"placeholder bytes").expect("seed file");
    path
}

async fn wait_terminal(engine: &OcrEngine, id: JobId) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = engine.get_result(id).expect("job must exist");
        if job.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not reach a terminal state in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Scenario A: 1-page image by file id ──────────────────────────────────

#[tokio::test]
async fn single_page_image_by_file_id_completes() {
    let h = harness(FakeRasterizer { pages: 0 }, FakeExtractor::ok());

    let record = h
        .engine
        .upload_file("scan.png", "image/png", b"not really a png")
        .await
        .expect("upload should succeed");

    let job = h
        .engine
        .submit_file(record.id, SubmitRequest::default())
        .await
        .expect("submission should succeed");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.file_id, Some(record.id));

    let done = wait_terminal(&h.engine, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error.is_none());

    let result = done.result.expect("completed job carries a result");
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.text, result.pages[0].text);
    assert_eq!(result.metadata.total_pages, 1);
    assert_eq!(result.metadata.model, "fake-model");
    assert_eq!(
        result.metadata.provenance,
        Provenance::Filename("scan.png".into())
    );

    let progress = done.progress.expect("progress recorded");
    assert_eq!(progress.current_page, 1);
    assert_eq!(progress.total_pages, 1);
    assert_eq!(progress.percentage, 100);

    // Timestamps are monotonically non-decreasing.
    assert!(done.started_at.unwrap() >= done.created_at);
    assert!(done.completed_at.unwrap() >= done.started_at.unwrap());
}

// ── Scenario B: 3-page PDF by path ───────────────────────────────────────

#[tokio::test]
async fn multi_page_pdf_by_path_aggregates_in_order() {
    let h = harness(FakeRasterizer { pages: 3 }, FakeExtractor::ok());
    let pdf = seed_file(&h, "doc.pdf");

    let job = h
        .engine
        .submit_path(&pdf, SubmitRequest::default())
        .await
        .expect("submission should succeed");

    let done = wait_terminal(&h.engine, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);

    let result = done.result.expect("result present");
    assert_eq!(result.metadata.total_pages, 3);
    assert_eq!(result.pages.len(), 3);
    for (i, page) in result.pages.iter().enumerate() {
        assert_eq!(page.page_number, i + 1);
        assert_eq!(page.text, format!("text of page-{}", i + 1));
    }
    assert_eq!(
        result.text,
        format!(
            "text of page-1{PAGE_BREAK}text of page-2{PAGE_BREAK}text of page-3"
        )
    );
    assert_eq!(
        result.metadata.provenance,
        Provenance::SourcePath(pdf.display().to_string())
    );

    let progress = done.progress.unwrap();
    assert_eq!(progress.current_page, progress.total_pages);
    assert_eq!(progress.total_pages, 3);
}

// ── Scenario C: unknown file id ──────────────────────────────────────────

#[tokio::test]
async fn unknown_file_id_fails_submission_without_creating_a_job() {
    let h = harness(FakeRasterizer { pages: 1 }, FakeExtractor::ok());

    let err = h
        .engine
        .submit_file(FileId::new(), SubmitRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::FileNotFound { .. }), "got: {err}");
    assert!(h.store.list_jobs().is_empty(), "no job must be created");
}

// ── Scenario D: mid-document extraction failure ──────────────────────────

#[tokio::test]
async fn page_failure_fails_job_and_discards_prior_pages() {
    let h = harness(FakeRasterizer { pages: 3 }, FakeExtractor::failing_on("page-2"));
    let pdf = seed_file(&h, "doc.pdf");

    let job = h
        .engine
        .submit_path(&pdf, SubmitRequest::default())
        .await
        .unwrap();

    let done = wait_terminal(&h.engine, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.result.is_none(), "no partial result may survive");

    let error = done.error.expect("failed job carries an error");
    assert!(error.contains("endpoint refused page-2"), "got: {error}");
    assert!(error.contains("3 attempts"), "got: {error}");
    assert!(done.completed_at.is_some());

    // Page 1 had completed before the failure; its progress write remains
    // observable but its text is gone.
    let progress = done.progress.expect("page 1 progress was persisted");
    assert_eq!(progress.current_page, 1);
    assert_eq!(progress.total_pages, 3);
}

// ── Scenario E: deleting files ───────────────────────────────────────────

#[tokio::test]
async fn delete_file_removes_record_and_bytes() {
    let h = harness(FakeRasterizer { pages: 1 }, FakeExtractor::ok());

    let err = h.engine.delete_file(FileId::new()).await.unwrap_err();
    assert!(matches!(err, OcrError::FileNotFound { .. }));

    let record = h
        .engine
        .upload_file("scan.png", "image/png", b"bytes")
        .await
        .unwrap();
    assert!(record.path.exists());
    assert_eq!(h.engine.list_files().len(), 1);

    h.engine.delete_file(record.id).await.unwrap();
    assert!(!record.path.exists(), "stored bytes must be removed");
    assert!(h.engine.list_files().is_empty());

    let err = h.engine.delete_file(record.id).await.unwrap_err();
    assert!(matches!(err, OcrError::FileNotFound { .. }));
}

// ── Upload boundary ──────────────────────────────────────────────────────

#[tokio::test]
async fn upload_enforces_size_limit_and_mime_allow_list() {
    let h = harness(FakeRasterizer { pages: 1 }, FakeExtractor::ok());

    let big = vec![0u8; 2 * 1024 * 1024];
    let err = h
        .engine
        .upload_file("big.pdf", "application/pdf", &big)
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::FileTooLarge { .. }), "got: {err}");

    let err = h
        .engine
        .upload_file("notes.txt", "text/plain", b"hello")
        .await
        .unwrap_err();
    assert!(
        matches!(err, OcrError::UnsupportedMediaType { .. }),
        "got: {err}"
    );
}

// ── Submission guarantees ────────────────────────────────────────────────

#[tokio::test]
async fn every_submission_returns_pending_with_a_fresh_id() {
    let h = harness(FakeRasterizer { pages: 1 }, FakeExtractor::ok());
    let png = seed_file(&h, "scan.png");

    let mut seen = HashSet::new();
    for _ in 0..5 {
        let job = h
            .engine
            .submit_path(&png, SubmitRequest::default())
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(seen.insert(job.id), "job id {} repeated", job.id);
    }
}

#[tokio::test]
async fn missing_path_fails_submission_synchronously() {
    let h = harness(FakeRasterizer { pages: 1 }, FakeExtractor::ok());

    let err = h
        .engine
        .submit_path("/definitely/not/a/real/file.pdf", SubmitRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::PathNotFound { .. }));
    assert!(h.store.list_jobs().is_empty());
}

#[tokio::test]
async fn unreachable_url_fails_the_job_not_the_submission() {
    let h = harness(FakeRasterizer { pages: 1 }, FakeExtractor::ok());

    // Syntactically valid, nothing listening: submission succeeds, the run
    // records the fetch failure.
    let job = h
        .engine
        .submit_url("http://127.0.0.1:1/doc.pdf", SubmitRequest::default())
        .await
        .expect("syntactically valid URL must be accepted");
    assert_eq!(job.status, JobStatus::Pending);

    let done = wait_terminal(&h.engine, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    let error = done.error.unwrap();
    assert!(error.contains("failed to download"), "got: {error}");
}

#[tokio::test]
async fn rasterizer_failure_fails_the_job() {
    let h = harness(BrokenRasterizer, FakeExtractor::ok());
    let pdf = seed_file(&h, "corrupt.pdf");

    let job = h
        .engine
        .submit_path(&pdf, SubmitRequest::default())
        .await
        .unwrap();

    let done = wait_terminal(&h.engine, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.result.is_none());
    assert!(
        done.error.unwrap().contains("rasterisation failed"),
        "error should describe the rasterisation failure"
    );
}

// ── Terminal-state properties ────────────────────────────────────────────

#[tokio::test]
async fn terminal_jobs_are_immutable_across_reads() {
    let h = harness(FakeRasterizer { pages: 2 }, FakeExtractor::ok());
    let pdf = seed_file(&h, "doc.pdf");

    let job = h
        .engine
        .submit_path(&pdf, SubmitRequest::default())
        .await
        .unwrap();
    wait_terminal(&h.engine, job.id).await;

    let first = serde_json::to_string(&h.engine.get_result(job.id).unwrap()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = serde_json::to_string(&h.engine.get_result(job.id).unwrap()).unwrap();
    assert_eq!(first, second, "terminal job reads must be byte-identical");
}

#[tokio::test]
async fn failed_iff_error_iff_no_result() {
    let ok = harness(FakeRasterizer { pages: 2 }, FakeExtractor::ok());
    let pdf = seed_file(&ok, "doc.pdf");
    let job = ok.engine.submit_path(&pdf, SubmitRequest::default()).await.unwrap();
    let done = wait_terminal(&ok.engine, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error.is_none() && done.result.is_some());

    let bad = harness(FakeRasterizer { pages: 2 }, FakeExtractor::failing_on("page-1"));
    let pdf = seed_file(&bad, "doc.pdf");
    let job = bad.engine.submit_path(&pdf, SubmitRequest::default()).await.unwrap();
    let done = wait_terminal(&bad.engine, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.is_some() && done.result.is_none());
}

// ── Progress visibility ──────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_observable_mid_run() {
    let h = harness(
        FakeRasterizer { pages: 5 },
        FakeExtractor {
            fail_pages: HashSet::new(),
            delay: Duration::from_millis(25),
        },
    );
    let pdf = seed_file(&h, "doc.pdf");

    let job = h
        .engine
        .submit_path(&pdf, SubmitRequest::default())
        .await
        .unwrap();

    let mut observed = Vec::new();
    loop {
        let view = h.engine.get_status(job.id).expect("job exists");
        if let Some(progress) = view.progress {
            assert!(progress.current_page <= progress.total_pages);
            observed.push(progress.current_page);
        }
        if view.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(
        observed.windows(2).all(|w| w[0] <= w[1]),
        "progress regressed: {observed:?}"
    );
    assert!(
        observed.iter().any(|&p| p < 5),
        "progress was never observable mid-run: {observed:?}"
    );
    assert_eq!(*observed.last().unwrap(), 5);
}

// ── Prompt plumbing ──────────────────────────────────────────────────────

#[tokio::test]
async fn job_records_the_prompt_it_ran_with() {
    let h = harness(FakeRasterizer { pages: 1 }, FakeExtractor::ok());
    let png = seed_file(&h, "scan.png");

    let with_default = h
        .engine
        .submit_path(&png, SubmitRequest::default())
        .await
        .unwrap();
    assert_eq!(
        with_default.prompt.as_deref(),
        Some("Extract all text from this image.")
    );

    let with_custom = h
        .engine
        .submit_path(
            &png,
            SubmitRequest {
                prompt: Some("Transcribe the handwriting.".into()),
                options: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        with_custom.prompt.as_deref(),
        Some("Transcribe the handwriting.")
    );

    wait_terminal(&h.engine, with_default.id).await;
    wait_terminal(&h.engine, with_custom.id).await;
}
