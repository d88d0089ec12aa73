//! Submission input resolution.
//!
//! Submissions arrive in four shapes — an uploaded file id, a URL, an inline
//! base64 payload, or a server path. [`DocumentSource`] models them as a
//! closed set of tagged variants, and [`DocumentSource::resolve`] turns any
//! of them into one ordered sequence of [`PageImage`]s plus a provenance
//! tag. After resolution the orchestrator's per-page loop has exactly one
//! code path regardless of origin.
//!
//! Resolution policy: a source whose MIME type or extension marks it as a
//! PDF goes through the rasteriser page by page; anything else is treated
//! as a single-page image and its bytes pass through base64 untouched.
//! Downloaded and inline PDFs are staged in a `NamedTempFile` the
//! rasteriser can open; the file is cleaned up when resolution returns.

use crate::config::OcrConfig;
use crate::error::RunError;
use crate::job::{FileRecord, Provenance};
use crate::pipeline::rasterize::PageRasterizer;
use crate::pipeline::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// MIME type that routes a source through the rasteriser.
pub const PDF_MIME: &str = "application/pdf";

/// The input a job was submitted with.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A previously uploaded file, by record.
    File(FileRecord),
    /// A document to fetch over HTTP(S).
    Url(String),
    /// An inline base64 payload with its declared name and MIME type.
    Inline {
        data: String,
        filename: String,
        mime_type: String,
    },
    /// A file already on the server's filesystem.
    Path(PathBuf),
}

/// The resolved page sequence of a submission, in document order.
#[derive(Debug)]
pub struct ResolvedPages {
    pub pages: Vec<PageImage>,
    pub provenance: Provenance,
}

/// Check whether the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn mime_for_path(path: &Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg".into(),
        _ => "image/png".into(),
    }
}

impl DocumentSource {
    /// Resolve this source into its ordered page images.
    pub async fn resolve(
        &self,
        rasterizer: &dyn PageRasterizer,
        config: &OcrConfig,
    ) -> Result<ResolvedPages, RunError> {
        match self {
            DocumentSource::File(record) => {
                let pages = if record.mime_type == PDF_MIME {
                    rasterizer.rasterize(&record.path, config.render_scale).await?
                } else {
                    vec![read_page(&record.path, record.mime_type.clone()).await?]
                };
                Ok(ResolvedPages {
                    pages,
                    provenance: Provenance::Filename(record.original_name.clone()),
                })
            }
            DocumentSource::Url(url) => {
                let (bytes, content_type) = download(url, config.download_timeout_secs).await?;
                let pages = if content_type.contains("pdf") {
                    rasterize_bytes(&bytes, rasterizer, config.render_scale).await?
                } else {
                    vec![PageImage {
                        data: STANDARD.encode(&bytes),
                        mime_type: content_type,
                    }]
                };
                Ok(ResolvedPages {
                    pages,
                    provenance: Provenance::SourceUrl(url.clone()),
                })
            }
            DocumentSource::Inline {
                data,
                filename,
                mime_type,
            } => {
                let pages = if mime_type == PDF_MIME {
                    let bytes =
                        STANDARD
                            .decode(data.as_bytes())
                            .map_err(|e| RunError::InvalidPayload {
                                reason: e.to_string(),
                            })?;
                    rasterize_bytes(&bytes, rasterizer, config.render_scale).await?
                } else {
                    vec![PageImage {
                        data: data.clone(),
                        mime_type: mime_type.clone(),
                    }]
                };
                Ok(ResolvedPages {
                    pages,
                    provenance: Provenance::Filename(filename.clone()),
                })
            }
            DocumentSource::Path(path) => {
                let pages = if has_pdf_extension(path) {
                    rasterizer.rasterize(path, config.render_scale).await?
                } else {
                    vec![read_page(path, mime_for_path(path)).await?]
                };
                Ok(ResolvedPages {
                    pages,
                    provenance: Provenance::SourcePath(path.display().to_string()),
                })
            }
        }
    }
}

/// Read a single-page image file into a pass-through [`PageImage`].
async fn read_page(path: &Path, mime_type: String) -> Result<PageImage, RunError> {
    let bytes = tokio::fs::read(path).await?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(PageImage {
        data: STANDARD.encode(&bytes),
        mime_type,
    })
}

/// Stage PDF bytes in a temp file and rasterise them.
async fn rasterize_bytes(
    bytes: &[u8],
    rasterizer: &dyn PageRasterizer,
    scale: f32,
) -> Result<Vec<PageImage>, RunError> {
    let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile()?;
    tmp.write_all(bytes)?;
    // `tmp` must outlive the rasterise call; it is deleted on drop.
    let pages = rasterizer.rasterize(tmp.path(), scale).await?;
    Ok(pages)
}

/// Fetch a URL, returning the body and its content type.
///
/// Syntactic URL validation already happened at submission time; everything
/// that goes wrong here (DNS, connection, status, timeout) is a job failure.
async fn download(url: &str, timeout_secs: u64) -> Result<(Vec<u8>, String), RunError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RunError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            RunError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            RunError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(RunError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(';').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "image/png".to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RunError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    Ok((bytes.to_vec(), content_type))
}
