//! Configuration for the OCR orchestrator.
//!
//! All behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`] or loaded from the environment with
//! [`OcrConfig::from_env`]. Keeping every knob in one struct makes it easy to
//! share across job tasks behind an `Arc` and to log the effective settings
//! of a run.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor breaks on every new field. The builder lets
//! callers set only what they care about and rely on documented defaults.

use crate::error::OcrError;
use crate::prompts::DEFAULT_PROMPT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration consumed by the orchestrator and its collaborators.
///
/// # Example
/// ```rust
/// use textlift::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .model("deepseek-ocr")
///     .max_retries(5)
///     .api_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Vision model identifier sent to the inference endpoint.
    /// Default: "deepseek-ocr".
    pub model: String,

    /// Base URL of the inference endpoint. Default: "http://localhost:11434".
    pub endpoint: String,

    /// Prompt used when a submission carries none.
    /// Default: "Extract all text from this image.".
    pub default_prompt: String,

    /// Per-attempt timeout for one extraction call, in seconds. Default: 300.
    ///
    /// Vision OCR on a dense page can take minutes on local hardware. A
    /// timed-out call is aborted and counts as one failed attempt.
    pub api_timeout_secs: u64,

    /// Maximum extraction attempts per page. Default: 3.
    ///
    /// Retries live inside the extractor client, not the orchestrator: the
    /// job sees only the final outcome of a page.
    pub max_retries: u32,

    /// Base retry delay in milliseconds, linear backoff. Default: 1000.
    ///
    /// The wait before retry `i` is `retry_base_delay_ms × i`: 1 s → 2 s
    /// for the default three attempts.
    pub retry_base_delay_ms: u64,

    /// Default language hint recorded on jobs that set none. Default: "auto".
    pub default_language: String,

    /// Documented per-document page limit. Default: 100.
    ///
    /// Not a hard cap: documents beyond the limit are processed with a
    /// warning. Admission control belongs to an outer layer.
    pub max_pages: usize,

    /// Upscaling factor applied when rasterising PDF pages. Default: 2.0.
    ///
    /// 2.0× favours OCR fidelity over image size — small print survives the
    /// model's downsampling at the cost of larger request bodies.
    pub render_scale: f32,

    /// Timeout for fetching a by-URL submission, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Directory uploaded files are stored under. Default: "./uploads".
    pub upload_dir: PathBuf,

    /// Maximum accepted upload size in bytes. Default: 52 428 800 (50 MiB).
    pub max_file_size: u64,

    /// MIME types accepted by the upload boundary.
    /// Default: PDF, PNG, JPEG.
    pub allowed_mime_types: Vec<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-ocr".into(),
            endpoint: "http://localhost:11434".into(),
            default_prompt: DEFAULT_PROMPT.into(),
            api_timeout_secs: 300,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            default_language: "auto".into(),
            max_pages: 100,
            render_scale: 2.0,
            download_timeout_secs: 120,
            upload_dir: PathBuf::from("./uploads"),
            max_file_size: 52_428_800,
            allowed_mime_types: vec![
                "application/pdf".into(),
                "image/png".into(),
                "image/jpeg".into(),
            ],
        }
    }
}

impl OcrConfig {
    /// Create a new builder.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognised variables: `OLLAMA_HOST`, `OLLAMA_MODEL`, `OLLAMA_TIMEOUT`
    /// (milliseconds), `OLLAMA_MAX_RETRIES`, `OLLAMA_RETRY_DELAY`
    /// (milliseconds), `OCR_DEFAULT_PROMPT`, `OCR_DEFAULT_LANGUAGE`,
    /// `OCR_MAX_PAGES`, `STORAGE_LOCAL_PATH`, `STORAGE_MAX_FILE_SIZE`,
    /// `STORAGE_ALLOWED_MIMETYPES` (comma-separated).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("OLLAMA_HOST") {
            if !v.is_empty() {
                config.endpoint = v;
            }
        }
        if let Ok(v) = std::env::var("OLLAMA_MODEL") {
            if !v.is_empty() {
                config.model = v;
            }
        }
        if let Some(ms) = env_parse::<u64>("OLLAMA_TIMEOUT") {
            // Stored in seconds; the env surface is historically milliseconds.
            config.api_timeout_secs = (ms / 1000).max(1);
        }
        if let Some(n) = env_parse::<u32>("OLLAMA_MAX_RETRIES") {
            config.max_retries = n.max(1);
        }
        if let Some(ms) = env_parse::<u64>("OLLAMA_RETRY_DELAY") {
            config.retry_base_delay_ms = ms;
        }
        if let Ok(v) = std::env::var("OCR_DEFAULT_PROMPT") {
            if !v.is_empty() {
                config.default_prompt = v;
            }
        }
        if let Ok(v) = std::env::var("OCR_DEFAULT_LANGUAGE") {
            if !v.is_empty() {
                config.default_language = v;
            }
        }
        if let Some(n) = env_parse::<usize>("OCR_MAX_PAGES") {
            config.max_pages = n;
        }
        if let Ok(v) = std::env::var("STORAGE_LOCAL_PATH") {
            if !v.is_empty() {
                config.upload_dir = PathBuf::from(v);
            }
        }
        if let Some(n) = env_parse::<u64>("STORAGE_MAX_FILE_SIZE") {
            config.max_file_size = n;
        }
        if let Ok(v) = std::env::var("STORAGE_ALLOWED_MIMETYPES") {
            let list: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !list.is_empty() {
                config.allowed_mime_types = list;
            }
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn default_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.default_prompt = prompt.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.config.default_language = lang.into();
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 4.0);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn allowed_mime_types(mut self, types: Vec<String>) -> Self {
        self.config.allowed_mime_types = types;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.endpoint.is_empty() {
            return Err(OcrError::InvalidConfig("endpoint must not be empty".into()));
        }
        if c.model.is_empty() {
            return Err(OcrError::InvalidConfig("model must not be empty".into()));
        }
        if c.allowed_mime_types.is_empty() {
            return Err(OcrError::InvalidConfig(
                "allowed_mime_types must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = OcrConfig::default();
        assert_eq!(c.model, "deepseek-ocr");
        assert_eq!(c.endpoint, "http://localhost:11434");
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_base_delay_ms, 1000);
        assert_eq!(c.max_pages, 100);
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.max_file_size, 52_428_800);
        assert_eq!(c.allowed_mime_types.len(), 3);
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = OcrConfig::builder()
            .max_retries(0)
            .render_scale(10.0)
            .api_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.max_retries, 1);
        assert_eq!(c.render_scale, 4.0);
        assert_eq!(c.api_timeout_secs, 1);
    }

    #[test]
    fn builder_rejects_empty_endpoint() {
        let err = OcrConfig::builder().endpoint("").build().unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn builder_rejects_empty_mime_allow_list() {
        let err = OcrConfig::builder()
            .allowed_mime_types(vec![])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("allowed_mime_types"));
    }
}
