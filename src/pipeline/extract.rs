//! Vision endpoint interaction: send one page image, get its text back.
//!
//! The orchestrator consumes extraction through the [`TextExtractor`] trait
//! and knows nothing about retries — a page either yields text or has
//! conclusively failed. All retry, backoff, and timeout policy lives in the
//! client so it can be tested in isolation against a scripted HTTP server.
//!
//! ## Retry Strategy
//!
//! Local inference endpoints fail transiently: model loading, VRAM
//! pressure, connection resets. Each page gets up to `max_retries` attempts
//! with a linear backoff (`retry_base_delay_ms × attempt`) between them —
//! 1 s → 2 s for the defaults. Every attempt carries its own timeout; a
//! timed-out request is aborted and counts as a failed attempt. When all
//! attempts are spent the page fails with the last observed error, which
//! the orchestrator treats as fatal for the whole job.

use crate::config::OcrConfig;
use crate::error::RunError;
use crate::pipeline::PageImage;
use crate::prompts::FREE_OCR_PROMPT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Text extracted from one page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// Model identifier the endpoint reported it actually used.
    pub model: String,
}

/// Extracts text from a single page image.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Run one page through the vision endpoint with the given prompt.
    ///
    /// Returns `Err` only after the client's own retries are exhausted.
    async fn extract(&self, page: &PageImage, prompt: &str) -> Result<Extraction, RunError>;

    /// Report whether the endpoint is reachable, without throwing.
    async fn check_health(&self) -> bool;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    images: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

// ── Ollama client ────────────────────────────────────────────────────────

/// Client for an Ollama-style `/api/chat` vision endpoint.
#[derive(Debug, Clone)]
pub struct OllamaExtractor {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl OllamaExtractor {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.api_timeout_secs),
            max_retries: config.max_retries.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// One request/response round trip, no retry.
    async fn attempt(&self, page: &PageImage, prompt: &str) -> Result<Extraction, String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: vec![&page.data],
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("request timed out after {}s", self.timeout.as_secs())
                } else {
                    e.to_string()
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("vision endpoint returned {status}: {text}"));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed endpoint response: {e}"))?;

        Ok(Extraction {
            text: parsed.message.map(|m| m.content).unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[async_trait]
impl TextExtractor for OllamaExtractor {
    async fn extract(&self, page: &PageImage, prompt: &str) -> Result<Extraction, RunError> {
        let prompt = if prompt.is_empty() { FREE_OCR_PROMPT } else { prompt };

        let mut last_err = String::from("unknown error");

        for attempt in 1..=self.max_retries {
            debug!(
                "Extracting page via {} (attempt {}/{})",
                self.model, attempt, self.max_retries
            );

            match self.attempt(page, prompt).await {
                Ok(extraction) => return Ok(extraction),
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.max_retries, e);
                    last_err = e;
                    if attempt < self.max_retries {
                        sleep(self.retry_base_delay * attempt).await;
                    }
                }
            }
        }

        Err(RunError::Extraction {
            attempts: self.max_retries,
            detail: last_err,
        })
    }

    async fn check_health(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, max_retries: u32) -> OcrConfig {
        OcrConfig::builder()
            .endpoint(server.uri())
            .model("deepseek-ocr")
            .max_retries(max_retries)
            .retry_base_delay_ms(1)
            .api_timeout_secs(5)
            .build()
            .unwrap()
    }

    fn page() -> PageImage {
        PageImage {
            data: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
        }
    }

    fn chat_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "model": "deepseek-ocr:latest",
            "message": { "role": "assistant", "content": text },
            "total_duration": 123
        }))
    }

    #[tokio::test]
    async fn extract_returns_text_and_reported_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "deepseek-ocr",
                "stream": false,
                "messages": [{ "role": "user", "content": "Read this.", "images": ["aGVsbG8="] }]
            })))
            .respond_with(chat_reply("Page text"))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = OllamaExtractor::new(&config_for(&server, 3));
        let out = extractor.extract(&page(), "Read this.").await.unwrap();
        assert_eq!(out.text, "Page text");
        assert_eq!(out.model, "deepseek-ocr:latest");
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(chat_reply("recovered"))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = OllamaExtractor::new(&config_for(&server, 3));
        let out = extractor.extract(&page(), "p").await.unwrap();
        assert_eq!(out.text, "recovered");
    }

    #[tokio::test]
    async fn exhausted_retries_fail_with_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .expect(2)
            .mount(&server)
            .await;

        let extractor = OllamaExtractor::new(&config_for(&server, 2));
        let err = extractor.extract(&page(), "p").await.unwrap_err();
        match err {
            RunError::Extraction { attempts, detail } => {
                assert_eq!(attempts, 2);
                assert!(detail.contains("500"), "got: {detail}");
                assert!(detail.contains("model not loaded"), "got: {detail}");
            }
            other => panic!("expected Extraction error, got {other}"),
        }
    }

    #[tokio::test]
    async fn empty_prompt_falls_back_to_free_ocr() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "messages": [{ "content": FREE_OCR_PROMPT }]
            })))
            .respond_with(chat_reply("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = OllamaExtractor::new(&config_for(&server, 1));
        extractor.extract(&page(), "").await.unwrap();
    }

    #[tokio::test]
    async fn missing_message_yields_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "model": "m" })))
            .mount(&server)
            .await;

        let extractor = OllamaExtractor::new(&config_for(&server, 1));
        let out = extractor.extract(&page(), "p").await.unwrap();
        assert_eq!(out.text, "");
    }

    #[tokio::test]
    async fn health_reflects_endpoint_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
            .mount(&server)
            .await;

        let extractor = OllamaExtractor::new(&config_for(&server, 1));
        assert!(extractor.check_health().await);

        let unreachable = OcrConfig::builder()
            .endpoint("http://127.0.0.1:1")
            .build()
            .unwrap();
        assert!(!OllamaExtractor::new(&unreachable).check_health().await);
    }
}
