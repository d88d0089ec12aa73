//! CLI binary for textlift.
//!
//! A thin shim over the library crate: builds an [`OcrEngine`], submits the
//! input, then exercises the same polling surface any other caller would
//! use — `get_status` on an interval until the job reaches a terminal
//! state, then `get_result`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use textlift::{is_url, JobOptions, JobStatus, OcrConfig, OcrEngine, SubmitRequest};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a local PDF (needs a vision model served at OLLAMA_HOST)
  textlift scan.pdf

  # Extract a remote document, write the text to a file
  textlift https://example.com/invoice.pdf -o invoice.txt

  # Custom prompt and model
  textlift --model deepseek-ocr --prompt "Transcribe the table" page.png

  # Print the full job record as JSON
  textlift --json scan.pdf > job.json

  # Check whether the inference endpoint is reachable
  textlift --check

ENVIRONMENT VARIABLES:
  OLLAMA_HOST             Endpoint base URL (default: http://localhost:11434)
  OLLAMA_MODEL            Vision model id (default: deepseek-ocr)
  OLLAMA_TIMEOUT          Per-attempt timeout in milliseconds
  OLLAMA_MAX_RETRIES      Extraction attempts per page
  OLLAMA_RETRY_DELAY      Base retry delay in milliseconds (linear backoff)
  OCR_DEFAULT_PROMPT      Prompt used when --prompt is not given
  OCR_DEFAULT_LANGUAGE    Language hint recorded on the job
"#;

/// Extract text from PDFs and images using vision language models.
#[derive(Parser, Debug)]
#[command(
    name = "textlift",
    version,
    about = "Extract text from PDFs and images using vision language models",
    long_about = "Submit a PDF or image (local path or URL) as an extraction job, poll its \
progress, and print the extracted text. PDFs are rasterised page by page; every page goes \
through the vision endpoint sequentially with per-page retries.",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL to a PDF or image.
    input: Option<String>,

    /// Write extracted text to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extraction prompt (default: the configured OCR prompt).
    #[arg(short, long)]
    prompt: Option<String>,

    /// Vision model id.
    #[arg(long)]
    model: Option<String>,

    /// Inference endpoint base URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Language hint recorded on the job.
    #[arg(long)]
    language: Option<String>,

    /// Extraction attempts per page.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-attempt timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Status polling interval in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,

    /// Print the full job record as JSON instead of the text.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Only probe the inference endpoint and exit.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long)]
    quiet: bool,
}

fn build_config(cli: &Cli) -> OcrConfig {
    let mut config = OcrConfig::from_env();
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(n) = cli.max_retries {
        config.max_retries = n.max(1);
    }
    if let Some(secs) = cli.timeout {
        config.api_timeout_secs = secs.max(1);
    }
    config
}

fn page_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.set_prefix("Extracting");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the user-facing feedback; library logs go to
    // stderr and stay at ERROR unless asked for.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli);
    let engine = OcrEngine::with_defaults(config);

    // ── Health probe ─────────────────────────────────────────────────────
    if cli.check {
        if engine.check_extractor_health().await {
            eprintln!("endpoint {} is reachable", engine.config().endpoint);
            return Ok(());
        }
        bail!("endpoint {} is not reachable", engine.config().endpoint);
    }

    let Some(input) = cli.input.clone() else {
        bail!("no input given (see --help)");
    };

    // ── Submit ───────────────────────────────────────────────────────────
    let options = cli.language.as_ref().map(|lang| JobOptions {
        language: Some(lang.clone()),
        ..JobOptions::default()
    });
    let request = SubmitRequest {
        prompt: cli.prompt.clone(),
        options,
    };

    let job = if is_url(&input) {
        engine.submit_url(&input, request).await?
    } else {
        engine.submit_path(&input, request).await?
    };
    if !cli.quiet {
        eprintln!("submitted job {}", job.id);
    }

    // ── Poll until terminal ──────────────────────────────────────────────
    let bar = (!cli.no_progress && !cli.quiet).then(page_bar);

    loop {
        let view = engine.get_status(job.id)?;
        if let (Some(bar), Some(progress)) = (&bar, view.progress) {
            if bar.length() != Some(progress.total_pages as u64) {
                bar.set_length(progress.total_pages as u64);
            }
            bar.set_position(progress.current_page as u64);
        }
        if view.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(cli.poll_interval_ms)).await;
    }
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    // ── Report ───────────────────────────────────────────────────────────
    let job = engine.get_result(job.id)?;
    match job.status {
        JobStatus::Completed => {
            let rendered = if cli.json {
                serde_json::to_string_pretty(&job).context("serialising job record")?
            } else {
                job.result
                    .as_ref()
                    .map(|r| r.text.clone())
                    .unwrap_or_default()
            };

            match &cli.output {
                Some(path) => {
                    std::fs::write(path, rendered.as_bytes())
                        .with_context(|| format!("writing {}", path.display()))?;
                    if !cli.quiet {
                        eprintln!("wrote {}", path.display());
                    }
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(rendered.as_bytes())?;
                    if !rendered.ends_with('\n') {
                        stdout.write_all(b"\n")?;
                    }
                }
            }
            Ok(())
        }
        JobStatus::Failed => {
            bail!(
                "job {} failed: {}",
                job.id,
                job.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        other => bail!("job {} ended polling in non-terminal state {}", job.id, other),
    }
}
