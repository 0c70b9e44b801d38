//! CLI binary for edgequake-pdf-insight.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf_insight::{
    analyze_report, inspect, AnalysisConfig, AnalysisProgressCallback, AnalysisReport, Pass,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner whose message follows the current stage,
/// with a log line printed above it as each stage finishes.
struct CliProgressCallback {
    spinner: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        spinner.set_prefix("Preparing");
        spinner.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            spinner,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, source: &str) {
        self.spinner.set_prefix("Parsing");
        self.spinner.set_message(source.to_string());
    }

    fn on_image_skipped(&self, page_num: usize, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.spinner.println(format!(
            "  {} image on page {} skipped  {}",
            yellow("!"),
            page_num,
            dim(reason)
        ));
    }

    fn on_extraction_complete(&self, page_count: usize, image_count: usize) {
        self.spinner.println(format!(
            "  {} Parsed {} pages, {} images{}",
            green("✓"),
            page_count,
            image_count,
            match self.skipped.load(Ordering::SeqCst) {
                0 => String::new(),
                n => dim(&format!(" ({n} skipped)")),
            }
        ));
    }

    fn on_pass_start(&self, pass: Pass) {
        let (prefix, msg) = match pass {
            Pass::Extraction => ("Step 1", "Extracting structured data from text…"),
            Pass::Synthesis => ("Step 2", "Performing overall synthesis and interpretation…"),
        };
        self.spinner.set_prefix(prefix);
        self.spinner.set_message(msg);
    }

    fn on_pass_complete(&self, pass: Pass, response_len: usize) {
        self.spinner.println(format!(
            "  {} {}  {}",
            green("✓"),
            pass,
            dim(&format!("{response_len} chars"))
        ));
    }

    fn on_pass_failed(&self, pass: Pass, error: &str) {
        let note = match pass {
            Pass::Extraction => "continuing with raw text",
            Pass::Synthesis => "no analysis produced",
        };
        self.spinner.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            pass,
            red(&truncate(error, 80)),
            dim(note)
        ));
    }

    fn on_analysis_complete(&self, _success: bool) {
        self.spinner.finish_and_clear();
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars - 1).collect();
        format!("{head}\u{2026}")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a report, print Markdown to stdout
  pdfinsight blood-panel.pdf

  # Save the full report, including the structured extraction
  pdfinsight blood-panel.pdf --show-extraction -o analysis.md

  # Use a specific provider and model
  pdfinsight --provider gemini --model gemini-2.0-flash report.pdf

  # Analyse a report from a URL
  pdfinsight https://example.org/reports/lipid-profile.pdf

  # See what the parser finds (no API key needed)
  pdfinsight --inspect-only report.pdf

  # JSON output for scripting
  pdfinsight --json report.pdf > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  GEMINI_API_KEY          Google Gemini API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter, e.g. edgequake_pdf_insight=debug

  Variables may also be placed in a .env file in the working directory.

DISCLAIMER:
  The analysis is informational only and is NOT a substitute for professional
  medical advice, diagnosis, or treatment. Discuss the findings with a doctor.
"#;

/// Analyse medical and laboratory report PDFs with a vision-capable LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdfinsight",
    version,
    about = "Analyse medical report PDFs with a vision-capable LLM",
    long_about = "Extract the text and embedded images of a medical or laboratory report PDF, \
pull out every measurement with its reference range, and produce a cautious, plain-language \
interpretation. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the report to this file instead of stdout.
    #[arg(short, long, env = "PDFINSIGHT_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          The model must accept images when the report contains any."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFINSIGHT_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max LLM output tokens per pass.
    #[arg(long, env = "PDFINSIGHT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// JPEG quality for images sent to the model (1–100).
    #[arg(long, env = "PDFINSIGHT_JPEG_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Always call the model, even for a request already answered in this process.
    #[arg(long, env = "PDFINSIGHT_NO_CACHE")]
    no_cache: bool,

    /// Output structured JSON (AnalysisReport) instead of Markdown.
    #[arg(long, env = "PDFINSIGHT_JSON")]
    json: bool,

    /// Include the pass-1 structured extraction in the Markdown report.
    #[arg(long, env = "PDFINSIGHT_SHOW_EXTRACTION")]
    show_extraction: bool,

    /// Print what the parser finds, no analysis.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDFINSIGHT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFINSIGHT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFINSIGHT_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFINSIGHT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials usually live in .env; a missing file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports every stage; keep INFO logs out of its way.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("File:            {}", cli.input);
            println!("Pages:           {}", summary.page_count);
            println!("Images:          {}", summary.image_count);
            println!("Skipped images:  {}", summary.skipped_images);
            println!("Text characters: {}", summary.text_chars);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn AnalysisProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Run analysis ─────────────────────────────────────────────────────
    let outcome = analyze_report(&cli.input, &config).await;
    if let Some(ref cb) = cli_progress {
        // Parse failures end the run before the analysis-complete event.
        cb.spinner.finish_and_clear();
    }
    let report = outcome.context("Report analysis failed")?;

    let rendered = render(&report, &cli)?;

    if let Some(ref output_path) = cli.output {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(output_path, &rendered)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        if !cli.quiet {
            eprintln!(
                "{}  {} pages, {} images  {}ms  →  {}",
                green("✔"),
                report.document.page_count,
                report.document.image_count,
                report.stats.total_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "{}",
                dim(&format!(
                    "Analysed {} pages, {} images in {}ms ({} cache hits)",
                    report.document.page_count,
                    report.document.image_count,
                    report.stats.total_ms,
                    report.stats.cache_hits
                ))
            );
        }
    }

    if report.result.initial_extraction.is_none() && !cli.quiet {
        eprintln!(
            "{} structured extraction failed; the interpretation is based on the raw text",
            yellow("⚠")
        );
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .jpeg_quality(cli.jpeg_quality)
        .use_cache(!cli.no_cache)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn render(report: &AnalysisReport, cli: &Cli) -> Result<String> {
    if cli.json {
        serde_json::to_string_pretty(report).context("Failed to serialise report")
    } else {
        Ok(report.to_markdown(cli.show_extraction))
    }
}
