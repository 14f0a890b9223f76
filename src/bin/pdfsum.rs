//! CLI binary for edgequake-pdfsum.
//!
//! A thin shim over the library crate that maps CLI flags (layered over an
//! optional JSON config file) to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfsum::{
    inspect, ComputeDevice, FailureReason, ImageFailurePolicy, PageSelection, Pipeline,
    PipelineConfig, PipelineProgressCallback, PipelineReport, ProgressCallback, Stage,
};
use edgequake_pdfsum::pipeline::ocr::TesseractCli;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the running stage and one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "Extracting text and running OCR…",
        Stage::Normalize => "Preprocessing text…",
        Stage::Summarize => "Summarizing (first run downloads the model)…",
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(stage_message(stage));
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize, elapsed_ms: u64) {
        let mark = if output_len > 0 { green("✓") } else { red("✗") };
        self.bar.println(format!(
            "  {} {:<10} {:<14} {}",
            mark,
            stage.to_string(),
            dim(&format!("{output_len:>7} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_summary(&self, _summary: &str) {
        self.bar.finish_and_clear();
    }

    fn on_failure(&self, reason: FailureReason, detail: Option<&str>) {
        self.bar.finish_and_clear();
        match detail {
            Some(d) => eprintln!("{} {}: {}", red("✘"), bold(&reason.to_string()), d),
            None => eprintln!("{} {}", red("✘"), bold(&reason.to_string())),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise to stdout
  pdfsum report.pdf

  # Write the summary to a file
  pdfsum report.pdf -o summary.txt

  # Also print the extracted text
  pdfsum --show-text scan.pdf

  # Only some pages, keep going past unreadable images
  pdfsum --pages 1-10 --skip-broken-images book.pdf

  # Settings from a JSON file, flags override it
  pdfsum --config config.json --num-beams 2 report.pdf

  # Full report as JSON
  pdfsum --json report.pdf > report.json

  # PDF metadata only (no OCR, no model)
  pdfsum --inspect-only report.pdf

CONFIG FILE:
  Any subset of PipelineConfig fields, e.g.
    { "tesseract_cmd": "/usr/bin/tesseract", "ocr_language": "eng" }

ENVIRONMENT VARIABLES:
  TESSERACT_CMD        Path to the tesseract executable
  PDFSUM_PDFIUM_DIR    Directory containing libpdfium
  PDFSUM_MODEL         Hugging Face model id (default google-t5/t5-small)
  PDFSUM_MODEL_CACHE   Hub cache directory for model files
  PDFSUM_DEVICE        auto, cpu, cuda, cuda:N
  RUST_LOG             Override log filter (e.g. edgequake_pdfsum=debug)
"#;

/// Summarise PDF documents (text layer + OCR) with a local T5 model.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsum",
    version,
    about = "Summarise PDF documents (text layer + OCR of images) with a local T5 model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the summary to this file instead of stdout.
    #[arg(short, long, env = "PDFSUM_OUTPUT")]
    output: Option<PathBuf>,

    /// JSON configuration file; command-line flags override its values.
    #[arg(long, env = "PDFSUM_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_CMD")]
    tesseract_cmd: Option<PathBuf>,

    /// OCR language code passed to tesseract.
    #[arg(long, env = "PDFSUM_OCR_LANG")]
    ocr_lang: Option<String>,

    /// Directory containing libpdfium (default: system library path).
    #[arg(long, env = "PDFSUM_PDFIUM_DIR")]
    pdfium_dir: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFSUM_PASSWORD")]
    password: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDFSUM_PAGES")]
    pages: Option<PageSelection>,

    /// Skip images that fail to decode or OCR instead of discarding the document.
    #[arg(long, env = "PDFSUM_SKIP_BROKEN_IMAGES")]
    skip_broken_images: bool,

    /// Hugging Face model id.
    #[arg(long, env = "PDFSUM_MODEL")]
    model: Option<String>,

    /// Model revision (branch, tag, or commit).
    #[arg(long, env = "PDFSUM_MODEL_REVISION")]
    revision: Option<String>,

    /// Hub cache directory for model files.
    #[arg(long, env = "PDFSUM_MODEL_CACHE")]
    model_cache_dir: Option<PathBuf>,

    /// Inference device: auto, cpu, cuda, cuda:N.
    #[arg(long, env = "PDFSUM_DEVICE")]
    device: Option<ComputeDevice>,

    /// Beam width.
    #[arg(long, env = "PDFSUM_NUM_BEAMS")]
    num_beams: Option<usize>,

    /// Maximum summary length in tokens.
    #[arg(long, env = "PDFSUM_MAX_SUMMARY_TOKENS")]
    max_summary_tokens: Option<usize>,

    /// Minimum summary length in tokens.
    #[arg(long, env = "PDFSUM_MIN_SUMMARY_TOKENS")]
    min_summary_tokens: Option<usize>,

    /// Input token budget; longer text is truncated.
    #[arg(long, env = "PDFSUM_MAX_INPUT_TOKENS")]
    max_input_tokens: Option<usize>,

    /// Print the extracted text before the summary.
    #[arg(long)]
    show_text: bool,

    /// Output the full report (state, texts, summary, timings) as JSON.
    #[arg(long, env = "PDFSUM_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDFSUM_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction or summarisation.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSUM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSUM_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; verbose mode always shows everything.
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

    let config = build_config(&cli)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input, &config).context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── OCR pre-flight ───────────────────────────────────────────────────
    // Native-text PDFs need no OCR, so a missing engine only warns here.
    if !cli.quiet && !TesseractCli::from_config(&config).is_available() {
        eprintln!(
            "{} tesseract could not be started at '{}'; PDFs with images will fail to extract",
            red("warning:"),
            config.tesseract_cmd.display()
        );
    }

    // ── Run pipeline ─────────────────────────────────────────────────────
    let mut pipeline = Pipeline::from_config(&config);
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        pipeline = pipeline.with_progress(cb);
    }

    let report = match cli.output {
        Some(ref output_path) => pipeline
            .summarize_to_file(&cli.input, output_path)
            .context("Failed to write summary")?,
        None => pipeline.run(&cli.input),
    };

    print_report(&cli, &report)?;

    if !report.is_success() {
        anyhow::bail!(
            "No summary produced for '{}' ({:?}){}",
            cli.input.display(),
            report.state,
            report
                .failure
                .as_deref()
                .map(|f| format!(": {f}"))
                .unwrap_or_default()
        );
    }

    if !cli.quiet && !cli.json {
        let t = &report.timings;
        eprintln!(
            "{} {} pages, {} images OCR'd  →  {} chars summary  {}",
            green("✔"),
            report.extraction.pages_visited,
            report.extraction.images_recognized,
            report.summary.len(),
            dim(&format!(
                "{}ms (extract {} / normalize {} / summarize {})",
                t.total_ms, t.extract_ms, t.normalize_ms, t.summarize_ms
            )),
        );
        if let Some(ref path) = cli.output {
            eprintln!("   written to {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Print the report to stdout in the requested form.
fn print_report(cli: &Cli, report: &PipelineReport) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.show_text && !report.raw_text.is_empty() {
        writeln!(handle, "{}", bold("── Extracted text ──"))
            .and_then(|_| writeln!(handle, "{}", report.raw_text.trim_end()))
            .and_then(|_| writeln!(handle, "{}", bold("── Summary ──")))
            .context("Failed to write to stdout")?;
    }
    if cli.output.is_none() && !report.summary.is_empty() {
        writeln!(handle, "{}", report.summary).context("Failed to write to stdout")?;
    }
    Ok(())
}

/// Layer CLI flags over the JSON config file (or defaults).
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let base = match cli.config {
        Some(ref path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => PipelineConfig::default(),
    };

    let mut builder = base.to_builder();
    if let Some(ref cmd) = cli.tesseract_cmd {
        builder = builder.tesseract_cmd(cmd);
    }
    if let Some(ref lang) = cli.ocr_lang {
        builder = builder.ocr_language(lang);
    }
    if let Some(ref dir) = cli.pdfium_dir {
        builder = builder.pdfium_dir(dir);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref pages) = cli.pages {
        builder = builder.pages(pages.clone());
    }
    if cli.skip_broken_images {
        builder = builder.image_failure_policy(ImageFailurePolicy::Skip);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model_id(model);
    }
    if let Some(ref rev) = cli.revision {
        builder = builder.model_revision(rev);
    }
    if let Some(ref dir) = cli.model_cache_dir {
        builder = builder.model_cache_dir(dir);
    }
    if let Some(device) = cli.device {
        builder = builder.device(device);
    }
    if let Some(n) = cli.num_beams {
        builder = builder.num_beams(n);
    }
    if let Some(n) = cli.max_summary_tokens {
        builder = builder.max_summary_tokens(n);
    }
    if let Some(n) = cli.min_summary_tokens {
        builder = builder.min_summary_tokens(n);
    }
    if let Some(n) = cli.max_input_tokens {
        builder = builder.max_input_tokens(n);
    }

    builder.build().context("Invalid configuration")
}
