//! # edgequake-pdfsum
//!
//! Summarise PDF documents with a local sequence-to-sequence model.
//!
//! Text comes from two places: the PDF's own text layer, read through
//! pdfium, and OCR of every embedded image, done by tesseract. The combined
//! text is normalised to a single line of ASCII and summarised by a T5
//! checkpoint running on candle with beam search. Nothing leaves the
//! machine except the one-time model download from the Hugging Face hub.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract    page text + OCR of embedded images (pdfium, tesseract)
//!  ├─ 2. Normalize  collapse whitespace, strip non-ASCII
//!  └─ 3. Summarize  truncate to 1024 tokens, beam search ≤ 150 tokens (candle T5)
//! ```
//!
//! A stage that yields nothing stops the run with
//! [`PipelineState::Failed`]; [`Pipeline::run`] always returns a
//! [`PipelineReport`] rather than an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsum::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .tesseract_cmd("/usr/bin/tesseract")
//!     .build()?;
//! let mut pipeline = Pipeline::from_config(&config);
//!
//! let report = pipeline.run("document.pdf");
//! if report.is_success() {
//!     println!("{}", report.summary);
//! } else {
//!     eprintln!("{:?}: {}", report.state, report.failure.unwrap_or_default());
//! }
//! # Ok::<(), edgequake_pdfsum::PdfSumError>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsum` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `cuda`  | off     | CUDA kernels for candle; `ComputeDevice::Auto` then picks GPU 0 if present |
//!
//! ## Runtime Requirements
//!
//! * `libpdfium` on the system library path, or a directory given via
//!   [`PipelineConfig::pdfium_dir`].
//! * The `tesseract` executable, or its path in
//!   [`PipelineConfig::tesseract_cmd`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ComputeDevice, ImageFailurePolicy, PageSelection, PipelineConfig, PipelineConfigBuilder,
};
pub use error::{ErrorKind, PdfSumError};
pub use output::{
    DocumentMetadata, FailureReason, PipelineReport, PipelineState, Stage, StageTimings,
};
pub use pipeline::extract::{Extraction, ExtractionStats, Extractor};
pub use pipeline::normalize::normalize;
pub use pipeline::summarize::{GenerationParams, SpecialTokens, Summarizer, SummaryBackend};
pub use process::{inspect, summarize_pdf, Pipeline, SummarizerLoader};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
