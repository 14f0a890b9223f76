//! The document-to-summary pipeline.
//!
//! [`Pipeline`] sequences the three stages:
//!
//! ```text
//! Idle ─▶ Extracting ─▶ Normalizing ─▶ Summarizing ─▶ Done
//!             │              │               │
//!             └── empty ─────┴─▶ Failed(NoText)
//!                                            └── empty ─▶ Failed(NoSummary)
//! ```
//!
//! A stage that produces nothing ends the run; later stages never see empty
//! input. [`Pipeline::run`] never returns an error: stage errors are logged,
//! the stage output degrades to empty, and the error text is kept in
//! [`PipelineReport::failure`].
//!
//! The summariser is loaded on the first run that reaches the summarisation
//! stage and reused afterwards. A failed load is not cached, so the next run
//! tries again.

use crate::config::PipelineConfig;
use crate::error::PdfSumError;
use crate::output::{DocumentMetadata, FailureReason, PipelineReport, PipelineState, Stage};
use crate::pipeline::document::PdfiumSource;
use crate::pipeline::extract::Extractor;
use crate::pipeline::normalize::normalize;
use crate::pipeline::summarize::Summarizer;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Produces a [`Summarizer`] on first use.
pub type SummarizerLoader = Box<dyn FnMut() -> Result<Summarizer, PdfSumError> + Send>;

/// Extractor, normaliser, and (lazily) summariser wired together.
pub struct Pipeline {
    extractor: Extractor,
    loader: SummarizerLoader,
    summarizer: Option<Summarizer>,
    progress: ProgressCallback,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(extractor: Extractor, loader: SummarizerLoader) -> Self {
        Self {
            extractor,
            loader,
            summarizer: None,
            progress: Arc::new(NoopProgressCallback),
            state: PipelineState::Idle,
        }
    }

    /// pdfium + tesseract extraction and a pretrained model from the hub.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let model_config = config.clone();
        Self::new(
            Extractor::from_config(config),
            Box::new(move || Summarizer::from_pretrained(&model_config)),
        )
    }

    /// Use an already-loaded summariser instead of calling the loader.
    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// State reached by the most recent run (`Idle` before the first).
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_model_loaded(&self) -> bool {
        self.summarizer.is_some()
    }

    /// Run every stage on the PDF at `path`.
    pub fn run(&mut self, path: impl AsRef<Path>) -> PipelineReport {
        let path = path.as_ref();
        let total_start = Instant::now();
        let mut report = PipelineReport::new(path.to_path_buf());
        self.state = PipelineState::Idle;

        self.run_stages(path, &mut report);
        debug_assert!(self.state.is_terminal(), "run ended in {:?}", self.state);

        report.state = self.state;
        report.timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!("Pipeline finished in {}ms: {:?}", report.timings.total_ms, report.state);
        report
    }

    fn run_stages(&mut self, path: &Path, report: &mut PipelineReport) {
        // ── Stage 1: Extract ────────────────────────────────────────────
        self.enter(PipelineState::Extracting, Stage::Extract);
        let start = Instant::now();
        match self.extractor.try_extract(path) {
            Ok(extraction) => {
                report.raw_text = extraction.text;
                report.extraction = extraction.stats;
            }
            Err(e) => {
                error!("Error extracting text from PDF: {}", e);
                record_error(report, &e);
            }
        }
        report.timings.extract_ms = elapsed_ms(start);
        self.progress
            .on_stage_complete(Stage::Extract, report.raw_text.len(), report.timings.extract_ms);

        if report.raw_text.is_empty() {
            warn!("No text extracted from PDF.");
            return self.fail(FailureReason::NoText, report);
        }
        info!("Text extracted successfully.");
        self.progress.on_raw_text(&report.raw_text);

        // ── Stage 2: Normalize ──────────────────────────────────────────
        self.enter(PipelineState::Normalizing, Stage::Normalize);
        info!("Preprocessing text.");
        let start = Instant::now();
        report.normalized_text = normalize(&report.raw_text);
        report.timings.normalize_ms = elapsed_ms(start);
        self.progress.on_stage_complete(
            Stage::Normalize,
            report.normalized_text.len(),
            report.timings.normalize_ms,
        );

        if report.normalized_text.is_empty() {
            warn!("Text is empty after preprocessing.");
            return self.fail(FailureReason::NoText, report);
        }
        self.progress.on_normalized_text(&report.normalized_text);

        // ── Stage 3: Summarize ──────────────────────────────────────────
        self.enter(PipelineState::Summarizing, Stage::Summarize);
        info!("Summarizing text.");
        let start = Instant::now();
        match self.summarize(&report.normalized_text) {
            Ok(summary) => report.summary = summary,
            Err(e) => {
                error!("Error summarizing text: {}", e);
                record_error(report, &e);
            }
        }
        report.timings.summarize_ms = elapsed_ms(start);
        self.progress.on_stage_complete(
            Stage::Summarize,
            report.summary.len(),
            report.timings.summarize_ms,
        );

        if report.summary.is_empty() {
            error!("Failed to summarize text.");
            return self.fail(FailureReason::NoSummary, report);
        }
        info!("Text summarized successfully.");
        self.progress.on_summary(&report.summary);
        self.state = PipelineState::Done;
    }

    fn summarize(&mut self, text: &str) -> Result<String, PdfSumError> {
        let summarizer = match self.summarizer {
            Some(ref mut s) => s,
            None => {
                info!("Loading summarisation model");
                let loaded = (self.loader)()?;
                let beam = &loaded.params().beam;
                debug!(
                    "Model ready: {} beams, {}..={} new tokens",
                    beam.num_beams, beam.min_new_tokens, beam.max_new_tokens
                );
                self.summarizer.insert(loaded)
            }
        };
        summarizer.try_summarize(text)
    }

    fn enter(&mut self, state: PipelineState, stage: Stage) {
        debug!("Pipeline state: {:?} → {:?}", self.state, state);
        self.state = state;
        self.progress.on_stage_start(stage);
    }

    fn fail(&mut self, reason: FailureReason, report: &PipelineReport) {
        self.state = PipelineState::Failed(reason);
        self.progress.on_failure(reason, report.failure.as_deref());
    }

    /// Run the pipeline and write the summary to `output_path`.
    ///
    /// The file is written atomically (temp file + rename) and only when the
    /// run reached `Done`; a failed run returns `Ok` with the report and
    /// leaves `output_path` untouched. `Err` means the write itself failed.
    pub fn summarize_to_file(
        &mut self,
        input: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<PipelineReport, PdfSumError> {
        let report = self.run(input);
        if report.is_success() {
            write_atomic(output_path.as_ref(), &report.summary)?;
            info!("Summary written to {}", output_path.as_ref().display());
        }
        Ok(report)
    }
}

fn record_error(report: &mut PipelineReport, e: &PdfSumError) {
    report.failure = Some(e.to_string());
    report.error_kind = Some(e.kind());
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), PdfSumError> {
    let write_err = |source: std::io::Error| PdfSumError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    let mut body = contents.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    std::fs::write(&tmp_path, body).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        write_err(e)
    })
}

/// Summarise one PDF with a freshly loaded model.
///
/// Convenience for one-shot use; keep a [`Pipeline`] around to reuse the
/// model across documents.
pub fn summarize_pdf(path: impl AsRef<Path>, config: &PipelineConfig) -> PipelineReport {
    Pipeline::from_config(config).run(path)
}

/// Read PDF metadata without extracting content.
///
/// Does not touch the OCR engine or the model.
pub fn inspect(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<DocumentMetadata, PdfSumError> {
    PdfiumSource::from_config(config).metadata(path.as_ref())
}
