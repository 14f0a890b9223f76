//! Configuration types for PDF summarisation.
//!
//! Every knob of the pipeline lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`] or loaded from a JSON file with
//! [`PipelineConfig::from_json_file`]. The JSON form accepts any subset of
//! fields; missing ones take their defaults, so the minimal file
//!
//! ```json
//! { "tesseract_cmd": "/usr/bin/tesseract" }
//! ```
//!
//! is valid.

use crate::error::PdfSumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default checkpoint for the summarisation model.
pub const DEFAULT_MODEL_ID: &str = "google-t5/t5-small";

/// Configuration for one summarisation pipeline.
///
/// # Example
/// ```rust
/// use edgequake_pdfsum::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .tesseract_cmd("/usr/local/bin/tesseract")
///     .num_beams(4)
///     .max_summary_tokens(150)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Path or name of the tesseract executable. Default: `tesseract` (resolved via `PATH`).
    pub tesseract_cmd: PathBuf,

    /// Language code handed to the OCR engine. Default: `eng`.
    pub ocr_language: String,

    /// Directory containing the pdfium shared library.
    /// If None, pdfium is loaded from the system library path.
    pub pdfium_dir: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// What to do when a single embedded image fails to decode or OCR.
    /// Default: [`ImageFailurePolicy::Abort`].
    pub image_failure_policy: ImageFailurePolicy,

    /// Hugging Face model id of the sequence-to-sequence checkpoint.
    pub model_id: String,

    /// Model revision (branch, tag, or commit). Default: `main`.
    pub model_revision: String,

    /// Override for the Hugging Face hub cache directory.
    pub model_cache_dir: Option<PathBuf>,

    /// Task prefix prepended to the input before tokenisation. Default: `"summarize: "`.
    pub input_prefix: String,

    /// Compute device for inference. Default: [`ComputeDevice::Auto`].
    pub device: ComputeDevice,

    /// Maximum number of input tokens fed to the encoder. Default: 1024.
    ///
    /// Longer documents lose their trailing content; there is no chunking.
    pub max_input_tokens: usize,

    /// Beam width for generation. Default: 4.
    pub num_beams: usize,

    /// Maximum number of generated summary tokens. Default: 150.
    pub max_summary_tokens: usize,

    /// Minimum number of generated tokens before end-of-sequence is allowed. Default: 30.
    pub min_summary_tokens: usize,

    /// Stop as soon as `num_beams` hypotheses have finished. Default: true.
    pub early_stopping: bool,

    /// Exponent applied to hypothesis length when ranking finished beams. Default: 2.0.
    pub length_penalty: f32,

    /// Forbid repeating any n-gram of this size; 0 disables. Default: 3.
    pub no_repeat_ngram_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: PathBuf::from("tesseract"),
            ocr_language: "eng".to_string(),
            pdfium_dir: None,
            password: None,
            pages: PageSelection::default(),
            image_failure_policy: ImageFailurePolicy::default(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_revision: "main".to_string(),
            model_cache_dir: None,
            input_prefix: "summarize: ".to_string(),
            device: ComputeDevice::default(),
            max_input_tokens: 1024,
            num_beams: 4,
            max_summary_tokens: 150,
            min_summary_tokens: 30,
            early_stopping: true,
            length_penalty: 2.0,
            no_repeat_ngram_size: 3,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// A builder seeded with this configuration, for layering overrides.
    pub fn to_builder(&self) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: self.clone(),
        }
    }

    /// Load a configuration from a JSON file.
    ///
    /// Unknown keys are rejected so typos surface instead of being ignored.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PdfSumError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| PdfSumError::ConfigRead {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let config: PipelineConfig =
            serde_json::from_str(&raw).map_err(|e| PdfSumError::ConfigRead {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), PdfSumError> {
        if self.num_beams == 0 {
            return Err(PdfSumError::InvalidConfig("num_beams must be ≥ 1".into()));
        }
        if self.max_input_tokens < 2 {
            return Err(PdfSumError::InvalidConfig(format!(
                "max_input_tokens must be ≥ 2, got {}",
                self.max_input_tokens
            )));
        }
        if self.max_summary_tokens == 0 {
            return Err(PdfSumError::InvalidConfig(
                "max_summary_tokens must be ≥ 1".into(),
            ));
        }
        if self.min_summary_tokens > self.max_summary_tokens {
            return Err(PdfSumError::InvalidConfig(format!(
                "min_summary_tokens ({}) exceeds max_summary_tokens ({})",
                self.min_summary_tokens, self.max_summary_tokens
            )));
        }
        if self.tesseract_cmd.as_os_str().is_empty() {
            return Err(PdfSumError::InvalidConfig(
                "tesseract_cmd must not be empty".into(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(PdfSumError::InvalidConfig("model_id must not be empty".into()));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn pdfium_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_dir = Some(dir.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn image_failure_policy(mut self, policy: ImageFailurePolicy) -> Self {
        self.config.image_failure_policy = policy;
        self
    }

    pub fn model_id(mut self, id: impl Into<String>) -> Self {
        self.config.model_id = id.into();
        self
    }

    pub fn model_revision(mut self, rev: impl Into<String>) -> Self {
        self.config.model_revision = rev.into();
        self
    }

    pub fn model_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.model_cache_dir = Some(dir.into());
        self
    }

    pub fn input_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.input_prefix = prefix.into();
        self
    }

    pub fn device(mut self, device: ComputeDevice) -> Self {
        self.config.device = device;
        self
    }

    pub fn max_input_tokens(mut self, n: usize) -> Self {
        self.config.max_input_tokens = n.max(2);
        self
    }

    pub fn num_beams(mut self, n: usize) -> Self {
        self.config.num_beams = n.max(1);
        self
    }

    pub fn max_summary_tokens(mut self, n: usize) -> Self {
        self.config.max_summary_tokens = n.max(1);
        self
    }

    pub fn min_summary_tokens(mut self, n: usize) -> Self {
        self.config.min_summary_tokens = n;
        self
    }

    pub fn early_stopping(mut self, v: bool) -> Self {
        self.config.early_stopping = v;
        self
    }

    pub fn length_penalty(mut self, p: f32) -> Self {
        self.config.length_penalty = p;
        self
    }

    pub fn no_repeat_ngram_size(mut self, n: usize) -> Self {
        self.config.no_repeat_ngram_size = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PdfSumError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How extraction reacts to one broken embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFailurePolicy {
    /// Any image failure discards the whole document's text. (default)
    #[default]
    Abort,
    /// Log the failing image and continue with the rest of the document.
    Skip,
}

/// Where model inference runs.
///
/// Resolved once when the model is loaded; the generation loop never
/// re-checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// First CUDA device when compiled with `cuda` and one is present, else CPU. (default)
    #[default]
    Auto,
    /// Always CPU.
    Cpu,
    /// A specific CUDA ordinal.
    Cuda(usize),
}

impl FromStr for ComputeDevice {
    type Err = PdfSumError;

    /// Accepts `auto`, `cpu`, `cuda`, or `cuda:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "auto" => Ok(ComputeDevice::Auto),
            "cpu" => Ok(ComputeDevice::Cpu),
            "cuda" | "gpu" => Ok(ComputeDevice::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|n| n.parse().ok())
                .map(ComputeDevice::Cuda)
                .ok_or_else(|| {
                    PdfSumError::InvalidConfig(format!(
                        "unknown device '{other}' (expected auto, cpu, cuda or cuda:N)"
                    ))
                }),
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Auto => f.write_str("auto"),
            ComputeDevice::Cpu => f.write_str("cpu"),
            ComputeDevice::Cuda(n) => write!(f, "cuda:{n}"),
        }
    }
}

/// Specifies which pages of the PDF to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) if (1..=total_pages).contains(p) => vec![p - 1],
            PageSelection::Single(_) => vec![],
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Whether the 0-indexed page is part of the selection.
    pub fn contains(&self, index: usize, total_pages: usize) -> bool {
        match self {
            PageSelection::All => index < total_pages,
            _ => self.to_indices(total_pages).binary_search(&index).is_ok(),
        }
    }
}

impl FromStr for PageSelection {
    type Err = PdfSumError;

    /// Parse `all`, `5`, `3-15`, or `1,3,5,7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let parse = |p: &str| -> Result<usize, PdfSumError> {
            let n: usize = p.trim().parse().map_err(|_| {
                PdfSumError::InvalidConfig(format!("invalid page number: '{}'", p.trim()))
            })?;
            if n < 1 {
                return Err(PdfSumError::InvalidConfig(format!(
                    "pages are 1-indexed, minimum is 1 (got {n})"
                )));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(PdfSumError::InvalidConfig(format!(
                    "invalid page range '{start}-{end}': start must be <= end"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            let pages = s.split(',').map(parse).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        Ok(PageSelection::Single(parse(&s)?))
    }
}
