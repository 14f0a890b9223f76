//! Output types for a pipeline run.

use crate::error::ErrorKind;
use crate::pipeline::extract::ExtractionStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The three stages a run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Normalize,
    Summarize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => f.write_str("extract"),
            Stage::Normalize => f.write_str("normalize"),
            Stage::Summarize => f.write_str("summarize"),
        }
    }
}

/// Why a run ended without a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Extraction or normalisation produced empty text.
    NoText,
    /// The summariser produced an empty string.
    NoSummary,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoText => f.write_str("no text extracted"),
            FailureReason::NoSummary => f.write_str("no summary produced"),
        }
    }
}

/// Where a pipeline is in its lifecycle.
///
/// `Done` and `Failed` are terminal for a run; the next `run` starts over
/// from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Extracting,
    Normalizing,
    Summarizing,
    Done,
    Failed(FailureReason),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

/// Wall-clock time spent per stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub extract_ms: u64,
    pub normalize_ms: u64,
    /// Includes model loading on the first run.
    pub summarize_ms: u64,
    pub total_ms: u64,
}

/// Everything a run produced.
///
/// Stage outputs that were never reached are empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub state: PipelineState,
    pub raw_text: String,
    pub normalized_text: String,
    pub summary: String,
    /// The underlying error, if a stage broke rather than finding nothing.
    pub failure: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub extraction: ExtractionStats,
    pub timings: StageTimings,
}

impl PipelineReport {
    pub(crate) fn new(input: PathBuf) -> Self {
        Self {
            input,
            state: PipelineState::Idle,
            raw_text: String::new(),
            normalized_text: String::new(),
            summary: String::new(),
            failure: None,
            error_kind: None,
            extraction: ExtractionStats::default(),
            timings: StageTimings::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Done
    }
}

/// Metadata extracted from the PDF document information dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serialises_snake_case() {
        assert_eq!(
            serde_json::to_string(&PipelineState::Summarizing).unwrap(),
            "\"summarizing\""
        );
        assert_eq!(
            serde_json::to_string(&PipelineState::Failed(FailureReason::NoText)).unwrap(),
            r#"{"failed":"no_text"}"#
        );
    }

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed(FailureReason::NoSummary).is_terminal());
        assert!(!PipelineState::Extracting.is_terminal());
        assert!(!PipelineState::default().is_terminal());
    }

    #[test]
    fn fresh_report_is_idle_and_empty() {
        let r = PipelineReport::new(PathBuf::from("a.pdf"));
        assert_eq!(r.state, PipelineState::Idle);
        assert!(!r.is_success());
        assert!(r.raw_text.is_empty() && r.summary.is_empty());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["input"], "a.pdf");
        assert!(json["failure"].is_null());
    }
}
