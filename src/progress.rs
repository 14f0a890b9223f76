//! Progress-callback trait for pipeline stage events.
//!
//! Install an [`Arc<dyn PipelineProgressCallback>`] with
//! [`crate::Pipeline::with_progress`] to be told when each stage starts and
//! finishes, and to receive each stage's output as soon as it exists.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsum::{PipelineProgressCallback, Stage};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct StageLog(Mutex<Vec<String>>);
//!
//! impl PipelineProgressCallback for StageLog {
//!     fn on_stage_start(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(format!("{stage} started"));
//!     }
//! }
//!
//! let log = StageLog::default();
//! log.on_stage_start(Stage::Extract);
//! assert_eq!(log.0.lock().unwrap()[0], "extract started");
//! ```

use crate::output::{FailureReason, Stage};
use std::sync::Arc;

/// Called by [`crate::Pipeline::run`] as it moves between stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls arrive on the thread running the pipeline,
/// in stage order.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called just before a stage runs.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage returns, whatever it produced.
    ///
    /// # Arguments
    /// * `stage`: the stage that finished
    /// * `output_len`: byte length of the stage output (0 when empty)
    /// * `elapsed_ms`: wall-clock time spent in the stage
    fn on_stage_complete(&self, stage: Stage, output_len: usize, elapsed_ms: u64) {
        let _ = (stage, output_len, elapsed_ms);
    }

    /// The extracted text, delivered only when non-empty.
    fn on_raw_text(&self, text: &str) {
        let _ = text;
    }

    /// The normalised text, delivered only when non-empty.
    fn on_normalized_text(&self, text: &str) {
        let _ = text;
    }

    /// The final summary.
    fn on_summary(&self, summary: &str) {
        let _ = summary;
    }

    /// The run ended without a summary. `detail` carries the error message
    /// when a stage broke rather than legitimately finding nothing.
    fn on_failure(&self, reason: FailureReason, detail: Option<&str>) {
        let _ = (reason, detail);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type stored in [`crate::Pipeline`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }

        fn on_stage_complete(&self, stage: Stage, output_len: usize, _elapsed_ms: u64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done:{stage}:{output_len}"));
        }

        fn on_failure(&self, reason: FailureReason, _detail: Option<&str>) {
            self.events.lock().unwrap().push(format!("fail:{reason}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Extract);
        cb.on_stage_complete(Stage::Extract, 10, 5);
        cb.on_raw_text("raw");
        cb.on_normalized_text("norm");
        cb.on_summary("sum");
        cb.on_failure(FailureReason::NoText, Some("boom"));
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_stage_start(Stage::Normalize);
        rec.on_stage_complete(Stage::Normalize, 42, 1);
        rec.on_summary("ignored by default impl");
        rec.on_failure(FailureReason::NoSummary, None);
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec![
                "start:normalize",
                "done:normalize:42",
                "fail:no summary produced"
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Summarize);
        cb.on_summary("done");
    }
}
