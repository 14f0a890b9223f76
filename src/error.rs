//! Error types for the edgequake-pdfsum library.
//!
//! Every failure the pipeline can hit is a variant of [`PdfSumError`]. The
//! variants fall into four stage-level classes reported by
//! [`PdfSumError::kind`]:
//!
//! * [`ErrorKind::DocumentOpen`]: the file is missing, unreadable, not a PDF,
//!   encrypted, or pdfium itself could not be loaded.
//! * [`ErrorKind::Extraction`]: an embedded image could not be decoded or the
//!   OCR engine failed on it.
//! * [`ErrorKind::ModelLoad`]: the tokenizer or model weights could not be
//!   fetched or initialised.
//! * [`ErrorKind::Generation`]: encoding, beam search, or decoding failed.
//!
//! Stages never let these cross a stage boundary: the orchestrator keeps the
//! error as a string in [`crate::output::PipelineReport::failure`] and
//! degrades the stage output to empty.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the edgequake-pdfsum library.
#[derive(Debug, Error)]
pub enum PdfSumError {
    // ── Document open errors ──────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium and either put it on the system library path or point\n\
--pdfium-dir / PDFSUM_PDFIUM_DIR at the directory that contains it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A page's text layer could not be read.
    #[error("Text extraction failed for page {page}: {detail}")]
    PageTextFailed { page: usize, detail: String },

    /// An embedded image could not be decoded into a bitmap.
    #[error("Image {image} on page {page} could not be decoded: {detail}")]
    ImageDecode {
        page: usize,
        image: usize,
        detail: String,
    },

    /// The OCR engine ran but reported failure for an image.
    #[error("OCR failed for image {image} on page {page}: {detail}")]
    OcrFailed {
        page: usize,
        image: usize,
        detail: String,
    },

    /// The OCR executable could not be started at all.
    #[error("OCR engine '{command}' could not be started: {detail}\nSet --tesseract-cmd / TESSERACT_CMD to the tesseract executable.")]
    OcrEngineUnavailable { command: PathBuf, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// Tokenizer, config, or weights failed to load.
    #[error("Failed to load summarisation model '{model_id}': {detail}")]
    ModelLoad { model_id: String, detail: String },

    /// Tokenisation, beam search, or decoding failed.
    #[error("Summary generation failed: {0}")]
    Generation(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The JSON configuration file could not be read or parsed.
    #[error("Failed to read configuration '{path}': {detail}")]
    ConfigRead { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the summary output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stage-level classification of a [`PdfSumError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DocumentOpen,
    Extraction,
    ModelLoad,
    Generation,
    Config,
    Io,
}

impl PdfSumError {
    /// Which stage-level class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfSumError::FileNotFound { .. }
            | PdfSumError::PermissionDenied { .. }
            | PdfSumError::NotAPdf { .. }
            | PdfSumError::CorruptPdf { .. }
            | PdfSumError::PasswordRequired { .. }
            | PdfSumError::WrongPassword { .. }
            | PdfSumError::PdfiumBindingFailed(_) => ErrorKind::DocumentOpen,
            PdfSumError::PageTextFailed { .. }
            | PdfSumError::ImageDecode { .. }
            | PdfSumError::OcrFailed { .. }
            | PdfSumError::OcrEngineUnavailable { .. } => ErrorKind::Extraction,
            PdfSumError::ModelLoad { .. } => ErrorKind::ModelLoad,
            PdfSumError::Generation(_) => ErrorKind::Generation,
            PdfSumError::InvalidConfig(_) | PdfSumError::ConfigRead { .. } => ErrorKind::Config,
            PdfSumError::OutputWriteFailed { .. } => ErrorKind::Io,
        }
    }
}

impl From<candle_core::Error> for PdfSumError {
    fn from(e: candle_core::Error) -> Self {
        PdfSumError::Generation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_classified_as_document_open() {
        let e = PdfSumError::FileNotFound {
            path: PathBuf::from("/nope.pdf"),
        };
        assert_eq!(e.kind(), ErrorKind::DocumentOpen);
        assert!(e.to_string().contains("/nope.pdf"));

        let e = PdfSumError::PdfiumBindingFailed("dlopen failed".into());
        assert_eq!(e.kind(), ErrorKind::DocumentOpen);
    }

    #[test]
    fn ocr_failed_display() {
        let e = PdfSumError::OcrFailed {
            page: 2,
            image: 1,
            detail: "exit status 1".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Extraction);
        let msg = e.to_string();
        assert!(msg.contains("page 2"), "got: {msg}");
        assert!(msg.contains("image 1"), "got: {msg}");
    }

    #[test]
    fn engine_unavailable_mentions_command() {
        let e = PdfSumError::OcrEngineUnavailable {
            command: PathBuf::from("/opt/tess/bin/tesseract"),
            detail: "No such file or directory".into(),
        };
        assert!(e.to_string().contains("/opt/tess/bin/tesseract"));
        assert_eq!(e.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn model_errors_classified() {
        let e = PdfSumError::ModelLoad {
            model_id: "google-t5/t5-small".into(),
            detail: "offline".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ModelLoad);
        assert!(e.to_string().contains("google-t5/t5-small"));

        let e = PdfSumError::Generation("shape mismatch".into());
        assert_eq!(e.kind(), ErrorKind::Generation);
    }

    #[test]
    fn error_kind_serialises_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DocumentOpen).unwrap();
        assert_eq!(json, "\"document_open\"");
    }
}
