//! Optical character recognition of embedded images.
//!
//! [`TesseractCli`] shells out to the `tesseract` executable rather than
//! linking libtesseract, so the only install-time requirement is a binary on
//! disk whose location can be configured. Images are written to a temporary
//! PNG (lossless, so glyph edges survive) and recognised text is read back
//! from stdout.

use crate::config::PipelineConfig;
use crate::error::PdfSumError;
use image::DynamicImage;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Recognises text in a rasterised image.
pub trait OcrEngine {
    /// Return the recognised text, possibly empty.
    ///
    /// `page` and `image` are 1-indexed coordinates used only for error reporting.
    fn recognize(&self, bitmap: &DynamicImage, page: usize, image: usize)
        -> Result<String, PdfSumError>;
}

/// OCR through the tesseract command-line program.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: PathBuf,
    language: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.tesseract_cmd.clone(), config.ocr_language.clone())
    }

    /// Check the executable can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// PNG-encode a bitmap.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

impl OcrEngine for TesseractCli {
    fn recognize(
        &self,
        bitmap: &DynamicImage,
        page: usize,
        image: usize,
    ) -> Result<String, PdfSumError> {
        let ocr_failed = |detail: String| PdfSumError::OcrFailed {
            page,
            image,
            detail,
        };

        let png = encode_png(bitmap).map_err(|e| ocr_failed(format!("PNG encoding: {e}")))?;

        let mut input = tempfile::Builder::new()
            .prefix("pdfsum-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ocr_failed(format!("temp file: {e}")))?;
        input
            .write_all(&png)
            .and_then(|_| input.flush())
            .map_err(|e| ocr_failed(format!("temp file: {e}")))?;

        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| PdfSumError::OcrEngineUnavailable {
                command: self.command.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ocr_failed(format!("{}: {}", output.status, stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR page {} image {}: {} chars", page, image, text.len());
        Ok(text)
    }
}
