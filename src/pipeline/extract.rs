//! Document extraction: native page text plus OCR of every embedded image.
//!
//! For each selected page, in order, the page's own text is appended first,
//! followed by the OCR output of each of its images in declaration order.
//! Segments are concatenated as-is; no separator is injected.
//!
//! Failure handling follows [`ImageFailurePolicy`]: under `Abort` any error
//! (open, decode, OCR) discards the document and [`Extractor::extract`]
//! returns an empty string; under `Skip` a failing image is logged and
//! dropped while open errors still empty the result.

use crate::config::{ImageFailurePolicy, PageSelection, PipelineConfig};
use crate::error::PdfSumError;
use crate::pipeline::document::{DocumentSource, Page, PdfiumSource};
use crate::pipeline::ocr::{OcrEngine, TesseractCli};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

/// Counters describing one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Total pages in the document.
    pub total_pages: usize,
    /// Pages that were actually walked (after page selection).
    pub pages_visited: usize,
    /// Images that went through OCR successfully.
    pub images_recognized: usize,
    /// Images dropped under [`ImageFailurePolicy::Skip`].
    pub images_skipped: usize,
}

/// The raw text of a document and how it was obtained.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text: String,
    pub stats: ExtractionStats,
}

/// Turns a document path into raw text.
pub struct Extractor {
    source: Box<dyn DocumentSource + Send>,
    ocr: Box<dyn OcrEngine + Send>,
    pages: PageSelection,
    policy: ImageFailurePolicy,
}

impl Extractor {
    pub fn new(
        source: Box<dyn DocumentSource + Send>,
        ocr: Box<dyn OcrEngine + Send>,
    ) -> Self {
        Self {
            source,
            ocr,
            pages: PageSelection::All,
            policy: ImageFailurePolicy::Abort,
        }
    }

    /// pdfium for documents, tesseract for images.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Box::new(PdfiumSource::from_config(config)),
            Box::new(TesseractCli::from_config(config)),
        )
        .with_pages(config.pages.clone())
        .with_image_failure_policy(config.image_failure_policy)
    }

    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_image_failure_policy(mut self, policy: ImageFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Extract text, or an empty string if anything went wrong.
    ///
    /// The cause is logged at `error` level; use [`Extractor::try_extract`]
    /// to get it as a value.
    pub fn extract(&self, path: impl AsRef<Path>) -> String {
        match self.try_extract(path.as_ref()) {
            Ok(extraction) => extraction.text,
            Err(e) => {
                error!("Error extracting text from PDF: {}", e);
                String::new()
            }
        }
    }

    /// Extract text, returning the first fatal error.
    pub fn try_extract(&self, path: &Path) -> Result<Extraction, PdfSumError> {
        info!("Extracting text from PDF: {}", path.display());

        let mut text = String::new();
        let mut stats = ExtractionStats::default();

        let total_pages = self.source.visit_pages(path, &self.pages, &mut |page| {
            stats.pages_visited += 1;
            self.append_page(page, &mut text, &mut stats)
        })?;
        stats.total_pages = total_pages;

        info!(
            "Extracted {} chars from {}/{} pages ({} images recognised, {} skipped)",
            text.len(),
            stats.pages_visited,
            stats.total_pages,
            stats.images_recognized,
            stats.images_skipped
        );
        Ok(Extraction { text, stats })
    }

    fn append_page(
        &self,
        page: Page,
        text: &mut String,
        stats: &mut ExtractionStats,
    ) -> Result<(), PdfSumError> {
        text.push_str(&page.text);

        for (i, image) in page.images.iter().enumerate() {
            let image_num = i + 1;
            let recognised = image
                .to_bitmap()
                .map_err(|detail| PdfSumError::ImageDecode {
                    page: page.number,
                    image: image_num,
                    detail,
                })
                .and_then(|bitmap| self.ocr.recognize(&bitmap, page.number, image_num));

            match recognised {
                Ok(ocr_text) => {
                    text.push_str(&ocr_text);
                    stats.images_recognized += 1;
                }
                // A missing engine fails every image the same way; skipping would hide it.
                Err(e @ PdfSumError::OcrEngineUnavailable { .. }) => return Err(e),
                Err(e) if self.policy == ImageFailurePolicy::Skip => {
                    warn!("Skipping image: {}", e);
                    stats.images_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
