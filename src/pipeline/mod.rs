//! Pipeline stages for PDF summarisation.
//!
//! Each submodule implements one step. The stages meet at traits
//! ([`document::DocumentSource`], [`ocr::OcrEngine`],
//! [`summarize::SummaryBackend`]) so each can be tested with fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ extract ──▶ normalize ──▶ summarize
//! (path)    (pdfium)     (+ ocr)     (regex)       (t5 + beam)
//! ```
//!
//! 1. [`input`]    : check the path exists, is readable, and starts with `%PDF`
//! 2. [`document`] : walk pages through pdfium, yielding text and images
//! 3. [`ocr`]      : recognise text in each image with the tesseract CLI
//! 4. [`extract`]  : concatenate page text and OCR output in page order
//! 5. [`normalize`]: collapse whitespace and drop non-ASCII runs
//! 6. [`summarize`]: tokenise, truncate, and run [`beam`] search over a
//!    [`t5`] model

pub mod beam;
pub mod document;
pub mod extract;
pub mod input;
pub mod normalize;
pub mod ocr;
pub mod summarize;
pub mod t5;
