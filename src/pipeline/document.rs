//! Document access: pages, their native text, and their embedded images.
//!
//! [`DocumentSource`] is the seam between the extractor and the PDF engine.
//! The production implementation, [`PdfiumSource`], walks pages through
//! pdfium; tests substitute an in-memory source.
//!
//! Pages are handed to a visitor one at a time so only a single page's
//! decoded images are resident at once. The pdfium document handle is
//! dropped when `visit_pages` returns, whether it succeeded or not.

use crate::config::{PageSelection, PipelineConfig};
use crate::error::PdfSumError;
use crate::output::DocumentMetadata;
use crate::pipeline::input::validate_pdf_path;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One page as seen by the extractor.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-indexed page number.
    pub number: usize,
    /// Native text layer, line-terminated.
    pub text: String,
    /// Embedded raster images in the order the page declares them.
    pub images: Vec<EmbeddedImage>,
}

/// An image embedded in a page.
#[derive(Debug, Clone)]
pub enum EmbeddedImage {
    /// Encoded bytes as stored in the file; `format` is guessed when None.
    Encoded {
        bytes: Vec<u8>,
        format: Option<ImageFormat>,
    },
    /// Already rasterised by the PDF engine.
    Bitmap(DynamicImage),
    /// The engine found an image object but could not read its pixels.
    Unreadable { detail: String },
}

impl EmbeddedImage {
    /// Rasterise the image for OCR.
    ///
    /// The error is a human-readable detail; the caller attaches page and
    /// image coordinates.
    pub fn to_bitmap(&self) -> Result<DynamicImage, String> {
        match self {
            EmbeddedImage::Encoded {
                bytes,
                format: Some(fmt),
            } => image::load_from_memory_with_format(bytes, *fmt).map_err(|e| e.to_string()),
            EmbeddedImage::Encoded { bytes, format: None } => {
                image::load_from_memory(bytes).map_err(|e| e.to_string())
            }
            EmbeddedImage::Bitmap(img) => Ok(img.clone()),
            EmbeddedImage::Unreadable { detail } => Err(detail.clone()),
        }
    }
}

/// A page object reduced to what OCR needs.
#[derive(Debug)]
enum DrawnObject {
    Image(EmbeddedImage),
    /// A form XObject and the objects it draws, in declaration order.
    Form(Vec<DrawnObject>),
    Other,
}

impl DrawnObject {
    fn from_pdfium(object: &PdfPageObject<'_>) -> Self {
        if let Some(image) = object.as_image_object() {
            return DrawnObject::Image(match image.get_raw_image() {
                Ok(bitmap) => EmbeddedImage::Bitmap(bitmap),
                Err(e) => EmbeddedImage::Unreadable {
                    detail: format!("{:?}", e),
                },
            });
        }
        let Some(form) = object.as_x_object_form_object() else {
            return DrawnObject::Other;
        };
        let mut children = Vec::with_capacity(form.len());
        for index in 0..form.len() {
            match form.get(index) {
                Ok(child) => children.push(DrawnObject::from_pdfium(&child)),
                Err(e) => debug!("Skipping form object {}: {:?}", index, e),
            }
        }
        DrawnObject::Form(children)
    }
}

/// Images in drawing order, including those nested inside forms.
fn flatten_images(objects: Vec<DrawnObject>) -> Vec<EmbeddedImage> {
    let mut images = Vec::new();
    let mut stack: Vec<_> = objects.into_iter().rev().collect();
    while let Some(object) = stack.pop() {
        match object {
            DrawnObject::Image(image) => images.push(image),
            DrawnObject::Form(children) => stack.extend(children.into_iter().rev()),
            DrawnObject::Other => {}
        }
    }
    images
}

/// A paginated document that can be walked page by page.
pub trait DocumentSource {
    /// Open the document at `path` and call `visit` for each selected page, in
    /// page order. Returns the total page count of the document.
    ///
    /// An error from `visit` stops the walk and is returned unchanged.
    fn visit_pages(
        &self,
        path: &Path,
        pages: &PageSelection,
        visit: &mut dyn FnMut(Page) -> Result<(), PdfSumError>,
    ) -> Result<usize, PdfSumError>;
}

/// [`DocumentSource`] backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumSource {
    library_dir: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumSource {
    pub fn new(library_dir: Option<PathBuf>, password: Option<String>) -> Self {
        Self {
            library_dir,
            password,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.pdfium_dir.clone(), config.password.clone())
    }

    /// Bind to pdfium, preferring the configured directory over the system path.
    fn bind(&self) -> Result<Pdfium, PdfSumError> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfSumError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    fn open<'a>(&'a self, pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, PdfSumError> {
        let password = self.password.as_deref();
        pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    PdfSumError::WrongPassword {
                        path: path.to_path_buf(),
                    }
                } else {
                    PdfSumError::PasswordRequired {
                        path: path.to_path_buf(),
                    }
                }
            } else {
                PdfSumError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: err_str,
                }
            }
        })
    }

    /// Read document metadata without touching page content.
    pub fn metadata(&self, path: &Path) -> Result<DocumentMetadata, PdfSumError> {
        let path = validate_pdf_path(path)?;
        let pdfium = self.bind()?;
        let document = self.open(&pdfium, &path)?;

        let metadata = document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().trim().to_string();
                (!v.is_empty()).then_some(v)
            })
        };

        Ok(DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
            modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
            page_count: document.pages().len() as usize,
            pdf_version: format!("{:?}", document.version()),
        })
    }
}

impl DocumentSource for PdfiumSource {
    fn visit_pages(
        &self,
        path: &Path,
        pages: &PageSelection,
        visit: &mut dyn FnMut(Page) -> Result<(), PdfSumError>,
    ) -> Result<usize, PdfSumError> {
        let path = validate_pdf_path(path)?;
        let pdfium = self.bind()?;
        let document = self.open(&pdfium, &path)?;

        let total_pages = document.pages().len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        for (index, page) in document.pages().iter().enumerate() {
            if !pages.contains(index, total_pages) {
                continue;
            }
            let number = index + 1;

            let mut text = page
                .text()
                .map_err(|e| PdfSumError::PageTextFailed {
                    page: number,
                    detail: format!("{:?}", e),
                })?
                .all();
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }

            let objects = page.objects().iter().map(|o| DrawnObject::from_pdfium(&o)).collect();
            let images = flatten_images(objects);

            debug!(
                "Page {}: {} chars of text, {} images",
                number,
                text.len(),
                images.len()
            );

            visit(Page {
                number,
                text,
                images,
            })?;
        }

        Ok(total_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn encoded_png_decodes_with_and_without_format() {
        let bytes = png_bytes();
        let guessed = EmbeddedImage::Encoded {
            bytes: bytes.clone(),
            format: None,
        };
        let explicit = EmbeddedImage::Encoded {
            bytes,
            format: Some(ImageFormat::Png),
        };
        for img in [guessed, explicit] {
            let bitmap = img.to_bitmap().expect("valid png");
            assert_eq!((bitmap.width(), bitmap.height()), (4, 3));
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let img = EmbeddedImage::Encoded {
            bytes: b"definitely not an image".to_vec(),
            format: None,
        };
        assert!(img.to_bitmap().is_err());
    }

    #[test]
    fn unreadable_reports_detail() {
        let img = EmbeddedImage::Unreadable {
            detail: "JBIG2 not supported".into(),
        };
        assert_eq!(img.to_bitmap().unwrap_err(), "JBIG2 not supported");
    }

    fn sized(width: u32) -> DrawnObject {
        DrawnObject::Image(EmbeddedImage::Bitmap(DynamicImage::new_luma8(width, 1)))
    }

    #[test]
    fn images_inside_forms_kept_in_drawing_order() {
        let objects = vec![
            sized(1),
            DrawnObject::Other,
            DrawnObject::Form(vec![
                DrawnObject::Other,
                sized(2),
                DrawnObject::Form(vec![sized(3)]),
            ]),
            DrawnObject::Form(vec![]),
            sized(4),
        ];
        let widths: Vec<u32> = flatten_images(objects)
            .iter()
            .map(|img| img.to_bitmap().unwrap().width())
            .collect();
        assert_eq!(widths, vec![1, 2, 3, 4]);
    }

    #[test]
    fn missing_file_reported_before_binding() {
        let source = PdfiumSource::default();
        let err = source
            .visit_pages(
                Path::new("/definitely/not/a/real/file.pdf"),
                &PageSelection::All,
                &mut |_| Ok(()),
            )
            .unwrap_err();
        assert!(matches!(err, PdfSumError::FileNotFound { .. }));
    }

    #[test]
    fn missing_pdfium_dir_fails_to_bind() {
        let dir = tempfile::tempdir().unwrap();
        let source = PdfiumSource::new(Some(dir.path().to_path_buf()), None);
        assert!(matches!(
            source.bind(),
            Err(PdfSumError::PdfiumBindingFailed(_))
        ));
    }
}
