//! Input validation: check a user-supplied path before pdfium sees it.
//!
//! pdfium reports every open failure as an opaque "format error". Checking
//! existence, read permission, and the `%PDF` magic bytes up front lets the
//! caller tell a typo from a permissions problem from a non-PDF file.

use crate::error::PdfSumError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` names a readable file starting with `%PDF`.
pub fn validate_pdf_path(path: &Path) -> Result<PathBuf, PdfSumError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(PdfSumError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic != b"%PDF" => {
                    return Err(PdfSumError::NotAPdf { path, magic });
                }
                Ok(()) => {}
                // Shorter than four bytes: cannot be a PDF.
                Err(_) => return Err(PdfSumError::NotAPdf { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfSumError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PdfSumError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = validate_pdf_path(Path::new("/definitely/not/a/real/file.pdf")).unwrap_err();
        assert!(matches!(err, PdfSumError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_pdf_path(dir.path()).unwrap_err();
        assert!(matches!(err, PdfSumError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_not_a_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04 zip archive").unwrap();
        match validate_pdf_path(f.path()).unwrap_err() {
            PdfSumError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tiny_file_is_not_a_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            validate_pdf_path(f.path()).unwrap_err(),
            PdfSumError::NotAPdf { .. }
        ));
    }

    #[test]
    fn pdf_magic_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n").unwrap();
        let p = validate_pdf_path(f.path()).unwrap();
        assert_eq!(p, f.path());
    }
}
