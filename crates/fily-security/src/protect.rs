// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Password protection for finished PDFs using the standard security handler
// (revision 3, 128-bit RC4).
//
// The protected document is serialised into a temporary file in the same
// directory and renamed over the original, so a failure at any step leaves
// the unprotected file untouched and never a half-written one.

use std::io::Write;
use std::path::Path;

use fily_core::error::{FilyError, Result};
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Document, Object, StringFormat};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::integrity::digest_bytes;

/// RC4 key length in bits.
const KEY_LENGTH: usize = 128;

/// Applies a user password to PDF files in place.
pub struct PasswordProtector {
    password: String,
}

impl PasswordProtector {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    /// Encrypt the PDF at `path` and atomically replace it.
    ///
    /// The same password is used as both user and owner password, and all
    /// permissions are granted once the document is opened.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn protect(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.password.is_empty() {
            return Err(FilyError::EncryptionFailure("empty password".into()));
        }

        let original = std::fs::read(path)
            .map_err(|err| FilyError::EncryptionFailure(format!("cannot read PDF: {err}")))?;
        let mut document = Document::load_mem(&original)
            .map_err(|err| FilyError::EncryptionFailure(format!("cannot parse PDF: {err}")))?;

        if document.is_encrypted() {
            return Err(FilyError::EncryptionFailure("PDF is already encrypted".into()));
        }

        ensure_document_id(&mut document, &original);

        let version = EncryptionVersion::V2 {
            document: &document,
            owner_password: &self.password,
            user_password: &self.password,
            key_length: KEY_LENGTH,
            permissions: Permissions::all(),
        };
        let state = EncryptionState::try_from(version)
            .map_err(|err| FilyError::EncryptionFailure(format!("key derivation: {err}")))?;
        document
            .encrypt(&state)
            .map_err(|err| FilyError::EncryptionFailure(format!("encrypt: {err}")))?;

        replace_atomically(path, &mut document)?;

        info!(key_bits = KEY_LENGTH, "PDF password applied");
        Ok(())
    }
}

/// The key derivation mixes in the first `/ID` string; documents written
/// without one get an identifier derived from their unprotected content.
fn ensure_document_id(document: &mut Document, content: &[u8]) {
    if document.trailer.get(b"ID").is_ok() {
        return;
    }
    let digest = digest_bytes(content);
    let id = digest[..16].to_vec();
    document.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ]),
    );
    debug!("document /ID inserted");
}

fn replace_atomically(path: &Path, document: &mut Document) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|err| FilyError::EncryptionFailure(format!("temp file: {err}")))?;
    document
        .save_to(temp.as_file_mut())
        .map_err(|err| FilyError::EncryptionFailure(format!("serialise: {err}")))?;
    temp.as_file_mut()
        .flush()
        .map_err(|err| FilyError::EncryptionFailure(format!("flush: {err}")))?;
    temp.persist(path)
        .map_err(|err| FilyError::EncryptionFailure(format!("rename: {}", err.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Stream, dictionary};

    fn has_encrypt_entry(bytes: &[u8]) -> bool {
        bytes.windows(8).any(|w| w == b"/Encrypt")
    }

    fn write_sample_pdf(path: &Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal("confidential")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn protected_pdf_carries_encrypt_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        write_sample_pdf(&path);
        assert!(!has_encrypt_entry(&std::fs::read(&path).unwrap()));

        PasswordProtector::new("s3cret").protect(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(has_encrypt_entry(&bytes));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        write_sample_pdf(&path);

        PasswordProtector::new("pw").protect(&path).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn invalid_pdf_is_encryption_failure_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let err = PasswordProtector::new("pw").protect(&path).unwrap_err();
        assert_eq!(err.kind(), fily_core::ErrorKind::EncryptionFailure);
        assert_eq!(std::fs::read(&path).unwrap(), b"not a pdf at all");
    }

    #[test]
    fn empty_password_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        write_sample_pdf(&path);
        let before = std::fs::read(&path).unwrap();

        assert!(PasswordProtector::new("").protect(&path).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn document_id_added_when_missing() {
        let mut doc = Document::with_version("1.5");
        assert!(doc.trailer.get(b"ID").is_err());
        ensure_document_id(&mut doc, b"content");
        let id = doc.trailer.get(b"ID").unwrap().as_array().unwrap();
        assert_eq!(id.len(), 2);
    }
}
