// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF merge: concatenate the pages of several existing PDFs into one new
// document using the `lopdf` crate.
//
// Merging is lenient. Inputs that are missing, unreadable or locked are
// skipped with a warning, and the merge only fails when nothing at all could
// be contributed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use fily_core::error::{FilyError, Result};
use fily_core::types::BatchMergeSpec;
use lopdf::xref::XrefEntry;
use lopdf::{Dictionary, Document, Object, ObjectId, Reader, dictionary};
use tracing::{debug, info, instrument, warn};

use crate::output::write_atomically;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Summary of a completed merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Inputs that contributed at least one page, in output order.
    pub merged: Vec<PathBuf>,
    /// Inputs that were skipped.
    pub skipped: Vec<PathBuf>,
    /// Pages in the output document.
    pub pages: usize,
}

/// Merge the PDFs named by `spec` into `output`.
///
/// Fewer than two input paths is rejected up front. The output is written
/// atomically and only when at least one input contributed pages.
#[instrument(skip_all, fields(inputs = spec.ordered_paths.len(), output = %output.as_ref().display()))]
pub fn merge_pdfs(spec: &BatchMergeSpec, output: impl AsRef<Path>) -> Result<MergeReport> {
    if spec.ordered_paths.len() < 2 {
        return Err(FilyError::InvalidBatchInput(format!(
            "merge needs at least two PDFs, got {}",
            spec.ordered_paths.len()
        )));
    }

    let mut builder = MergeBuilder::new();
    let mut report = MergeReport::default();

    for path in spec.resolved_paths() {
        let password = spec.passwords.get(&path).map(String::as_str);
        match open_source(&path, password) {
            Ok(source) => {
                let added = builder.append_document(&source);
                if added == 0 {
                    warn!(path = %path.display(), "PDF has no pages, skipping");
                    report.skipped.push(path);
                } else {
                    debug!(path = %path.display(), pages = added, "PDF appended");
                    report.merged.push(path);
                }
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "skipping merge input");
                report.skipped.push(path);
            }
        }
    }

    if report.merged.is_empty() {
        return Err(FilyError::InvalidBatchInput(format!(
            "none of the {} inputs could be merged",
            spec.ordered_paths.len()
        )));
    }

    report.pages = builder.page_count();
    let bytes = builder.finish()?;
    write_atomically(output.as_ref(), &bytes)?;

    info!(
        merged = report.merged.len(),
        skipped = report.skipped.len(),
        pages = report.pages,
        "Merge complete"
    );
    Ok(report)
}

/// Load one merge input, unlocking it when a password was supplied.
fn open_source(path: &Path, password: Option<&str>) -> std::result::Result<Document, String> {
    if !path.is_file() {
        return Err("file not found".into());
    }
    let bytes = std::fs::read(path).map_err(|err| format!("cannot read: {err}"))?;
    let document = Document::load_mem(&bytes).map_err(|err| format!("unreadable PDF: {err}"))?;

    // lopdf already decrypted documents whose user password is empty.
    if !document.is_encrypted() || document.encryption_state.is_some() {
        return Ok(document);
    }
    let Some(password) = password else {
        return Err("encrypted and no password supplied".into());
    };
    document
        .authenticate_password(password)
        .map_err(|err| format!("password rejected: {err}"))?;
    unlock(&bytes, document, password).map_err(|err| format!("cannot decrypt: {err}"))
}

/// Parse the still-encrypted objects of a locked document, then decrypt them.
///
/// Loading a locked file keeps only its `/Encrypt` dictionary, so every other
/// object listed in the cross-reference table is read back from `bytes`.
fn unlock(bytes: &[u8], document: Document, password: &str) -> lopdf::Result<Document> {
    let start = bytes.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
    let reader = Reader {
        buffer: &bytes[start..],
        document,
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    };

    let mut objects = BTreeMap::new();
    for (&number, entry) in &reader.document.reference_table.entries {
        if let XrefEntry::Normal { generation, .. } = *entry {
            let id = (number, generation);
            match reader.get_object(id, &mut HashSet::new()) {
                Ok(object) => {
                    objects.insert(id, object);
                }
                Err(err) => debug!(?id, %err, "unparsable object in locked PDF"),
            }
        }
    }

    let mut document = reader.document;
    for (id, object) in objects {
        document.objects.entry(id).or_insert(object);
    }
    document.decrypt(password)?;
    Ok(document)
}

/// Accumulates pages from any number of source documents into a fresh one.
struct MergeBuilder {
    target: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl MergeBuilder {
    fn new() -> Self {
        let mut target = Document::with_version("1.5");
        let pages_id = target.new_object_id();
        Self {
            target,
            pages_id,
            kids: Vec::new(),
        }
    }

    fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append every page of `source` in page order; returns pages added.
    fn append_document(&mut self, source: &Document) -> usize {
        // Shared resources (fonts, images) are imported once per source.
        let mut memo: HashMap<ObjectId, ObjectId> = HashMap::new();
        let pages = source.get_pages();
        let mut added = 0;

        for (_, page_id) in pages {
            match self.import_page(source, page_id, &mut memo) {
                Ok(new_id) => {
                    self.kids.push(Object::Reference(new_id));
                    added += 1;
                }
                Err(err) => warn!(?page_id, %err, "cannot import page, skipping"),
            }
        }
        added
    }

    fn import_page(
        &mut self,
        source: &Document,
        page_id: ObjectId,
        memo: &mut HashMap<ObjectId, ObjectId>,
    ) -> std::result::Result<ObjectId, lopdf::Error> {
        let page = source.get_dictionary(page_id)?;

        // Reserve the id first so annotations pointing back at the page
        // resolve to the imported copy.
        let new_id = self.target.new_object_id();
        memo.insert(page_id, new_id);

        let mut imported = self.import_dictionary(source, page, memo);
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(source, page_id, key) {
                let value = self.import_value(source, &value, memo);
                imported.set(key.to_vec(), value);
            }
        }
        imported.set("Parent", Object::Reference(self.pages_id));

        self.target
            .objects
            .insert(new_id, Object::Dictionary(imported));
        Ok(new_id)
    }

    fn import_object(
        &mut self,
        source: &Document,
        id: ObjectId,
        memo: &mut HashMap<ObjectId, ObjectId>,
    ) -> ObjectId {
        if let Some(&existing) = memo.get(&id) {
            return existing;
        }
        let new_id = self.target.new_object_id();
        memo.insert(id, new_id);

        let cloned = match source.get_object(id) {
            Ok(object) => self.import_value(source, object, memo),
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        self.target.objects.insert(new_id, cloned);
        new_id
    }

    fn import_value(
        &mut self,
        source: &Document,
        object: &Object,
        memo: &mut HashMap<ObjectId, ObjectId>,
    ) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.import_object(source, *id, memo)),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(source, dict, memo)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import_value(source, item, memo))
                    .collect(),
            ),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dictionary(source, &stream.dict, memo);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    /// `/Parent` links are dropped; pages get theirs re-pointed at the new
    /// page tree and nothing else needs one.
    fn import_dictionary(
        &mut self,
        source: &Document,
        dict: &Dictionary,
        memo: &mut HashMap<ObjectId, ObjectId>,
    ) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            let value = self.import_value(source, value, memo);
            copy.set(key.clone(), value);
        }
        copy
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        self.target.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.target.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.target.trailer.set("Root", catalog_id);
        self.target.compress();

        let mut output = Vec::new();
        self.target
            .save_to(&mut output)
            .map_err(|err| FilyError::write(format!("failed to serialise merged PDF: {err}")))?;
        Ok(output)
    }
}

/// Walk up the page tree looking for an inherited attribute.
fn inherited_attribute(source: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = source.get_dictionary(page_id).ok()?;
    // Bounded so a cyclic /Parent chain cannot loop forever.
    for _ in 0..64 {
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = source.get_dictionary(parent_id).ok()?;
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::writer::PdfWriter;
    use fily_core::PaperSize;
    use fily_security::PasswordProtector;
    use image::RgbImage;

    /// A PDF with exactly `pages` pages, one tiny image per page.
    fn write_pdf(dir: &Path, name: &str, paper: PaperSize, pages: usize) -> PathBuf {
        let images = vec![RgbImage::from_pixel(4, 4, image::Rgb([200, 0, 0])); pages];
        let bytes = PdfWriter::new(paper).fitted_image_pages(&images, 72.0);
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn single_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", PaperSize::A4, 1);
        let out = dir.path().join("out.pdf");

        let err = merge_pdfs(&BatchMergeSpec::new([a]), &out).unwrap_err();
        assert_eq!(err.kind(), fily_core::ErrorKind::InvalidBatchInput);
        assert!(!out.exists());
    }

    #[test]
    fn pages_are_concatenated() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", PaperSize::A4, 1);
        let b = write_pdf(dir.path(), "b.pdf", PaperSize::A4, 3);
        let out = dir.path().join("out.pdf");

        let report = merge_pdfs(&BatchMergeSpec::new([a, b]), &out).unwrap();
        assert_eq!(report.pages, 4);
        assert_eq!(Document::load(&out).unwrap().get_pages().len(), 4);
    }

    #[test]
    fn missing_and_garbage_inputs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", PaperSize::A4, 1);
        let garbage = dir.path().join("garbage.pdf");
        std::fs::write(&garbage, b"definitely not a pdf").unwrap();
        let missing = dir.path().join("missing.pdf");
        let out = dir.path().join("out.pdf");

        let report =
            merge_pdfs(&BatchMergeSpec::new([missing.clone(), a.clone(), garbage.clone()]), &out)
                .unwrap();
        assert_eq!(report.merged, vec![a]);
        assert_eq!(report.skipped, vec![missing, garbage]);
        assert_eq!(report.pages, 1);
    }

    #[test]
    fn nothing_usable_is_invalid_batch() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        let spec = BatchMergeSpec::new([dir.path().join("x.pdf"), dir.path().join("y.pdf")]);

        let err = merge_pdfs(&spec, &out).unwrap_err();
        assert_eq!(err.kind(), fily_core::ErrorKind::InvalidBatchInput);
        assert!(!out.exists());
    }

    #[test]
    fn locked_input_is_merged_with_its_password() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", PaperSize::A4, 1);
        let b = write_pdf(dir.path(), "b.pdf", PaperSize::A4, 2);
        PasswordProtector::new("opensesame").protect(&b).unwrap();
        let out = dir.path().join("out.pdf");

        let spec = BatchMergeSpec::new([a.clone(), b.clone()]).with_password(&b, "opensesame");
        let report = merge_pdfs(&spec, &out).unwrap();

        assert_eq!(report.merged, vec![a, b]);
        assert_eq!(report.pages, 3);
        let merged = Document::load(&out).unwrap();
        assert!(!merged.is_encrypted());
        assert_eq!(merged.get_pages().len(), 3);
    }

    #[test]
    fn locked_input_without_right_password_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", PaperSize::A4, 1);
        let b = write_pdf(dir.path(), "b.pdf", PaperSize::A4, 2);
        PasswordProtector::new("opensesame").protect(&b).unwrap();

        for spec in [
            BatchMergeSpec::new([a.clone(), b.clone()]),
            BatchMergeSpec::new([a.clone(), b.clone()]).with_password(&b, "guess"),
        ] {
            let out = dir.path().join("out.pdf");
            let report = merge_pdfs(&spec, &out).unwrap();
            assert_eq!(report.skipped, vec![b.clone()]);
            assert_eq!(Document::load(&out).unwrap().get_pages().len(), 1);
        }
    }

    #[test]
    fn inherited_media_box_is_copied_onto_page() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", PaperSize::Letter, 1);
        let b = write_pdf(dir.path(), "b.pdf", PaperSize::Letter, 1);
        let out = dir.path().join("out.pdf");
        merge_pdfs(&BatchMergeSpec::new([a, b]), &out).unwrap();

        let doc = Document::load(&out).unwrap();
        for (_, page_id) in doc.get_pages() {
            let page = doc.get_dictionary(page_id).unwrap();
            assert!(page.has(b"MediaBox"));
            assert!(page.has(b"Resources"));
        }
    }
}
