// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end conversions through the dispatcher with the primary engine
// disabled, so every run is deterministic and needs no office suite.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fily_core::{
    BatchMergeSpec, ConversionRequest, ConverterConfig, ErrorKind, ImageConversionSpec,
    ImageTarget, JobId, PaperSize, Phase, Quality,
};
use fily_document::{Converter, NoEngine, PdfWriter};
use image::{Rgba, RgbaImage};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const DOCX_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Minutes of the meeting</w:t></w:r></w:p>
<w:p><w:r><w:t>All actions were agreed.</w:t></w:r></w:p>
</w:body></w:document>"#;

const XLSX_STRINGS: &str = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<si><t>Item</t></si><si><t>Qty</t></si><si><t>Apples</t></si></sst>"#;

const XLSX_SHEET: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>12</v></c></row>
</sheetData></worksheet>"#;

fn offline() -> Converter {
    Converter::with_engine(ConverterConfig::default(), Arc::new(NoEngine))
}

fn write_package(path: &Path, parts: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, content) in parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn write_text_pdf(path: &Path, paper: PaperSize, text: &str) {
    let bytes = PdfWriter::new(paper).create_from_text(text).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn write_png(path: &Path, color: Rgba<u8>) {
    RgbaImage::from_pixel(16, 12, color).save(path).unwrap();
}

fn page_count(path: &Path) -> usize {
    lopdf::Document::load(path).unwrap().get_pages().len()
}

fn page_widths(path: &Path) -> Vec<f32> {
    let doc = lopdf::Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            media_box[2].as_float().unwrap()
        })
        .collect()
}

fn convert(converter: &Converter, input: &Path, name: &str) -> (bool, Option<ErrorKind>, PathBuf) {
    let output = input.with_file_name(format!("{name}.pdf"));
    let outcome = converter.convert(&ConversionRequest::new(input, &output, name));
    (outcome.success, outcome.error, output)
}

#[test]
fn every_in_process_family_produces_a_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();

    let mut inputs: Vec<(String, PathBuf)> = Vec::new();
    let mut add = |name: &str, content: &str| {
        let path = d.join(format!("in-{name}"));
        std::fs::write(&path, content).unwrap();
        inputs.push((name.to_string(), path));
    };
    add("notes.txt", "Line one\nLine two\n\nSecond paragraph");
    add("people.csv", "name,city\n\"Lovelace, Ada\",London\n");
    add("readme.md", "# Title\n\nSome **bold** text and `code`.");
    add("page.html", "<h1>Hello</h1><p>Fish &amp; chips</p>");
    add("feed.xml", "<feed><entry id=\"1\">x</entry></feed>");
    add("data.json", r#"{"a":[1,2,{"b":"ü"}]}"#);
    add("script.py", "def main():\n\tprint('hi')\n");

    let png = d.join("in-photo.png");
    write_png(&png, Rgba([10, 120, 200, 255]));
    inputs.push(("photo.png".into(), png));

    let pdf = d.join("in-doc.pdf");
    write_text_pdf(&pdf, PaperSize::A4, "already a pdf");
    inputs.push(("doc.pdf".into(), pdf));

    let converter = offline();
    for (name, path) in &inputs {
        let (ok, err, output) = convert(&converter, path, name);
        assert!(ok, "{name}: {err:?}");
        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF"), "{name}");
        assert!(page_count(&output) >= 1, "{name}");
    }
}

#[test]
fn image_page_matches_pixel_size() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("in.png");
    write_png(&png, Rgba([0, 0, 0, 255]));

    let (ok, _, output) = convert(&offline(), &png, "in.png");
    assert!(ok);
    let widths = page_widths(&output);
    assert_eq!(widths.len(), 1);
    assert!((widths[0] - 16.0).abs() < 0.5, "{widths:?}");
}

#[test]
fn office_formats_fall_back_without_engine() {
    let dir = tempfile::tempdir().unwrap();
    let converter = offline();

    let docx = dir.path().join("minutes.docx");
    write_package(&docx, &[("word/document.xml", DOCX_BODY)]);
    let (ok, err, _) = convert(&converter, &docx, "minutes.docx");
    assert!(ok, "{err:?}");

    let xlsx = dir.path().join("stock.xlsx");
    write_package(
        &xlsx,
        &[
            ("xl/sharedStrings.xml", XLSX_STRINGS),
            ("xl/worksheets/sheet1.xml", XLSX_SHEET),
        ],
    );
    let (ok, err, _) = convert(&converter, &xlsx, "stock.xlsx");
    assert!(ok, "{err:?}");

    let pptx = dir.path().join("deck.pptx");
    write_package(&pptx, &[("ppt/presentation.xml", "<p:presentation/>")]);
    let (ok, err, output) = convert(&converter, &pptx, "deck.pptx");
    assert!(!ok);
    assert_eq!(err, Some(ErrorKind::RenderFailure));
    assert!(!output.exists());
}

#[test]
fn legacy_binary_word_fails_without_engine() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("old.doc");
    std::fs::write(&doc, [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]).unwrap();

    let (ok, err, output) = convert(&offline(), &doc, "old.doc");
    assert!(!ok);
    assert_eq!(err, Some(ErrorKind::RenderFailure));
    assert!(!output.exists());
}

#[test]
fn passthrough_with_password_is_encrypted() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("upload.pdf");
    write_text_pdf(&input, PaperSize::A4, "confidential");
    let output = dir.path().join("protected.pdf");

    let request = ConversionRequest::new(&input, &output, "upload.pdf")
        .with_password(Some("hunter2".into()));
    let outcome = offline().convert(&request);

    assert!(outcome.success, "{outcome:?}");
    let protected = lopdf::Document::load(&output).unwrap();
    assert!(protected.is_encrypted());
    assert!(protected.authenticate_password("").is_err());
    assert!(protected.authenticate_password("wrong").is_err());
    assert!(protected.authenticate_password("hunter2").is_ok());

    let original = lopdf::Document::load(&input).unwrap();
    assert!(!original.is_encrypted());
}

#[test]
fn failed_protection_discards_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("damaged.pdf");
    std::fs::write(&input, b"%PDF-1.7\nthis file was cut short").unwrap();
    let output = dir.path().join("protected.pdf");
    let converter = offline();
    let job = JobId::new();

    let request = ConversionRequest::new(&input, &output, "damaged.pdf")
        .with_password(Some("hunter2".into()));
    let outcome = converter.convert_tracked(job, &request);

    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(ErrorKind::EncryptionFailure));
    assert!(!output.exists());
    assert!(input.exists());
    let state = converter.progress().get(job).unwrap();
    assert_eq!(state.phase, Phase::Failed);
    assert_eq!(state.percent, 100);
}

#[test]
fn pdf_converted_onto_itself_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    write_text_pdf(&input, PaperSize::A4, "only copy");
    let before = std::fs::read(&input).unwrap();

    let request = ConversionRequest::new(&input, &input, "scan.pdf").with_password(Some("pw".into()));
    let outcome = offline().convert(&request);

    assert!(!outcome.success);
    assert_eq!(std::fs::read(&input).unwrap(), before);
}

#[test]
fn out_of_range_cell_reference_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let xlsx = dir.path().join("crafted.xlsx");
    let sheet = r#"<worksheet><sheetData><row r="1"><c r="ZZZZZZZZZZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#;
    write_package(&xlsx, &[("xl/worksheets/sheet1.xml", sheet)]);

    let (ok, err, output) = convert(&offline(), &xlsx, "crafted.xlsx");
    assert!(!ok);
    assert_eq!(err, Some(ErrorKind::RenderFailure));
    assert!(!output.exists());
}

#[test]
fn merge_unlocks_inputs_with_their_password() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    write_text_pdf(&a, PaperSize::A4, "open");
    write_text_pdf(&b, PaperSize::Letter, "locked");
    fily_security::PasswordProtector::new("s3cret").protect(&b).unwrap();
    let output = dir.path().join("merged.pdf");

    let spec = BatchMergeSpec::new([&a, &b]).with_password(&b, "s3cret");
    let outcome = offline().merge(&spec, &output);
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(page_count(&output), 2);

    let spec = BatchMergeSpec::new([&a, &b]).with_password(&b, "nope");
    assert!(offline().merge(&spec, &output).success);
    assert_eq!(page_count(&output), 1);
}

#[test]
fn merge_honours_explicit_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    write_text_pdf(&a, PaperSize::A4, "first");
    write_text_pdf(&b, PaperSize::Letter, "second");
    let output = dir.path().join("merged.pdf");

    let spec = BatchMergeSpec::new([&a, &b]).with_order(Some(vec![1, 0]));
    let outcome = offline().merge(&spec, &output);

    assert!(outcome.success, "{outcome:?}");
    let widths = page_widths(&output);
    assert_eq!(widths.len(), 2);
    // Letter (216 mm) first, then A4 (210 mm).
    assert!(widths[0] > widths[1], "{widths:?}");
}

#[test]
fn merge_of_one_file_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    write_text_pdf(&a, PaperSize::A4, "only");

    let outcome = offline().merge(&BatchMergeSpec::new([&a]), &dir.path().join("out.pdf"));
    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(ErrorKind::InvalidBatchInput));
}

#[test]
fn merge_skips_missing_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    write_text_pdf(&a, PaperSize::A4, "present");
    let output = dir.path().join("out.pdf");

    let spec = BatchMergeSpec::new([a, dir.path().join("missing.pdf")]);
    let outcome = offline().merge(&spec, &output);

    assert!(outcome.success);
    assert_eq!(page_count(&output), 1);
}

#[test]
fn transparent_png_to_jpeg_is_white() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("logo.png");
    write_png(&png, Rgba([0, 0, 0, 0]));

    let spec = ImageConversionSpec {
        source_path: png,
        target_format: ImageTarget::Jpeg,
        quality: 95,
    };
    let outcome = offline().convert_image(&spec, &dir.path().join("logo.png"));
    assert!(outcome.success, "{outcome:?}");

    let written = outcome.output_path.unwrap();
    assert_eq!(written.extension().unwrap(), "jpg");
    let decoded = image::open(&written).unwrap();
    assert_eq!(decoded.color(), image::ColorType::Rgb8);
    for pixel in decoded.to_rgb8().pixels() {
        assert!(pixel.0.iter().all(|&c| c >= 250), "{pixel:?}");
    }
}

#[test]
fn five_images_make_five_pages() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..5)
        .map(|i| {
            let path = dir.path().join(format!("img{i}.png"));
            write_png(&path, Rgba([i * 40, 100, 50, 200]));
            path
        })
        .collect();
    let output = dir.path().join("album.pdf");

    let outcome = offline().images_to_pdf(&paths, &output, Quality::Standard);
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(page_count(&output), 5);
    let widths = page_widths(&output);
    assert!(widths.iter().all(|w| (w - 612.3).abs() < 1.0), "{widths:?}");
}

#[test]
fn images_with_nothing_readable_fail() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.png");
    std::fs::write(&bogus, b"not an image").unwrap();

    let outcome = offline().images_to_pdf(
        &[bogus, dir.path().join("absent.jpg")],
        &dir.path().join("out.pdf"),
        Quality::High,
    );
    assert_eq!(outcome.error, Some(ErrorKind::InvalidBatchInput));
}
