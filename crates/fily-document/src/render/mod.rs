// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process fallback renderers. Each one reads its input, turns it into
// flowed blocks (or a raster page) and writes a linear PDF atomically.

mod package;
mod sheet;
mod text;
mod word;

use std::path::Path;

use fily_core::error::{FilyError, Result};
use fily_core::types::{FormatFamily, PaperSize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::image::ImageProcessor;
use crate::output::write_atomically;
use crate::pdf::{Block, PdfWriter};

/// Which in-process renderer handles a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackKind {
    Word,
    Spreadsheet,
    Delimited,
    PlainText,
    Markdown,
    Html,
    Xml,
    Json,
    SourceCode,
    Image,
}

impl FallbackKind {
    /// The fallback for `family`, if it has one. `extension` separates the
    /// markup dialects.
    pub fn for_family(family: FormatFamily, extension: Option<&str>) -> Option<Self> {
        let kind = match family {
            FormatFamily::WordLike => Self::Word,
            FormatFamily::SpreadsheetLike => Self::Spreadsheet,
            FormatFamily::DelimitedText => Self::Delimited,
            FormatFamily::PlainText => Self::PlainText,
            FormatFamily::Markdown => Self::Markdown,
            FormatFamily::Markup if extension.is_some_and(|e| e.eq_ignore_ascii_case("xml")) => {
                Self::Xml
            }
            FormatFamily::Markup => Self::Html,
            FormatFamily::StructuredData => Self::Json,
            FormatFamily::SourceCode => Self::SourceCode,
            FormatFamily::Image => Self::Image,
            FormatFamily::PresentationLike
            | FormatFamily::OfficeLegacy
            | FormatFamily::PdfPassthrough
            | FormatFamily::Unsupported => return None,
        };
        Some(kind)
    }
}

/// Layout settings shared by the fallback renderers.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub paper: PaperSize,
    pub font_size_pt: f32,
    /// User-facing filename; used as the document title and source heading.
    pub source_name: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            paper: PaperSize::A4,
            font_size_pt: 11.0,
            source_name: String::from("document"),
        }
    }
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    std::fs::read(input).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => FilyError::InputNotFound(input.to_path_buf()),
        _ => FilyError::read(format!("cannot read input: {err}")),
    })
}

/// Parse `bytes` into flowed blocks for every non-image kind.
fn blocks_for(kind: FallbackKind, bytes: Vec<u8>, source_name: &str) -> Result<Vec<Block>> {
    let blocks = match kind {
        FallbackKind::Word => word::docx_blocks(bytes)?,
        FallbackKind::Spreadsheet => vec![Block::Table(sheet::xlsx_rows(bytes)?)],
        FallbackKind::Delimited => {
            vec![Block::Table(sheet::csv_rows(&String::from_utf8_lossy(&bytes)))]
        }
        FallbackKind::PlainText => text::plain_blocks(&String::from_utf8_lossy(&bytes)),
        FallbackKind::Markdown => text::markdown_blocks(&String::from_utf8_lossy(&bytes)),
        FallbackKind::Html => text::html_blocks(&String::from_utf8_lossy(&bytes)),
        FallbackKind::Xml => text::xml_blocks(&String::from_utf8_lossy(&bytes)),
        FallbackKind::Json => text::json_blocks(&String::from_utf8_lossy(&bytes))?,
        FallbackKind::SourceCode => {
            text::source_blocks(&String::from_utf8_lossy(&bytes), source_name)
        }
        FallbackKind::Image => {
            return Err(FilyError::render("images are not flowed content"));
        }
    };
    Ok(blocks)
}

/// Render `input` with the `kind` fallback and write the PDF to `output`.
#[instrument(skip_all, fields(?kind, input = %input.display()))]
pub fn render_fallback(
    kind: FallbackKind,
    input: &Path,
    output: &Path,
    options: &RenderOptions,
) -> Result<()> {
    let mut writer = PdfWriter::new(options.paper).with_font_size(options.font_size_pt);
    writer.set_title(options.source_name.clone());

    let pdf = if kind == FallbackKind::Image {
        let image = ImageProcessor::open(input)?;
        writer.native_image_pdf(&image.flatten_onto_white())
    } else {
        let bytes = read_input(input)?;
        let blocks = blocks_for(kind, bytes, &options.source_name)?;
        debug!(blocks = blocks.len(), "parsed input");
        writer.render_blocks(&blocks)?
    };

    write_atomically(output, &pdf)?;
    info!(output = %output.display(), bytes = pdf.len(), "fallback render complete");
    Ok(())
}
