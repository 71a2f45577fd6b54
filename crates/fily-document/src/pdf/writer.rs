// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: lay out text blocks, tables and raster images into new PDF
// documents using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use fily_core::PaperSize;
use fily_core::error::Result;
use image::RgbImage;
use printpdf::color::Color;
use printpdf::graphics::{LinePoint, PaintMode, Polygon, PolygonRing, WindingOrder};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, Rgb, TextItem, XObjectTransform,
};
use tracing::{debug, info, instrument};

/// Average Helvetica glyph width as a fraction of the font size.
const HELVETICA_WIDTH: f32 = 0.50;
/// Courier is monospaced at 600/1000 em.
const COURIER_WIDTH: f32 = 0.60;
/// Baseline-to-baseline distance as a multiple of the font size.
const LINE_SPACING: f32 = 1.25;
const MARGIN_PT: f32 = 56.7; // 20 mm
const CELL_PADDING_PT: f32 = 4.0;

/// One unit of flowed content.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Bold, larger line(s).
    Heading(String),
    /// Word-wrapped text; embedded `\n` become line breaks.
    Paragraph(String),
    /// Monospaced text, laid out verbatim with hard wrapping only.
    Preformatted(String),
    /// Grid with the first row styled as a header.
    Table(Vec<Vec<String>>),
}

/// Creates new PDF documents from flowed blocks or raster images.
pub struct PdfWriter {
    paper_size: PaperSize,
    title: Option<String>,
    font_size_pt: f32,
}

impl PdfWriter {
    /// Create a new writer targeting the given paper size.
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            title: None,
            font_size_pt: 11.0,
        }
    }

    /// Create a new writer defaulting to A4.
    pub fn a4() -> Self {
        Self::new(PaperSize::A4)
    }

    pub fn with_font_size(mut self, font_size_pt: f32) -> Self {
        self.font_size_pt = font_size_pt.clamp(6.0, 32.0);
        self
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Fily Document")
    }

    /// Page size in points.
    fn page_size_pt(&self) -> (f32, f32) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32).into_pt().0, Mm(h_mm as f32).into_pt().0)
    }

    // -- Flowed content -------------------------------------------------------

    /// Lay out `blocks` top to bottom, breaking pages as needed.
    ///
    /// An empty block list still yields a single blank page.
    #[instrument(skip_all, fields(blocks = blocks.len()))]
    pub fn render_blocks(&self, blocks: &[Block]) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_size_pt();
        info!(paper = ?self.paper_size, title = self.title(), "Laying out PDF");

        let mut flow = Flow::new(page_w, page_h);
        let size = self.font_size_pt;

        for block in blocks {
            match block {
                Block::Heading(text) => {
                    let heading_size = size * 1.5;
                    flow.text_lines(text, heading_size, BuiltinFont::HelveticaBold, true);
                    flow.gap(size * 0.5);
                }
                Block::Paragraph(text) => {
                    flow.text_lines(text, size, BuiltinFont::Helvetica, true);
                    flow.gap(size * 0.6);
                }
                Block::Preformatted(text) => {
                    let mono = size * 0.85;
                    flow.text_lines(&text.replace('\t', "    "), mono, BuiltinFont::Courier, false);
                    flow.gap(size * 0.6);
                }
                Block::Table(rows) => {
                    flow.table(rows, size);
                    flow.gap(size);
                }
            }
        }

        let pages = flow.finish();
        debug!(pages = pages.len(), "Layout complete");
        Ok(self.save(PdfDocument::new(self.title()), pages))
    }

    /// Create a PDF from plain text content, one paragraph per blank-line
    /// separated chunk.
    pub fn create_from_text(&self, text: &str) -> Result<Vec<u8>> {
        let blocks: Vec<Block> = text
            .split("\n\n")
            .filter(|chunk| !chunk.trim().is_empty())
            .map(|chunk| Block::Paragraph(chunk.to_string()))
            .collect();
        self.render_blocks(&blocks)
    }

    // -- Images ---------------------------------------------------------------

    /// One page sized exactly to the image, one pixel per point.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn native_image_pdf(&self, image: &RgbImage) -> Vec<u8> {
        let mut doc = PdfDocument::new(self.title());
        let (w_pt, h_pt) = (image.width() as f32, image.height() as f32);
        let id = doc.add_image(&raw_rgb(image));

        let ops = vec![Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some(1.0),
                scale_y: Some(1.0),
                dpi: Some(72.0),
                rotate: None,
            },
        }];
        let page = PdfPage::new(pt_to_mm(w_pt), pt_to_mm(h_pt), ops);
        self.save(doc, vec![page])
    }

    /// One page per image at this writer's paper size, each image scaled to
    /// fit inside `margin_pt` (total, split evenly) and centred.
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn fitted_image_pages(&self, images: &[RgbImage], margin_pt: f32) -> Vec<u8> {
        let (page_w, page_h) = self.page_size_pt();
        let mut doc = PdfDocument::new(self.title());
        let mut pages = Vec::with_capacity(images.len());

        for image in images {
            let (img_w, img_h) = (image.width() as f32, image.height() as f32);
            let scale = ((page_w - margin_pt) / img_w).min((page_h - margin_pt) / img_h);
            let x = (page_w - img_w * scale) / 2.0;
            let y = (page_h - img_h * scale) / 2.0;

            let id = doc.add_image(&raw_rgb(image));
            let ops = vec![Op::UseXobject {
                id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(x)),
                    translate_y: Some(Pt(y)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(72.0),
                    rotate: None,
                },
            }];
            debug!(scale, x, y, "Image placed");
            pages.push(PdfPage::new(pt_to_mm(page_w), pt_to_mm(page_h), ops));
        }

        self.save(doc, pages)
    }

    fn save(&self, mut doc: PdfDocument, pages: Vec<PdfPage>) -> Vec<u8> {
        doc.with_pages(pages);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "printpdf reported warnings");
        }
        output
    }
}

fn raw_rgb(image: &RgbImage) -> RawImage {
    RawImage {
        pixels: RawImageData::U8(image.as_raw().clone()),
        width: image.width() as usize,
        height: image.height() as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    }
}

fn pt_to_mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb {
        r,
        g,
        b,
        icc_profile: None,
    })
}

// -- Layout -------------------------------------------------------------------

/// Top-down cursor over a sequence of pages.
struct Flow {
    page_w: f32,
    page_h: f32,
    /// Baseline of the next line, measured from the page bottom.
    cursor_y: f32,
    ops: Vec<Op>,
    pages: Vec<PdfPage>,
}

impl Flow {
    fn new(page_w: f32, page_h: f32) -> Self {
        Self {
            page_w,
            page_h,
            cursor_y: page_h - MARGIN_PT,
            ops: Vec::new(),
            pages: Vec::new(),
        }
    }

    fn usable_width(&self) -> f32 {
        self.page_w - 2.0 * MARGIN_PT
    }

    fn usable_height(&self) -> f32 {
        self.page_h - 2.0 * MARGIN_PT
    }

    fn is_page_fresh(&self) -> bool {
        self.ops.is_empty()
    }

    fn break_page(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.pages
            .push(PdfPage::new(pt_to_mm(self.page_w), pt_to_mm(self.page_h), ops));
        self.cursor_y = self.page_h - MARGIN_PT;
    }

    /// Start a new page unless `height` still fits above the bottom margin.
    fn reserve(&mut self, height: f32) {
        if self.cursor_y - height < MARGIN_PT && !self.is_page_fresh() {
            self.break_page();
        }
    }

    fn gap(&mut self, height: f32) {
        if !self.is_page_fresh() {
            self.cursor_y -= height;
        }
    }

    fn text_lines(&mut self, text: &str, size: f32, font: BuiltinFont, word_wrap: bool) {
        let glyph = if matches!(font, BuiltinFont::Courier) {
            COURIER_WIDTH
        } else {
            HELVETICA_WIDTH
        };
        let max_chars = ((self.usable_width() / (glyph * size)) as usize).max(1);
        let lines = if word_wrap {
            wrap_text(text, max_chars)
        } else {
            hard_wrap(text, max_chars)
        };

        let line_height = size * LINE_SPACING;
        for line in lines {
            self.reserve(line_height);
            self.cursor_y -= size;
            if !line.is_empty() {
                self.write_text(MARGIN_PT, self.cursor_y, &line, size, font);
            }
            self.cursor_y -= line_height - size;
        }
    }

    fn write_text(&mut self, x: f32, y: f32, text: &str, size: f32, font: BuiltinFont) {
        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextCursor {
            pos: Point { x: Pt(x), y: Pt(y) },
        });
        self.ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(size),
            font,
        });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font,
        });
        self.ops.push(Op::EndTextSection);
    }

    /// Equal-width columns; each row is as tall as its tallest wrapped cell
    /// and moves to a new page whole when it does not fit.
    fn table(&mut self, rows: &[Vec<String>], size: f32) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let col_w = self.usable_width() / columns as f32;
        let max_chars =
            (((col_w - 2.0 * CELL_PADDING_PT) / (HELVETICA_WIDTH * size)) as usize).max(1);
        let line_height = size * LINE_SPACING;

        for (index, row) in rows.iter().enumerate() {
            let header = index == 0;
            let cells: Vec<Vec<String>> = (0..columns)
                .map(|col| {
                    let text = row.get(col).map(String::as_str).unwrap_or("");
                    wrap_text(text, max_chars)
                })
                .collect();
            let max_lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let row_h = (max_lines as f32 * line_height + 2.0 * CELL_PADDING_PT)
                .min(self.usable_height());

            self.reserve(row_h);
            let top = self.cursor_y;
            let bottom = top - row_h;

            let (background, foreground, font) = if header {
                (
                    rgb(0.5, 0.5, 0.5),
                    rgb(0.96, 0.96, 0.96),
                    BuiltinFont::HelveticaBold,
                )
            } else {
                (rgb(0.96, 0.96, 0.86), rgb(0.0, 0.0, 0.0), BuiltinFont::Helvetica)
            };

            self.ops.push(Op::SetFillColor { col: background });
            self.ops.push(Op::SetOutlineColor {
                col: rgb(0.0, 0.0, 0.0),
            });
            self.ops.push(Op::SetOutlineThickness { pt: Pt(1.0) });
            for col in 0..columns {
                let left = MARGIN_PT + col as f32 * col_w;
                self.ops.push(Op::DrawPolygon {
                    polygon: rectangle(left, bottom, col_w, row_h),
                });
            }

            self.ops.push(Op::SetFillColor { col: foreground });
            for (col, lines) in cells.iter().enumerate() {
                let left = MARGIN_PT + col as f32 * col_w + CELL_PADDING_PT;
                let mut baseline = top - CELL_PADDING_PT - size;
                for line in lines {
                    if baseline < bottom {
                        break;
                    }
                    self.write_text(left, baseline, line, size, font);
                    baseline -= line_height;
                }
            }

            self.cursor_y = bottom;
        }

        // Later blocks draw text in black.
        self.ops.push(Op::SetFillColor {
            col: rgb(0.0, 0.0, 0.0),
        });
    }

    fn finish(mut self) -> Vec<PdfPage> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.break_page();
        }
        self.pages
    }
}

fn rectangle(x: f32, y: f32, width: f32, height: f32) -> Polygon {
    let corner = |x: f32, y: f32| LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    };
    Polygon {
        rings: vec![PolygonRing {
            points: vec![
                corner(x, y),
                corner(x + width, y),
                corner(x + width, y + height),
                corner(x, y + height),
            ],
        }],
        mode: PaintMode::FillStroke,
        winding_order: WindingOrder::NonZero,
    }
}

// -- Text wrapping helpers ----------------------------------------------------

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then performs simple word-wrap within each
/// line. Words longer than `max_width` are force-broken on character
/// boundaries.
pub(crate) fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        let mut current_len = 0usize;

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let mut chunks = chunk_chars(word, max_width);
                let last = chunks.pop().unwrap_or_default();
                result.extend(chunks);
                current_len = last.chars().count();
                current_line = last;
            } else if current_line.is_empty() {
                current_line.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
                current_len = word_len;
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    result
}

/// Split lines on `\n` and break any line longer than `max_width` characters
/// without touching its whitespace.
pub(crate) fn hard_wrap(text: &str, max_width: usize) -> Vec<String> {
    text.split('\n')
        .flat_map(|line| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                vec![String::new()]
            } else {
                chunk_chars(line, max_width)
            }
        })
        .collect()
}

fn chunk_chars(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
