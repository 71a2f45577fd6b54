// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tabular fallbacks: the first worksheet of an xlsx workbook, or a CSV file,
// read into rows (header row first) for the table renderer.

use fily_core::error::{FilyError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::package::Package;

type Rows = Vec<Vec<String>>;

/// Last worksheet column (`XFD`), zero-based.
const MAX_COLUMN: usize = 16_383;

// -- xlsx ---------------------------------------------------------------------

/// Rows of the first worksheet, shared strings resolved.
pub(crate) fn xlsx_rows(bytes: Vec<u8>) -> Result<Rows> {
    let mut package = Package::open(bytes, ".xls")?;

    let shared = match package.part("xl/sharedStrings.xml")? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_name = first_sheet_part(&package)
        .ok_or_else(|| FilyError::read("workbook has no worksheets"))?;
    let xml = package
        .part(&sheet_name)?
        .ok_or_else(|| FilyError::read(format!("missing {sheet_name}")))?;

    worksheet_rows(&xml, &shared)
}

fn first_sheet_part(package: &Package) -> Option<String> {
    const FIRST: &str = "xl/worksheets/sheet1.xml";
    let names = package.part_names();
    if names.iter().any(|n| n == FIRST) {
        return Some(FIRST.to_string());
    }
    names
        .into_iter()
        .find(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml") && !n.contains("_rels"))
}

fn xml_error(part: &str) -> impl Fn(quick_xml::Error) -> FilyError + '_ {
    move |err| FilyError::read(format!("{part}: {err}"))
}

/// Each `<si>` entry, with rich-text runs concatenated.
fn shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(xml_error("sharedStrings.xml"))?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().map_err(xml_error("sharedStrings.xml"))?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell type (`t` attribute) of a `<c>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Shared,
    Inline,
    Bool,
    Other,
}

struct Cell {
    column: Option<usize>,
    kind: CellType,
    value: String,
}

impl Cell {
    fn from_start(e: &BytesStart) -> Result<Self> {
        let attr = |name: &[u8]| -> Result<Option<String>> {
            let found = e
                .try_get_attribute(name)
                .map_err(|err| FilyError::read(format!("worksheet attribute: {err}")))?;
            found
                .map(|a| {
                    a.unescape_value()
                        .map(|v| v.into_owned())
                        .map_err(xml_error("worksheet"))
                })
                .transpose()
        };
        let kind = match attr(b"t")?.as_deref() {
            Some("s") => CellType::Shared,
            Some("inlineStr") => CellType::Inline,
            Some("b") => CellType::Bool,
            _ => CellType::Other,
        };
        Ok(Self {
            column: match attr(b"r")? {
                Some(reference) => column_index(&reference)?,
                None => None,
            },
            kind,
            value: String::new(),
        })
    }

    fn resolve(self, shared: &[String]) -> String {
        match self.kind {
            CellType::Shared => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|idx| shared.get(idx).cloned())
                .unwrap_or_default(),
            CellType::Bool => match self.value.trim() {
                "1" => "TRUE".into(),
                "0" => "FALSE".into(),
                other => other.into(),
            },
            CellType::Inline | CellType::Other => self.value,
        }
    }
}

/// Zero-based column from an A1-style reference (`"C7"` gives 2). Columns
/// past `XFD` are rejected.
fn column_index(reference: &str) -> Result<Option<usize>> {
    let mut number = 0usize;
    let mut letters = 0;
    for b in reference.bytes().take_while(u8::is_ascii_alphabetic) {
        letters += 1;
        number = number * 26 + usize::from(b.to_ascii_uppercase() - b'A' + 1);
        if number > MAX_COLUMN + 1 {
            return Err(FilyError::read(format!("cell reference '{reference}' is out of range")));
        }
    }
    Ok((letters > 0).then(|| number - 1))
}

fn worksheet_rows(xml: &str, shared: &[String]) -> Result<Rows> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rows: Rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<Cell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error("worksheet"))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => cell = Some(Cell::from_start(&e)?),
                b"v" => in_value = true,
                b"t" if cell.as_ref().is_some_and(|c| c.kind == CellType::Inline) => {
                    in_value = true
                }
                _ => {}
            },
            Event::Text(t) if in_value => {
                if let Some(cell) = cell.as_mut() {
                    cell.value
                        .push_str(&t.unescape().map_err(xml_error("worksheet"))?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(done) = cell.take() {
                        let column = done.column.unwrap_or(row.len());
                        if row.len() <= column {
                            row.resize(column + 1, String::new());
                        }
                        row[column] = done.resolve(shared);
                    }
                }
                b"row" => rows.push(std::mem::take(&mut row)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    while rows
        .last()
        .is_some_and(|r| r.iter().all(|c| c.trim().is_empty()))
    {
        rows.pop();
    }
    Ok(rows)
}

// -- CSV ----------------------------------------------------------------------

/// Parse comma-separated text with RFC 4180 quoting (`""` escapes, quoted
/// fields may span lines).
pub(crate) fn csv_rows(text: &str) -> Rows {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            other => field.push(other),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows.retain(|r: &Vec<String>| !(r.len() == 1 && r[0].is_empty()));
    rows
}
