// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Word fallback: paragraph text from `word/document.xml`. Formatting,
// tables-as-layout and images are not preserved.

use fily_core::error::{FilyError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

use super::package::Package;
use crate::pdf::Block;

/// One paragraph block per non-empty `<w:p>`.
pub(crate) fn docx_blocks(bytes: Vec<u8>) -> Result<Vec<Block>> {
    let mut package = Package::open(bytes, ".doc")?;
    let xml = package
        .part("word/document.xml")?
        .ok_or_else(|| FilyError::read("package has no word/document.xml"))?;

    Ok(paragraphs(&xml)?
        .into_iter()
        .map(Block::Paragraph)
        .collect())
}

/// Text of every non-empty paragraph in document order.
fn paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|err| FilyError::read(format!("document.xml: {err}")))?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|err| FilyError::read(format!("document.xml: {err}")))?;
                current.push_str(&text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
