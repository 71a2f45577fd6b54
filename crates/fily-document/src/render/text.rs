// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-family fallbacks. Markup handling is lenient: markdown
// and HTML are flattened by pattern substitution, not parsed.

use std::borrow::Cow;

use fily_core::error::{FilyError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::pdf::Block;

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n)+").unwrap());

static MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+").unwrap());
static MD_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static MD_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static MD_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]*)`").unwrap());

static HTML_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,7});").unwrap());
static HTML_HIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());
static HTML_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|table|section|article|blockquote)\s*>").unwrap()
});
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Windows and old-Mac line endings to `\n`.
fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Blank-line separated paragraphs; single newlines stay as line breaks.
pub(crate) fn plain_blocks(text: &str) -> Vec<Block> {
    let text = normalize_newlines(text);
    BLANK_LINES
        .split(&text)
        .map(|chunk| chunk.trim_matches('\n'))
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| Block::Paragraph(chunk.to_string()))
        .collect()
}

/// Strip heading markers, emphasis and inline code ticks.
pub(crate) fn strip_markdown(text: &str) -> String {
    let text = MD_HEADING.replace_all(text, "");
    let text = MD_BOLD.replace_all(&text, |caps: &Captures| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map_or(String::new(), |m| m.as_str().to_string())
    });
    let text = MD_ITALIC.replace_all(&text, "$1");
    MD_CODE.replace_all(&text, "$1").into_owned()
}

pub(crate) fn markdown_blocks(text: &str) -> Vec<Block> {
    plain_blocks(&strip_markdown(&normalize_newlines(text)))
}

fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "hellip" => "\u{2026}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "euro" => "\u{20ac}",
        _ => return None,
    })
}

/// Decode named and numeric character references; unknown ones are kept.
pub(crate) fn unescape_html(text: &str) -> String {
    HTML_ENTITY
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32).map(String::from)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from)
            } else {
                named_entity(body).map(String::from)
            };
            decoded.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Visible text of an HTML document, block elements as paragraph breaks.
pub(crate) fn strip_html(text: &str) -> String {
    let text = unescape_html(&normalize_newlines(text));
    let text = HTML_HIDDEN.replace_all(&text, "");
    let text = HTML_BREAK.replace_all(&text, "\n\n");
    let text = HTML_TAG.replace_all(&text, "");
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn html_blocks(text: &str) -> Vec<Block> {
    plain_blocks(&strip_html(text))
}

/// XML is shown exactly as written.
pub(crate) fn xml_blocks(text: &str) -> Vec<Block> {
    vec![Block::Preformatted(normalize_newlines(text).into_owned())]
}

/// Parse and pretty-print with two-space indentation, non-ASCII kept as is.
pub(crate) fn json_blocks(text: &str) -> Result<Vec<Block>> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|err| FilyError::read(format!("invalid JSON: {err}")))?;

    let pretty = serde_json::to_string_pretty(&value)
        .map_err(|err| FilyError::render(format!("JSON formatting: {err}")))?;
    Ok(vec![Block::Preformatted(pretty)])
}

/// Display name for a source file extension.
pub(crate) fn language_name(extension: &str) -> Cow<'static, str> {
    let name = match extension.to_ascii_lowercase().as_str() {
        "py" => "Python",
        "js" => "JavaScript",
        "ts" => "TypeScript",
        "css" => "CSS",
        "rs" => "Rust",
        "java" => "Java",
        "c" => "C",
        "h" => "C header",
        "cpp" => "C++",
        "go" => "Go",
        "rb" => "Ruby",
        "php" => "PHP",
        "sh" => "Shell",
        "sql" => "SQL",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        other => return Cow::Owned(other.to_ascii_uppercase()),
    };
    Cow::Borrowed(name)
}

/// Heading naming the language, then the file verbatim in a monospaced block.
pub(crate) fn source_blocks(text: &str, source_name: &str) -> Vec<Block> {
    let extension = std::path::Path::new(source_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let language = language_name(extension);
    let heading = if language.is_empty() {
        format!("Source: {source_name}")
    } else {
        format!("{language} source: {source_name}")
    };
    vec![
        Block::Heading(heading),
        Block::Preformatted(normalize_newlines(text).into_owned()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(blocks: Vec<Block>) -> Vec<String> {
        blocks
            .into_iter()
            .map(|b| match b {
                Block::Paragraph(p) => p,
                other => panic!("unexpected block {other:?}"),
            })
            .collect()
    }

    #[test]
    fn plain_text_splits_on_blank_lines() {
        let blocks = plain_blocks("first line\r\nsame para\r\n\r\n  \r\nsecond\n\n\n");
        assert_eq!(paragraphs(blocks), vec!["first line\nsame para", "second"]);
    }

    #[test]
    fn markdown_markers_removed() {
        let stripped = strip_markdown("# Title\n\nSome **bold**, __strong__, *em* and `code`.");
        assert_eq!(stripped, "Title\n\nSome bold, strong, em and code.");
    }

    #[test]
    fn markdown_keeps_list_asterisks() {
        let stripped = strip_markdown("* one\n* two");
        assert_eq!(stripped, "* one\n* two");
    }

    #[test]
    fn html_entities_and_tags() {
        let html = "<html><head><style>p { color: red }</style></head><body>\
                    <h1>Tom &amp; Jerry &copy; 2026</h1><p>Fish &#38; chips<br>&#x263A;</p>\
                    <script>alert(1)</script></body></html>";
        let blocks = paragraphs(html_blocks(html));
        assert_eq!(blocks, vec!["Tom & Jerry \u{a9} 2026", "Fish & chips", "\u{263a}"]);
    }

    #[test]
    fn json_is_reindented() {
        let blocks = json_blocks(r#"{"name":"Zoë","tags":[1,2]}"#).unwrap();
        let Block::Preformatted(text) = &blocks[0] else {
            panic!("expected preformatted block");
        };
        assert_eq!(text, "{\n  \"name\": \"Zoë\",\n  \"tags\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn bad_json_is_read_failure() {
        let err = json_blocks("{ nope").unwrap_err();
        assert!(matches!(
            err,
            FilyError::RenderFailure { stage: fily_core::Stage::Read, .. }
        ));
    }

    #[test]
    fn source_gets_language_heading() {
        let blocks = source_blocks("print('hi')\n", "hello.py");
        assert_eq!(blocks[0], Block::Heading("Python source: hello.py".into()));
        assert_eq!(blocks[1], Block::Preformatted("print('hi')\n".into()));
        assert_eq!(language_name("kt"), "KT");
    }
}
