// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Fily conversion engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, FilyError};

/// Unique identifier for a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Format classification
// ---------------------------------------------------------------------------

/// Conversion family a file belongs to. Drives which renderer path it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatFamily {
    WordLike,
    SpreadsheetLike,
    PresentationLike,
    Image,
    PlainText,
    DelimitedText,
    /// rtf / odt / ods / odp: only the primary engine can read these.
    OfficeLegacy,
    /// html / htm / xml
    Markup,
    /// json
    StructuredData,
    Markdown,
    SourceCode,
    PdfPassthrough,
    Unsupported,
}

/// Extension table backing [`FormatFamily::from_extension`].
const EXTENSION_TABLE: &[(&str, FormatFamily)] = &[
    ("doc", FormatFamily::WordLike),
    ("docx", FormatFamily::WordLike),
    ("xls", FormatFamily::SpreadsheetLike),
    ("xlsx", FormatFamily::SpreadsheetLike),
    ("ppt", FormatFamily::PresentationLike),
    ("pptx", FormatFamily::PresentationLike),
    ("png", FormatFamily::Image),
    ("jpg", FormatFamily::Image),
    ("jpeg", FormatFamily::Image),
    ("gif", FormatFamily::Image),
    ("bmp", FormatFamily::Image),
    ("tif", FormatFamily::Image),
    ("tiff", FormatFamily::Image),
    ("webp", FormatFamily::Image),
    ("txt", FormatFamily::PlainText),
    ("csv", FormatFamily::DelimitedText),
    ("rtf", FormatFamily::OfficeLegacy),
    ("odt", FormatFamily::OfficeLegacy),
    ("ods", FormatFamily::OfficeLegacy),
    ("odp", FormatFamily::OfficeLegacy),
    ("html", FormatFamily::Markup),
    ("htm", FormatFamily::Markup),
    ("xml", FormatFamily::Markup),
    ("json", FormatFamily::StructuredData),
    ("md", FormatFamily::Markdown),
    ("markdown", FormatFamily::Markdown),
    ("py", FormatFamily::SourceCode),
    ("js", FormatFamily::SourceCode),
    ("ts", FormatFamily::SourceCode),
    ("css", FormatFamily::SourceCode),
    ("rs", FormatFamily::SourceCode),
    ("java", FormatFamily::SourceCode),
    ("c", FormatFamily::SourceCode),
    ("h", FormatFamily::SourceCode),
    ("cpp", FormatFamily::SourceCode),
    ("go", FormatFamily::SourceCode),
    ("rb", FormatFamily::SourceCode),
    ("php", FormatFamily::SourceCode),
    ("sh", FormatFamily::SourceCode),
    ("sql", FormatFamily::SourceCode),
    ("yaml", FormatFamily::SourceCode),
    ("yml", FormatFamily::SourceCode),
    ("toml", FormatFamily::SourceCode),
    ("pdf", FormatFamily::PdfPassthrough),
];

impl FormatFamily {
    /// Classify a bare extension (with or without a leading dot).
    pub fn from_extension(ext: &str) -> Self {
        let lower = ext.trim_start_matches('.').to_ascii_lowercase();
        EXTENSION_TABLE
            .iter()
            .find(|(known, _)| *known == lower)
            .map(|(_, family)| *family)
            .unwrap_or(Self::Unsupported)
    }

    /// Classify a filename or path by its final extension.
    pub fn classify(filename: impl AsRef<Path>) -> Self {
        filename
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unsupported)
    }

    /// Stable kebab-case name, identical to the serde representation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WordLike => "word-like",
            Self::SpreadsheetLike => "spreadsheet-like",
            Self::PresentationLike => "presentation-like",
            Self::Image => "image",
            Self::PlainText => "plain-text",
            Self::DelimitedText => "delimited-text",
            Self::OfficeLegacy => "office-legacy",
            Self::Markup => "markup",
            Self::StructuredData => "structured-data",
            Self::Markdown => "markdown",
            Self::SourceCode => "source-code",
            Self::PdfPassthrough => "pdf-passthrough",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether the primary document engine is tried first for this family.
    pub fn uses_engine(&self) -> bool {
        matches!(
            self,
            Self::WordLike | Self::SpreadsheetLike | Self::PresentationLike | Self::OfficeLegacy
        )
    }
}

impl std::fmt::Display for FormatFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Every extension the classifier accepts, in table order.
pub fn supported_extensions() -> impl Iterator<Item = (&'static str, FormatFamily)> {
    EXTENSION_TABLE.iter().copied()
}

// ---------------------------------------------------------------------------
// Quality and paper
// ---------------------------------------------------------------------------

/// Output quality tier of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    #[default]
    High,
}

impl Quality {
    /// Page size used by in-process renderers for this tier.
    pub fn paper_size(&self) -> PaperSize {
        match self {
            Self::High => PaperSize::A4,
            Self::Standard => PaperSize::Letter,
        }
    }
}

impl FromStr for Quality {
    type Err = FilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "standard" => Ok(Self::Standard),
            other => Err(FilyError::UnsupportedFormat(format!("quality tier '{other}'"))),
        }
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

// ---------------------------------------------------------------------------
// Image targets
// ---------------------------------------------------------------------------

/// Container formats the image converter can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTarget {
    Jpeg,
    Png,
    Bmp,
    Gif,
    Tiff,
    WebP,
    Ico,
    Pdf,
    Eps,
}

impl ImageTarget {
    /// The extension written for this target, regardless of what the caller asked for.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::WebP => "webp",
            Self::Ico => "ico",
            Self::Pdf => "pdf",
            Self::Eps => "eps",
        }
    }
}

impl FromStr for ImageTarget {
    type Err = FilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "bmp" => Ok(Self::Bmp),
            "gif" => Ok(Self::Gif),
            "tif" | "tiff" => Ok(Self::Tiff),
            "webp" => Ok(Self::WebP),
            "ico" => Ok(Self::Ico),
            "pdf" => Ok(Self::Pdf),
            "eps" => Ok(Self::Eps),
            other => Err(FilyError::UnsupportedFormat(format!("image target '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// One single-file conversion, immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub original_filename: String,
    pub requested_format_family: FormatFamily,
    pub password: Option<String>,
    pub quality: Quality,
}

impl ConversionRequest {
    /// Build a request, classifying the family from the original filename.
    ///
    /// Uploads are usually stored under generated names, so the user-facing
    /// filename is authoritative; the input path's own extension is only
    /// consulted when the original name has none.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        original_filename: impl Into<String>,
    ) -> Self {
        let input_path = input_path.into();
        let original_filename = original_filename.into();
        let mut family = FormatFamily::classify(&original_filename);
        if family == FormatFamily::Unsupported && Path::new(&original_filename).extension().is_none()
        {
            family = FormatFamily::classify(&input_path);
        }
        Self {
            input_path,
            output_path: output_path.into(),
            original_filename,
            requested_format_family: family,
            password: None,
            quality: Quality::default(),
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Lowercased extension of the original filename, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.original_filename)
            .extension()
            .or_else(|| self.input_path.extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Result of one conversion request. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<ErrorKind>,
    /// Caller-safe explanation of a failure.
    pub message: Option<String>,
}

impl ConversionOutcome {
    pub fn succeeded(output_path: PathBuf) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            error: None,
            message: None,
        }
    }

    pub fn failed(err: &FilyError) -> Self {
        let human = crate::human_errors::humanize_error(err);
        Self {
            success: false,
            output_path: None,
            error: Some(err.kind()),
            message: Some(human.message),
        }
    }
}

/// Inputs of a PDF merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMergeSpec {
    /// Input PDFs, order significant.
    pub ordered_paths: Vec<PathBuf>,
    /// Optional zero-based reordering of `ordered_paths`.
    pub order: Option<Vec<usize>>,
    /// Passwords for encrypted inputs, keyed by path.
    pub passwords: HashMap<PathBuf, String>,
}

impl BatchMergeSpec {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            ordered_paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_order(mut self, order: Option<Vec<usize>>) -> Self {
        self.order = order;
        self
    }

    pub fn with_password(mut self, path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        self.passwords.insert(path.into(), password.into());
        self
    }

    /// Resolve the effective processing order.
    ///
    /// An explicit order is honoured only when it is a permutation of the
    /// input indices; anything else falls back to the caller-supplied order.
    pub fn resolved_paths(&self) -> Vec<PathBuf> {
        let Some(order) = &self.order else {
            return self.ordered_paths.clone();
        };

        let count = self.ordered_paths.len();
        let mut seen = vec![false; count];
        let is_permutation = order.len() == count
            && order.iter().all(|&idx| {
                idx < count && !std::mem::replace(&mut seen[idx], true)
            });

        if is_permutation {
            order.iter().map(|&idx| self.ordered_paths[idx].clone()).collect()
        } else {
            tracing::warn!(?order, count, "invalid merge order, keeping original order");
            self.ordered_paths.clone()
        }
    }
}

/// Inputs of a single image format conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConversionSpec {
    pub source_path: PathBuf,
    pub target_format: ImageTarget,
    /// 0..=100; ignored by containers without a quality parameter.
    pub quality: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(FormatFamily::classify("Report.DOCX"), FormatFamily::WordLike);
        assert_eq!(FormatFamily::classify("sheet.Xlsx"), FormatFamily::SpreadsheetLike);
        assert_eq!(FormatFamily::from_extension(".PDF"), FormatFamily::PdfPassthrough);
    }

    #[test]
    fn classify_every_family() {
        let cases = [
            ("a.pptx", FormatFamily::PresentationLike),
            ("a.jpeg", FormatFamily::Image),
            ("a.txt", FormatFamily::PlainText),
            ("a.csv", FormatFamily::DelimitedText),
            ("a.odt", FormatFamily::OfficeLegacy),
            ("a.htm", FormatFamily::Markup),
            ("a.xml", FormatFamily::Markup),
            ("a.json", FormatFamily::StructuredData),
            ("a.md", FormatFamily::Markdown),
            ("a.py", FormatFamily::SourceCode),
        ];
        for (name, family) in cases {
            assert_eq!(FormatFamily::classify(name), family, "{name}");
        }
    }

    #[test]
    fn unknown_and_missing_extensions_are_unsupported() {
        assert_eq!(FormatFamily::classify("archive.7z"), FormatFamily::Unsupported);
        assert_eq!(FormatFamily::classify("README"), FormatFamily::Unsupported);
    }

    #[test]
    fn family_name_matches_serde() {
        let json = serde_json::to_string(&FormatFamily::SpreadsheetLike).unwrap();
        assert_eq!(json, "\"spreadsheet-like\"");
        assert_eq!(FormatFamily::SpreadsheetLike.name(), "spreadsheet-like");
    }

    #[test]
    fn request_prefers_original_filename() {
        let req = ConversionRequest::new("/tmp/1234.bin", "/tmp/out.pdf", "notes.md");
        assert_eq!(req.requested_format_family, FormatFamily::Markdown);

        let req = ConversionRequest::new("/tmp/1234.csv", "/tmp/out.pdf", "untitled");
        assert_eq!(req.requested_format_family, FormatFamily::DelimitedText);
    }

    #[test]
    fn empty_password_is_dropped() {
        let req = ConversionRequest::new("a.txt", "a.pdf", "a.txt").with_password(Some(String::new()));
        assert!(req.password.is_none());
    }

    #[test]
    fn image_target_parsing() {
        assert_eq!("JPG".parse::<ImageTarget>().unwrap(), ImageTarget::Jpeg);
        assert_eq!("tif".parse::<ImageTarget>().unwrap().extension(), "tiff");
        assert!("heic".parse::<ImageTarget>().is_err());
    }

    #[test]
    fn merge_order_applied_when_permutation() {
        let spec = BatchMergeSpec::new(["a.pdf", "b.pdf", "c.pdf"]).with_order(Some(vec![2, 0, 1]));
        let resolved = spec.resolved_paths();
        assert_eq!(
            resolved,
            vec![PathBuf::from("c.pdf"), PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]
        );
    }

    #[test]
    fn merge_order_ignored_when_invalid() {
        let original = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
        for bad in [vec![0, 5], vec![0, 0], vec![1]] {
            let spec = BatchMergeSpec::new(original.clone()).with_order(Some(bad));
            assert_eq!(spec.resolved_paths(), original);
        }
    }

    #[test]
    fn quality_maps_to_larger_page_for_high() {
        let (hw, hh) = Quality::High.paper_size().dimensions_mm();
        let (sw, sh) = Quality::Standard.paper_size().dimensions_mm();
        assert!(hw * hh > sw * sh);
    }
}
