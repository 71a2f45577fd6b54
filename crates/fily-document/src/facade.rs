// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One-call entry points with default settings, reporting plain success flags.
// Use `Converter` directly for a shared tracker, a custom engine or the
// failure detail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fily_core::config::ConverterConfig;
use fily_core::types::{BatchMergeSpec, ConversionRequest, ImageConversionSpec, ImageTarget, Quality};
use tracing::warn;

use crate::convert::Converter;
use crate::image::convert::resolve_output_path;

/// Convert one file to PDF. `quality` defaults to the configured tier.
pub fn convert(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    original_filename: &str,
    password: Option<&str>,
    quality: Option<Quality>,
) -> bool {
    let converter = Converter::new(ConverterConfig::default());
    let request = ConversionRequest::new(
        input_path.as_ref(),
        output_path.as_ref(),
        original_filename,
    )
    .with_password(password.map(str::to_owned))
    .with_quality(quality.unwrap_or(converter.config().default_quality));
    converter.convert(&request).success
}

/// Merge PDFs, optionally reordered and with per-file passwords.
pub fn merge(
    paths: &[PathBuf],
    output_path: impl AsRef<Path>,
    order: Option<Vec<usize>>,
    passwords: Option<HashMap<PathBuf, String>>,
) -> bool {
    let spec = BatchMergeSpec {
        ordered_paths: paths.to_vec(),
        order,
        passwords: passwords.unwrap_or_default(),
    };
    Converter::new(ConverterConfig::default())
        .merge(&spec, output_path.as_ref())
        .success
}

/// One fitted page per readable image.
pub fn images_to_pdf(paths: &[PathBuf], output_path: impl AsRef<Path>, quality: Quality) -> bool {
    Converter::new(ConverterConfig::default())
        .images_to_pdf(paths, output_path.as_ref(), quality)
        .success
}

/// Re-encode an image. Returns the success flag and the path actually
/// written, whose extension always matches `target_format`.
pub fn convert_image(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    target_format: &str,
    quality: u8,
) -> (bool, PathBuf) {
    let target = match target_format.parse::<ImageTarget>() {
        Ok(target) => target,
        Err(err) => {
            warn!(%err, "image conversion refused");
            return (false, output_path.as_ref().to_path_buf());
        }
    };
    let spec = ImageConversionSpec {
        source_path: input_path.as_ref().to_path_buf(),
        target_format: target,
        quality,
    };
    let outcome = Converter::new(ConverterConfig::default()).convert_image(&spec, output_path.as_ref());
    let resolved = outcome
        .output_path
        .unwrap_or_else(|| resolve_output_path(output_path.as_ref(), target));
    (outcome.success, resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_image_target_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.heic");
        let (ok, path) = convert_image(dir.path().join("in.png"), &output, "heic", 90);
        assert!(!ok);
        assert_eq!(path, output);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn convert_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!convert(
            dir.path().join("nope.txt"),
            dir.path().join("nope.pdf"),
            "nope.txt",
            None,
            None,
        ));
    }
}
