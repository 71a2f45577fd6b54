// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image format conversion between raster containers (plus PDF and EPS).

use std::path::{Path, PathBuf};

use fily_core::error::Result;
use fily_core::types::{ImageConversionSpec, ImageTarget};
use image::ImageFormat;
use tracing::{info, instrument};

use super::processor::{ICO_MAX_DIMENSION, ImageProcessor, target_color_mode};
use crate::output::write_atomically;
use crate::pdf::PdfWriter;

/// Output path with the extension forced to match `target`.
pub fn resolve_output_path(requested: &Path, target: ImageTarget) -> PathBuf {
    requested.with_extension(target.extension())
}

/// Convert `spec.source_path` into `spec.target_format`, writing next to
/// `requested_output` with the target's own extension.
///
/// Returns the path actually written.
#[instrument(skip_all, fields(
    source = %spec.source_path.display(),
    target = ?spec.target_format,
    quality = spec.quality,
))]
pub fn convert_image(spec: &ImageConversionSpec, requested_output: impl AsRef<Path>) -> Result<PathBuf> {
    let output = resolve_output_path(requested_output.as_ref(), spec.target_format);
    let target = spec.target_format;

    let mut processor = ImageProcessor::open(&spec.source_path)?;
    if target == ImageTarget::Ico {
        processor = processor.fit_within(ICO_MAX_DIMENSION, ICO_MAX_DIMENSION);
    }
    let processor = processor.apply_color_mode(target_color_mode(target));

    let bytes = match target {
        ImageTarget::Jpeg => processor.to_jpeg_bytes(spec.quality)?,
        ImageTarget::Png => processor.to_png_bytes(spec.quality)?,
        ImageTarget::Bmp => processor.to_format_bytes(ImageFormat::Bmp)?,
        ImageTarget::Gif => processor.to_format_bytes(ImageFormat::Gif)?,
        ImageTarget::Tiff => processor.to_format_bytes(ImageFormat::Tiff)?,
        ImageTarget::WebP => processor.to_format_bytes(ImageFormat::WebP)?,
        ImageTarget::Ico => processor.to_format_bytes(ImageFormat::Ico)?,
        ImageTarget::Pdf => PdfWriter::a4().native_image_pdf(&processor.flatten_onto_white()),
        ImageTarget::Eps => processor.to_eps_bytes(),
    };

    write_atomically(&output, &bytes)?;
    info!(output = %output.display(), bytes = bytes.len(), "Image converted");
    Ok(output)
}
