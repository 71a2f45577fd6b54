// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-image composer: one centred, fitted image per page.

use std::path::{Path, PathBuf};

use fily_core::error::{FilyError, Result};
use fily_core::types::Quality;
use tracing::{info, instrument, warn};

use super::processor::ImageProcessor;
use crate::output::write_atomically;
use crate::pdf::PdfWriter;

/// Total margin (both sides together) around each image, in points.
pub const PAGE_MARGIN_PT: f32 = 72.0;

/// Compose `paths` into a PDF at `output`, one page per readable image.
///
/// The paper size comes from the quality tier. Unreadable images are skipped;
/// the call fails with `InvalidBatchInput` when none could be drawn.
#[instrument(skip_all, fields(inputs = paths.len(), ?quality, output = %output.as_ref().display()))]
pub fn images_to_pdf(paths: &[PathBuf], output: impl AsRef<Path>, quality: Quality) -> Result<usize> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        match ImageProcessor::open(path) {
            Ok(processor) => images.push(processor.flatten_onto_white()),
            Err(err) => warn!(path = %path.display(), %err, "skipping image"),
        }
    }

    if images.is_empty() {
        return Err(FilyError::InvalidBatchInput(format!(
            "none of the {} images could be read",
            paths.len()
        )));
    }

    let mut writer = PdfWriter::new(quality.paper_size());
    writer.set_title("Fily Images");
    let bytes = writer.fitted_image_pages(&images, PAGE_MARGIN_PT);
    write_atomically(output.as_ref(), &bytes)?;

    info!(pages = images.len(), skipped = paths.len() - images.len(), "Images composed");
    Ok(images.len())
}
