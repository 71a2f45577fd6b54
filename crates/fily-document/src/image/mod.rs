// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: colour normalisation, container conversion and
// multi-image composition.

pub mod compose;
pub mod convert;
pub mod processor;

pub use compose::images_to_pdf;
pub use convert::convert_image;
pub use processor::{ColorMode, ImageProcessor, target_color_mode};
