// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// fily-document: any-file-to-PDF conversion for Fily.
//
// Provides the conversion dispatcher, the headless office engine adapter,
// in-process fallback renderers, PDF layout and merging, and image format
// conversion and composition.

pub mod convert;
pub mod engine;
pub mod facade;
pub mod image;
mod output;
pub mod pdf;
pub mod render;

// Re-export the primary types so callers can use `fily_document::Converter` etc.
pub use convert::{Converter, RenderStrategy};
pub use engine::{DocumentEngine, HeadlessOfficeEngine, NoEngine};
pub use image::processor::ImageProcessor;
pub use pdf::merge::{MergeReport, merge_pdfs};
pub use pdf::writer::{Block, PdfWriter};
pub use render::{FallbackKind, RenderOptions, render_fallback};
