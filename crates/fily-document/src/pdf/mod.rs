// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: laying out new documents and merging existing ones.

pub mod merge;
pub mod writer;

pub use merge::{MergeReport, merge_pdfs};
pub use writer::{Block, PdfWriter};
