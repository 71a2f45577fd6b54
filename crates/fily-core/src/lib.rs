// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fily: core types, error definitions and shared job state used by all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod progress;
pub mod types;

pub use config::ConverterConfig;
pub use error::{ErrorKind, FilyError, Stage};
pub use progress::{Phase, ProgressState, ProgressTracker};
pub use types::*;
