// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! fily-security: post-processing that touches finished artifacts.
//!
//! Two concerns live here. The password protector applies the standard PDF
//! security handler to a produced PDF and swaps it into place atomically.
//! The integrity helpers fingerprint artifacts with SHA-256 for the job log.

pub mod integrity;
pub mod protect;

pub use integrity::{hash_bytes, hash_file};
pub use protect::PasswordProtector;
