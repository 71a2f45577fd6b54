// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Fily.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where inside a renderer a failure happened.
///
/// The dispatcher only escalates engine failures to a fallback renderer; a
/// fallback's own read/render/write failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Read,
    Render,
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Render => "render",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// Top-level error type for all Fily operations.
#[derive(Debug, Error)]
pub enum FilyError {
    // -- Classification --
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    // -- Primary engine --
    #[error("rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("rendering engine timed out after {}s", .0.as_secs())]
    EngineTimeout(Duration),

    // -- Rendering --
    #[error("{stage} failure: {detail}")]
    RenderFailure { stage: Stage, detail: String },

    // -- Post-processing --
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    // -- Batch --
    #[error("invalid batch input: {0}")]
    InvalidBatchInput(String),

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FilyError {
    /// Shorthand for a read-stage render failure.
    pub fn read(detail: impl Into<String>) -> Self {
        Self::RenderFailure {
            stage: Stage::Read,
            detail: detail.into(),
        }
    }

    /// Shorthand for a render-stage failure.
    pub fn render(detail: impl Into<String>) -> Self {
        Self::RenderFailure {
            stage: Stage::Render,
            detail: detail.into(),
        }
    }

    /// Shorthand for a write-stage render failure.
    pub fn write(detail: impl Into<String>) -> Self {
        Self::RenderFailure {
            stage: Stage::Write,
            detail: detail.into(),
        }
    }

    /// Map this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::InputNotFound(_) => ErrorKind::InputNotFound,
            Self::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Self::EngineTimeout(_) => ErrorKind::EngineTimeout,
            Self::RenderFailure { .. } => ErrorKind::RenderFailure,
            Self::EncryptionFailure(_) => ErrorKind::EncryptionFailure,
            Self::InvalidBatchInput(_) => ErrorKind::InvalidBatchInput,
            Self::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::InputNotFound
            }
            Self::Io(_) | Self::Serialization(_) => ErrorKind::RenderFailure,
        }
    }
}

/// The closed error taxonomy reported to callers in a `ConversionOutcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    EngineUnavailable,
    EngineTimeout,
    RenderFailure,
    EncryptionFailure,
    InputNotFound,
    InvalidBatchInput,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FilyError>;
