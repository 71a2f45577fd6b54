// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for callers of the conversion engine.
//
// Technical errors carry paths, engine exit codes and parser details. None of
// that may reach the person who uploaded the file, so every error is mapped to
// plain English with a suggestion and a severity that drives presentation.

use crate::error::{FilyError, Stage};

/// Severity of an error from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Engine timeout or busy machine. Trying again may work.
    Transient,
    /// The caller must do something (supply a password, pick another file).
    ActionRequired,
    /// Retrying will not help: wrong format or a damaged file.
    Permanent,
}

/// A caller-safe error with a plain English message and a suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the caller should try next.
    pub suggestion: String,
    /// Severity level.
    pub severity: Severity,
}

/// Convert a `FilyError` into a message that contains no internal detail.
pub fn humanize_error(err: &FilyError) -> HumanError {
    match err {
        FilyError::UnsupportedFormat(_) => HumanError {
            message: "This file type isn't supported.".into(),
            suggestion: "Try saving the file as PDF, DOCX, XLSX, PNG or plain text first.".into(),
            severity: Severity::Permanent,
        },

        FilyError::InputNotFound(_) => HumanError {
            message: "The uploaded file couldn't be found.".into(),
            suggestion: "It may have expired. Please upload it again.".into(),
            severity: Severity::ActionRequired,
        },

        FilyError::EngineUnavailable(_) => HumanError {
            message: "The document converter isn't available right now.".into(),
            suggestion: "Try again later, or convert a PDF, image or text file instead.".into(),
            severity: Severity::Transient,
        },

        FilyError::EngineTimeout(_) => HumanError {
            message: "The conversion took too long.".into(),
            suggestion: "Large or complex documents can time out. Try a smaller file.".into(),
            severity: Severity::Transient,
        },

        FilyError::RenderFailure { stage, .. } => match stage {
            Stage::Read => HumanError {
                message: "We couldn't read this file.".into(),
                suggestion: "The file may be damaged, too large, or saved in an older format. \
                             Try re-saving it and uploading again."
                    .into(),
                severity: Severity::Permanent,
            },
            Stage::Render => HumanError {
                message: "We couldn't convert this file to PDF.".into(),
                suggestion: "Try re-saving the file in a more common format.".into(),
                severity: Severity::Permanent,
            },
            Stage::Write => HumanError {
                message: "The converted PDF couldn't be saved.".into(),
                suggestion: "Try again. If this keeps happening the server may be out of space."
                    .into(),
                severity: Severity::Transient,
            },
        },

        FilyError::EncryptionFailure(_) => HumanError {
            message: "The password couldn't be applied to your PDF.".into(),
            suggestion: "Try again, or convert without a password.".into(),
            severity: Severity::Transient,
        },

        FilyError::InvalidBatchInput(_) => HumanError {
            message: "Not enough usable files for this operation.".into(),
            suggestion: "Add more files, and supply passwords for any protected PDFs.".into(),
            severity: Severity::ActionRequired,
        },

        FilyError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The uploaded file couldn't be found.".into(),
                    suggestion: "It may have expired. Please upload it again.".into(),
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, please report it.".into(),
                    severity: Severity::Transient,
                }
            }
        }

        FilyError::Serialization(_) => HumanError {
            message: "The file's data couldn't be processed.".into(),
            suggestion: "Check the file is valid, then try again.".into(),
            severity: Severity::Permanent,
        },
    }
}
