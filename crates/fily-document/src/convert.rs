// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion dispatcher.
//
// Each request walks Initializing → Converting → {Completed, Failed}. The
// format family picks a strategy from a fixed table: office formats try the
// primary engine and escalate once to an in-process fallback, everything
// else goes straight to its fallback, and PDFs are copied through. A password
// is applied last; if protection fails the unprotected output is removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fily_core::config::ConverterConfig;
use fily_core::error::{FilyError, Result};
use fily_core::human_errors::humanize_error;
use fily_core::progress::{Phase, ProgressTracker};
use fily_core::types::{
    BatchMergeSpec, ConversionOutcome, ConversionRequest, FormatFamily, ImageConversionSpec, JobId,
    Quality,
};
use fily_security::{PasswordProtector, hash_file};
use tracing::{debug, info, instrument, warn};

use crate::engine::{DocumentEngine, HeadlessOfficeEngine, NoEngine};
use crate::image::{convert_image, images_to_pdf};
use crate::output::write_atomically;
use crate::pdf::merge_pdfs;
use crate::render::{FallbackKind, RenderOptions, render_fallback};

/// How a format family is turned into a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Primary engine first; on failure, the fallback if there is one.
    Engine { fallback: Option<FallbackKind> },
    /// In-process renderer only.
    Fallback(FallbackKind),
    /// Input is already a PDF; copy it.
    Passthrough,
}

impl RenderStrategy {
    /// Dispatch table. `None` means the family cannot be converted.
    pub fn for_family(family: FormatFamily, extension: Option<&str>) -> Option<Self> {
        let strategy = match family {
            FormatFamily::Unsupported => return None,
            FormatFamily::PdfPassthrough => Self::Passthrough,
            family if family.uses_engine() => Self::Engine {
                fallback: FallbackKind::for_family(family, extension),
            },
            family => Self::Fallback(FallbackKind::for_family(family, extension)?),
        };
        Some(strategy)
    }
}

/// Runs conversion requests against one configuration, engine and progress
/// store. Cheap to share across threads behind an `Arc`.
pub struct Converter {
    config: ConverterConfig,
    engine: Arc<dyn DocumentEngine>,
    progress: ProgressTracker,
}

impl Converter {
    /// Build a converter whose engine follows `config.engine_enabled`.
    pub fn new(config: ConverterConfig) -> Self {
        let engine: Arc<dyn DocumentEngine> = if config.engine_enabled {
            Arc::new(HeadlessOfficeEngine::from_config(&config))
        } else {
            Arc::new(NoEngine)
        };
        Self::with_engine(config, engine)
    }

    pub fn with_engine(config: ConverterConfig, engine: Arc<dyn DocumentEngine>) -> Self {
        Self {
            config,
            engine,
            progress: ProgressTracker::new(),
        }
    }

    /// Report into an existing tracker instead of a private one.
    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn engine(&self) -> &dyn DocumentEngine {
        self.engine.as_ref()
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    // -- Single-file conversion -----------------------------------------------

    /// Convert under a fresh job id.
    pub fn convert(&self, request: &ConversionRequest) -> ConversionOutcome {
        self.convert_tracked(JobId::new(), request)
    }

    /// Convert, reporting progress under `job_id`. Never panics; every
    /// failure is folded into the outcome.
    #[instrument(skip_all, fields(%job_id, family = %request.requested_format_family))]
    pub fn convert_tracked(&self, job_id: JobId, request: &ConversionRequest) -> ConversionOutcome {
        self.progress.start(job_id);
        match self.run(job_id, request) {
            Ok(output) => {
                self.progress.complete(job_id, true, "Conversion complete");
                ConversionOutcome::succeeded(output)
            }
            Err(err) => {
                warn!(kind = ?err.kind(), %err, "conversion failed");
                self.progress
                    .complete(job_id, false, humanize_error(&err).message);
                ConversionOutcome::failed(&err)
            }
        }
    }

    fn run(&self, job_id: JobId, request: &ConversionRequest) -> Result<PathBuf> {
        let family = request.requested_format_family;
        let extension = request.extension();
        let strategy = RenderStrategy::for_family(family, extension.as_deref()).ok_or_else(|| {
            FilyError::UnsupportedFormat(format!(
                "'.{}' files",
                extension.as_deref().unwrap_or_default()
            ))
        })?;

        self.check_input(&request.input_path)?;
        check_distinct_output(&request.input_path, &request.output_path)?;
        self.progress
            .update(job_id, 10, Phase::Converting, format!("Detected {family}"));

        let output = request.output_path.as_path();
        let options = RenderOptions {
            paper: request.quality.paper_size(),
            font_size_pt: self.config.body_font_size_pt,
            source_name: request.original_filename.clone(),
        };
        debug!(?strategy, "dispatching");

        match strategy {
            RenderStrategy::Passthrough => {
                let bytes = std::fs::read(&request.input_path)
                    .map_err(|err| FilyError::read(format!("cannot read PDF: {err}")))?;
                write_atomically(output, &bytes)?;
            }
            RenderStrategy::Fallback(kind) => {
                self.progress
                    .update(job_id, 50, Phase::Converting, "Rendering document");
                render_fallback(kind, &request.input_path, output, &options)?;
            }
            RenderStrategy::Engine { fallback } => {
                self.progress.update(
                    job_id,
                    20,
                    Phase::Converting,
                    format!("Converting with {}", self.engine.name()),
                );
                if let Err(engine_err) = self.engine.convert(&request.input_path, output) {
                    let Some(kind) = fallback else {
                        return Err(FilyError::render(format!(
                            "{family} needs the document engine: {engine_err}"
                        )));
                    };
                    warn!(%engine_err, ?kind, "engine failed, using fallback renderer");
                    self.progress
                        .update(job_id, 50, Phase::Converting, "Using built-in renderer");
                    render_fallback(kind, &request.input_path, output, &options)?;
                }
            }
        }

        if let Some(password) = &request.password {
            self.progress
                .update(job_id, 80, Phase::Converting, "Applying password");
            if let Err(err) = PasswordProtector::new(password.as_str()).protect(output) {
                let _ = std::fs::remove_file(output);
                return Err(match err {
                    FilyError::EncryptionFailure(_) => err,
                    other => FilyError::EncryptionFailure(other.to_string()),
                });
            }
        }

        match hash_file(output) {
            Ok(sha256) => info!(output = %output.display(), %sha256, "Conversion complete"),
            Err(err) => warn!(%err, "could not fingerprint output"),
        }
        Ok(output.to_path_buf())
    }

    /// Input must exist, be a regular file and fit the size limit.
    fn check_input(&self, input: &Path) -> Result<()> {
        let metadata = match std::fs::metadata(input) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(FilyError::InputNotFound(input.to_path_buf())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FilyError::InputNotFound(input.to_path_buf()));
            }
            Err(err) => return Err(FilyError::read(format!("cannot stat input: {err}"))),
        };
        if metadata.len() > self.config.max_input_bytes {
            return Err(FilyError::read(format!(
                "input is {} bytes, limit is {}",
                metadata.len(),
                self.config.max_input_bytes
            )));
        }
        Ok(())
    }

    // -- Batch and image entry points -----------------------------------------

    pub fn merge(&self, spec: &BatchMergeSpec, output: &Path) -> ConversionOutcome {
        outcome(merge_pdfs(spec, output).map(|_| output.to_path_buf()))
    }

    pub fn images_to_pdf(&self, paths: &[PathBuf], output: &Path, quality: Quality) -> ConversionOutcome {
        outcome(images_to_pdf(paths, output, quality).map(|_| output.to_path_buf()))
    }

    pub fn convert_image(&self, spec: &ImageConversionSpec, output: &Path) -> ConversionOutcome {
        outcome(convert_image(spec, output))
    }
}

/// The output may never overwrite the input it is made from.
fn check_distinct_output(input: &Path, output: &Path) -> Result<()> {
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(input), Ok(output)) => input == output,
        _ => input == output,
    };
    if same {
        return Err(FilyError::write(format!(
            "output {} would overwrite the input",
            output.display()
        )));
    }
    Ok(())
}

fn outcome(result: Result<PathBuf>) -> ConversionOutcome {
    match result {
        Ok(path) => ConversionOutcome::succeeded(path),
        Err(err) => {
            warn!(kind = ?err.kind(), %err, "operation failed");
            ConversionOutcome::failed(&err)
        }
    }
}
