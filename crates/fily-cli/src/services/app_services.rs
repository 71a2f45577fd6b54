// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: builds the converter from configuration and runs
// conversion jobs for the command handlers.
//
// The conversion pipeline is blocking (file I/O, subprocess waits), so each
// job runs on Tokio's blocking pool. All jobs share one converter and one
// progress tracker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fily_core::error::Result;
use fily_core::types::{ConversionOutcome, ConversionRequest, JobId};
use fily_core::{ConverterConfig, ProgressTracker};
use fily_document::Converter;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::config_dir;

/// Environment variable naming the office engine binary.
pub const ENGINE_ENV: &str = "FILY_ENGINE";

/// Shared services, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct AppServices {
    converter: Arc<Converter>,
    progress: ProgressTracker,
}

/// One finished job as reported to the user.
#[derive(Debug, serde::Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: ConversionOutcome,
    pub duration_ms: Option<u128>,
}

impl AppServices {
    /// Load configuration and build the converter.
    ///
    /// An explicit `config_path` must exist. Without one, the per-user config
    /// file is used when present. `engine` overrides the configured binary.
    pub fn init(config_path: Option<&Path>, engine: Option<PathBuf>, no_engine: bool) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => ConverterConfig::load(path)?,
            None => load_user_config().unwrap_or_default(),
        };
        if let Some(binary) = engine {
            debug!(binary = %binary.display(), "engine override");
            config.engine_binary = binary;
        }
        if no_engine {
            config.engine_enabled = false;
        }

        let progress = ProgressTracker::new();
        let converter = Converter::new(config).with_progress(progress.clone());
        info!(engine = converter.engine().name(), "services initialised");

        Ok(Self {
            converter: Arc::new(converter),
            progress,
        })
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn config(&self) -> &ConverterConfig {
        self.converter.config()
    }

    // -- Conversion ----------------------------------------------------------

    /// Run `requests` with at most `parallel` jobs in flight. Reports come
    /// back in request order.
    pub async fn convert_all(&self, requests: Vec<ConversionRequest>, parallel: usize) -> Vec<JobReport> {
        let permits = Arc::new(Semaphore::new(parallel.max(1)));
        let mut handles = Vec::with_capacity(requests.len());

        for request in requests {
            let services = self.clone();
            let permits = Arc::clone(&permits);
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let job_id = JobId::new();
                let input = request.input_path.clone();
                let worker = services.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    worker.converter.convert_tracked(job_id, &request)
                })
                .await;
                services.report(job_id, input, outcome)
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => warn!(error = %err, "conversion task failed to join"),
            }
        }
        reports
    }

    fn report(
        &self,
        job_id: JobId,
        input: PathBuf,
        outcome: std::result::Result<ConversionOutcome, tokio::task::JoinError>,
    ) -> JobReport {
        let outcome = outcome.unwrap_or_else(|err| {
            warn!(%job_id, error = %err, "conversion worker panicked");
            ConversionOutcome::failed(&fily_core::FilyError::render("internal error"))
        });
        let duration_ms = self
            .progress
            .remove(job_id)
            .map(|state| state.duration().as_millis());
        JobReport {
            job_id,
            input,
            outcome,
            duration_ms,
        }
    }
}

/// `<config dir>/fily/config.json`, if it exists and parses.
fn load_user_config() -> Option<ConverterConfig> {
    let path = config_dir::config_file();
    if !path.is_file() {
        return None;
    }
    match ConverterConfig::load(&path) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable user config");
            None
        }
    }
}
