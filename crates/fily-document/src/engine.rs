// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Primary rendering engine: an external headless office suite invoked as
//
//   <engine> --headless --convert-to pdf --outdir <dir> <input>
//
// The engine names its output after the input stem, so every call gets a
// private output directory next to the final artifact. That keeps concurrent
// jobs with identical stems apart and lets the final move be a rename.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use fily_core::config::ConverterConfig;
use fily_core::error::{FilyError, Result};
use tracing::{debug, info, instrument, warn};

use crate::output::{move_into_place, parent_dir};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that can turn an office document into a PDF.
pub trait DocumentEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Render `input` to a PDF at exactly `output`.
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;

    /// Whether the engine looks usable on this machine.
    fn probe(&self) -> bool;
}

/// Headless office suite (LibreOffice / soffice) driven as a subprocess.
pub struct HeadlessOfficeEngine {
    binary: PathBuf,
    timeout: Duration,
}

impl HeadlessOfficeEngine {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.engine_binary.clone(), config.engine_timeout())
    }

    fn command(&self, input: &Path, outdir: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(outdir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Run the child to completion or kill it at the deadline.
    fn run(&self, mut cmd: Command) -> Result<()> {
        let mut child = cmd.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => FilyError::EngineUnavailable(format!(
                "{} not found",
                self.binary.display()
            )),
            _ => FilyError::EngineUnavailable(format!("cannot start engine: {err}")),
        })?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => {
                    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "engine exited");
                    return Ok(());
                }
                Ok(Some(status)) => {
                    return Err(FilyError::render(format!("engine exited with {status}")));
                }
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        warn!(timeout_secs = self.timeout.as_secs(), "engine timed out, killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(FilyError::EngineTimeout(self.timeout));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(FilyError::render(format!("waiting for engine: {err}")));
                }
            }
        }
    }
}

impl DocumentEngine for HeadlessOfficeEngine {
    fn name(&self) -> &str {
        "headless-office"
    }

    #[instrument(skip_all, fields(engine = %self.binary.display(), input = %input.display()))]
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let outdir = tempfile::Builder::new()
            .prefix(".fily-engine-")
            .tempdir_in(parent_dir(output))
            .map_err(|err| FilyError::write(format!("engine output directory: {err}")))?;

        self.run(self.command(input, outdir.path()))?;

        let stem = input
            .file_stem()
            .ok_or_else(|| FilyError::read("input has no file name"))?;
        let mut produced_name = stem.to_os_string();
        produced_name.push(".pdf");
        let produced = outdir.path().join(produced_name);
        if !produced.is_file() {
            return Err(FilyError::render("engine reported success but wrote no PDF"));
        }

        move_into_place(&produced, output)?;
        info!(output = %output.display(), "engine conversion complete");
        Ok(())
    }

    fn probe(&self) -> bool {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let available = self.run(cmd).is_ok();
        debug!(binary = %self.binary.display(), available, "engine probe");
        available
    }
}

/// Engine stand-in used when the primary engine is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEngine;

impl DocumentEngine for NoEngine {
    fn name(&self) -> &str {
        "none"
    }

    fn convert(&self, _input: &Path, _output: &Path) -> Result<()> {
        Err(FilyError::EngineUnavailable("primary engine disabled".into()))
    }

    fn probe(&self) -> bool {
        false
    }
}
