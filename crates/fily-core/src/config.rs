// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Converter configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::Quality;

/// Settings shared by every conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Headless office engine binary (looked up on `PATH` when relative).
    pub engine_binary: PathBuf,
    /// Whether the primary engine is tried at all.
    pub engine_enabled: bool,
    /// Hard limit on one engine invocation, in seconds.
    pub engine_timeout_secs: u64,
    /// Quality tier used when a request does not name one.
    pub default_quality: Quality,
    /// Inputs larger than this are refused before rendering.
    pub max_input_bytes: u64,
    /// Body font size of the in-process renderers, in points.
    pub body_font_size_pt: f32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            engine_binary: PathBuf::from("libreoffice"),
            engine_enabled: true,
            engine_timeout_secs: 60,
            default_quality: Quality::High,
            max_input_bytes: 50 * 1024 * 1024,
            body_font_size_pt: 11.0,
        }
    }
}

impl ConverterConfig {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        info!(path = %path.as_ref().display(), "loaded converter config");
        debug!(?config, "effective config");
        Ok(config)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}
