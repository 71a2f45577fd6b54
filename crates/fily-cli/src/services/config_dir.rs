// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware configuration directory resolution.

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// Return the Fily configuration directory. It is not created.
pub fn config_dir() -> PathBuf {
    base_dir().join("fily")
}

/// Path of the per-user converter configuration file.
pub fn config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

fn base_dir() -> PathBuf {
    // Try XDG config dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    PathBuf::from(".")
}
