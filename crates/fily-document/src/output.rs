// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact output. Every produced file is written to a temporary sibling and
// renamed into place, so the final path holds either nothing or a complete
// document.

use std::io::Write;
use std::path::Path;

use fily_core::error::{FilyError, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// Directory that holds `path`, `.` for bare filenames.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|err| FilyError::write(format!("create output directory: {err}")))?;
    }

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|err| FilyError::write(format!("temp file: {err}")))?;
    temp.write_all(bytes)
        .and_then(|()| temp.flush())
        .map_err(|err| FilyError::write(format!("write: {err}")))?;
    temp.persist(path)
        .map_err(|err| FilyError::write(format!("rename: {}", err.error)))?;

    debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}

/// Move a finished file onto `path`, falling back to copy-then-rename when
/// the source lives on another filesystem.
pub(crate) fn move_into_place(source: &Path, path: &Path) -> Result<()> {
    if std::fs::rename(source, path).is_ok() {
        return Ok(());
    }
    let bytes = std::fs::read(source)
        .map_err(|err| FilyError::write(format!("read engine output: {err}")))?;
    write_atomically(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_complete_file_and_no_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        write_atomically(&path, b"%PDF-1.5 body").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5 body");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.pdf");
        write_atomically(&path, b"x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn bare_filename_parent_is_cwd() {
        assert_eq!(parent_dir(Path::new("out.pdf")), Path::new("."));
    }
}
