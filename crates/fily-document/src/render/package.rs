// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Office Open XML packages: docx / xlsx files are zip archives of XML parts.

use std::io::{Cursor, Read};

use fily_core::error::{FilyError, Result};
use zip::ZipArchive;
use zip::result::ZipError;

/// Local file header signature every zip archive starts with.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// An opened OOXML package held in memory.
pub(crate) struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    /// Open `bytes` as a package. Legacy binary formats (`.doc`, `.xls`) are
    /// compound files, not zips, and are refused here.
    pub(crate) fn open(bytes: Vec<u8>, legacy_name: &str) -> Result<Self> {
        if !bytes.starts_with(ZIP_MAGIC) {
            return Err(FilyError::read(format!(
                "not an Office Open XML package (legacy {legacy_name} needs the document engine)"
            )));
        }
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| FilyError::read(format!("corrupt package: {err}")))?;
        Ok(Self { archive })
    }

    /// Read a part as UTF-8 text; `None` when the part is absent.
    pub(crate) fn part(&mut self, name: &str) -> Result<Option<String>> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(FilyError::read(format!("package part {name}: {err}"))),
        };
        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|err| FilyError::read(format!("package part {name}: {err}")))?;
        Ok(Some(text))
    }

    /// Names of all parts, sorted.
    pub(crate) fn part_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.archive.file_names().map(str::to_owned).collect();
        names.sort();
        names
    }
}
