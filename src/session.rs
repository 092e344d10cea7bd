//! Per-file editing session
//!
//! A session records how a file was classified and how it must be written
//! back. Classification facts (spreadsheet link, separator) are fixed at
//! construction; only the table and the dirty flag change afterwards.

use crate::error::BridgeResult;
use crate::separator::Separator;
use crate::table::Table;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Round-trip linkage of a spreadsheet-class session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetLink {
    /// Original extension, drives reverse conversion
    pub extension: String,
    /// Delimited copy the table was loaded from and is exported to
    pub temp_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Clean,
    Dirty,
}

#[derive(Debug, Clone)]
pub struct Session {
    source_path: PathBuf,
    spreadsheet: Option<SpreadsheetLink>,
    separator: Separator,
    table: Table,
    dirty: bool,
}

impl Session {
    /// Session for a delimited text file
    pub(crate) fn delimited(source_path: PathBuf, separator: Separator, table: Table) -> Self {
        Self {
            source_path,
            spreadsheet: None,
            separator,
            table,
            dirty: false,
        }
    }

    /// Session for a spreadsheet; the separator is always comma
    pub(crate) fn spreadsheet(source_path: PathBuf, link: SpreadsheetLink, table: Table) -> Self {
        Self {
            source_path,
            spreadsheet: Some(link),
            separator: Separator::Comma,
            table,
            dirty: false,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn is_spreadsheet(&self) -> bool {
        self.spreadsheet.is_some()
    }

    pub fn spreadsheet_link(&self) -> Option<&SpreadsheetLink> {
        self.spreadsheet.as_ref()
    }

    pub fn spreadsheet_extension(&self) -> Option<&str> {
        self.spreadsheet.as_ref().map(|link| link.extension.as_str())
    }

    pub fn temp_path(&self) -> Option<&Path> {
        self.spreadsheet.as_ref().map(|link| link.temp_path.as_path())
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn status(&self) -> SessionStatus {
        if self.dirty {
            SessionStatus::Dirty
        } else {
            SessionStatus::Clean
        }
    }

    /// Set one cell and mark the session dirty
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> BridgeResult<()> {
        self.table.set(row, col, value)?;
        self.dirty = true;
        Ok(())
    }

    /// Apply an arbitrary edit to the table and mark the session dirty
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Table) -> R) -> R {
        self.dirty = true;
        f(&mut self.table)
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            source_path: self.source_path.clone(),
            kind: if self.is_spreadsheet() {
                "spreadsheet"
            } else {
                "delimited"
            },
            extension: self.spreadsheet_extension().map(str::to_string),
            temp_path: self.temp_path().map(Path::to_path_buf),
            separator: self.separator,
            status: self.status(),
            rows: self.table.row_count(),
            columns: self.table.column_count(),
        }
    }
}

/// Serializable snapshot of a session, for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub source_path: PathBuf,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_path: Option<PathBuf>,
    pub separator: Separator,
    pub status: SessionStatus,
    pub rows: usize,
    pub columns: usize,
}
