//! File classification: spreadsheet-class vs delimited text
//!
//! Classification only looks at the path's extension. It never touches the
//! filesystem, so it is safe to call before any confirmation prompt.

use std::collections::BTreeSet;
use std::path::Path;

/// Extensions treated as spreadsheets when nothing else is configured
pub const DEFAULT_SPREADSHEET_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "ods"];

/// Result of classifying a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileClass {
    /// Binary spreadsheet; `extension` is lower-cased and drives reverse conversion
    Spreadsheet { extension: String },
    /// Delimited text (comma, tab or space separated)
    Delimited,
}

impl FileClass {
    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileClass::Spreadsheet { .. })
    }
}

/// Decides spreadsheet-class vs delimited-text-class from a file path
#[derive(Debug, Clone)]
pub struct FormatClassifier {
    extensions: BTreeSet<String>,
}

impl Default for FormatClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SPREADSHEET_EXTENSIONS)
    }
}

impl FormatClassifier {
    /// Create a classifier for the given spreadsheet extensions.
    ///
    /// Extensions are matched case-insensitively; a leading dot is ignored.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn classify(&self, path: &Path) -> FileClass {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension {
            Some(ext) if self.extensions.contains(&ext) => FileClass::Spreadsheet { extension: ext },
            _ => FileClass::Delimited,
        }
    }

    pub fn is_spreadsheet(&self, path: &Path) -> bool {
        self.classify(path).is_spreadsheet()
    }
}
