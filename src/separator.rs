//! Field separator detection for delimited text files

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header lines skipped before sampling, unless configured otherwise
pub const DEFAULT_HEADER_LINES: usize = 1;

/// Field separator of a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    Tab,
    Comma,
    Space,
}

impl Separator {
    pub fn char(self) -> char {
        match self {
            Separator::Tab => '\t',
            Separator::Comma => ',',
            Separator::Space => ' ',
        }
    }

    pub fn byte(self) -> u8 {
        self.char() as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Separator::Tab => "tab",
            Separator::Comma => "comma",
            Separator::Space => "space",
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Infers the separator of delimited text from its lines.
///
/// After skipping `header_lines`, the separator is TAB if every sampled line
/// contains a tab, else COMMA if every sampled line contains a comma, else
/// SPACE. Commas inside quoted fields are counted like any other comma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparatorDetector {
    header_lines: usize,
    sample_limit: Option<usize>,
}

impl Default for SeparatorDetector {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_LINES)
    }
}

impl SeparatorDetector {
    pub fn new(header_lines: usize) -> Self {
        Self {
            header_lines,
            sample_limit: None,
        }
    }

    /// Inspect at most `limit` lines after the header
    pub fn with_sample_limit(mut self, limit: Option<usize>) -> Self {
        self.sample_limit = limit;
        self
    }

    pub fn header_lines(&self) -> usize {
        self.header_lines
    }

    pub fn detect(&self, content: &str) -> Separator {
        let mut sample = self.sample(content.lines().skip(self.header_lines));
        if sample.is_empty() {
            // Header-only file: the header is all there is to go on
            sample = self.sample(content.lines());
        }
        if sample.is_empty() {
            tracing::debug!("no sample lines, defaulting to comma");
            return Separator::Comma;
        }

        let separator = if sample.iter().all(|line| line.contains('\t')) {
            Separator::Tab
        } else if sample.iter().all(|line| line.contains(',')) {
            Separator::Comma
        } else {
            Separator::Space
        };

        tracing::debug!(
            lines = sample.len(),
            separator = %separator,
            "detected separator"
        );
        separator
    }

    fn sample<'a>(&self, lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let non_blank = lines.filter(|line| !line.is_empty());
        match self.sample_limit {
            Some(limit) => non_blank.take(limit).collect(),
            None => non_blank.collect(),
        }
    }
}
