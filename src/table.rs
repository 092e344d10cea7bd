//! In-memory tabular content handed to the editing surface
//!
//! Rows are kept exactly as read: ragged rows stay ragged so that exporting
//! an unedited table reproduces the original text.

use crate::error::{BridgeError, BridgeResult};
use crate::separator::Separator;

/// Line terminator used when the table is exported again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Grid of string cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<String>>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl Default for Table {
    fn default() -> Self {
        Self::from_rows(Vec::new())
    }
}

impl Table {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            line_ending: LineEnding::Lf,
            trailing_newline: true,
        }
    }

    /// Parse delimited text.
    ///
    /// Comma-separated content follows RFC 4180 quoting. Tab and space
    /// separated content is split verbatim on the separator, which keeps
    /// blank lines and literal quote characters intact.
    pub fn parse(content: &str, separator: Separator) -> BridgeResult<Self> {
        let rows = match separator {
            Separator::Comma => parse_quoted(content, separator)?,
            Separator::Tab | Separator::Space => content
                .lines()
                .map(|line| line.split(separator.char()).map(str::to_string).collect())
                .collect(),
        };

        Ok(Self {
            rows,
            line_ending: if content.contains("\r\n") {
                LineEnding::CrLf
            } else {
                LineEnding::Lf
            },
            trailing_newline: content.is_empty() || content.ends_with('\n'),
        })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell value, empty for cells past the end of a ragged row
    pub fn get(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Set a cell on an existing row.
    ///
    /// `col` may address one column past the current width, which appends a
    /// column to that row. Short rows are padded with empty cells.
    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) -> BridgeResult<()> {
        let width = self.column_count();
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(BridgeError::CellOutOfRange { row, col })?;
        if col > width {
            return Err(BridgeError::CellOutOfRange { row, col });
        }
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.into();
        Ok(())
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn trailing_newline(&self) -> bool {
        self.trailing_newline
    }
}

/// RFC 4180 records, with blank lines kept as empty rows. The `csv` reader
/// skips blank lines, so they are recovered from the line breaks between
/// consecutive records.
fn parse_quoted(content: &str, separator: Separator) -> BridgeResult<Vec<Vec<String>>> {
    let bytes = content.as_bytes();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator.byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut seen_record = false;
    loop {
        let offset = reader.position().byte() as usize;
        let more = reader.read_record(&mut record).map_err(|e| {
            let line = e.position().map(|pos| pos.line()).unwrap_or(0);
            BridgeError::Parse(format!("line {}: {}", line, e))
        })?;

        // One break terminates the previous record; the rest are blank lines
        let breaks = line_breaks_around(bytes, offset);
        let blank = if seen_record {
            breaks.saturating_sub(1)
        } else {
            breaks
        };
        rows.extend(std::iter::repeat_with(Vec::new).take(blank));

        if !more {
            break;
        }
        rows.push(record.iter().map(str::to_string).collect());
        seen_record = true;
    }
    Ok(rows)
}

/// Number of line breaks in the run of `\r`/`\n` bytes touching `offset`.
/// `\r\n` counts once.
fn line_breaks_around(bytes: &[u8], offset: usize) -> usize {
    let is_break = |b: &u8| matches!(b, b'\r' | b'\n');
    let offset = offset.min(bytes.len());
    let start = bytes[..offset]
        .iter()
        .rposition(|b| !is_break(b))
        .map_or(0, |i| i + 1);
    let end = bytes[offset..]
        .iter()
        .position(|b| !is_break(b))
        .map_or(bytes.len(), |i| offset + i);

    let run = &bytes[start..end];
    let mut count = 0;
    let mut i = 0;
    while i < run.len() {
        i += if run[i] == b'\r' && run.get(i + 1) == Some(&b'\n') {
            2
        } else {
            1
        };
        count += 1;
    }
    count
}
