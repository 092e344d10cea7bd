//! Save pipeline: serialize the table, write it, convert back if needed
//!
//! This is the only path that persists a session. The exported text is what
//! lands on disk; nothing writes the source afterwards.

use crate::convert::ConversionBridge;
use crate::error::{BridgeError, BridgeResult};
use crate::separator::Separator;
use crate::session::Session;
use crate::table::Table;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Serialization chosen from the session's separator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Tab separated, fields written verbatim
    Tsv,
    /// Comma separated with RFC 4180 quoting
    Csv,
    /// Fields joined by a single space
    Generic,
}

impl From<Separator> for ExportFormat {
    fn from(separator: Separator) -> Self {
        match separator {
            Separator::Tab => ExportFormat::Tsv,
            Separator::Comma => ExportFormat::Csv,
            Separator::Space => ExportFormat::Generic,
        }
    }
}

impl ExportFormat {
    pub fn separator(self) -> Separator {
        match self {
            ExportFormat::Tsv => Separator::Tab,
            ExportFormat::Csv => Separator::Comma,
            ExportFormat::Generic => Separator::Space,
        }
    }

    pub fn render(self, table: &Table) -> BridgeResult<String> {
        let mut text = match self {
            ExportFormat::Csv => render_quoted(table)?,
            ExportFormat::Tsv | ExportFormat::Generic => render_joined(table, self.separator()),
        };

        if !table.trailing_newline() {
            let ending = table.line_ending().as_str();
            if text.ends_with(ending) {
                text.truncate(text.len() - ending.len());
            }
        }
        Ok(text)
    }
}

fn render_joined(table: &Table, separator: Separator) -> String {
    let delimiter = separator.char().to_string();
    let ending = table.line_ending().as_str();
    let mut text = String::new();
    for row in table.rows() {
        text.push_str(&row.join(&delimiter));
        text.push_str(ending);
    }
    text
}

fn render_quoted(table: &Table) -> BridgeResult<String> {
    let terminator = match table.line_ending() {
        crate::table::LineEnding::Lf => csv::Terminator::Any(b'\n'),
        crate::table::LineEnding::CrLf => csv::Terminator::CRLF,
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(Separator::Comma.byte())
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(terminator)
        .flexible(true);
    let mut writer = builder.from_writer(Vec::new());

    for row in table.rows() {
        if row.is_empty() {
            // The csv writer would emit `""` for a record with no fields
            let mut bytes = writer
                .into_inner()
                .map_err(|e| BridgeError::Parse(format!("failed to flush CSV: {}", e)))?;
            bytes.extend_from_slice(table.line_ending().as_str().as_bytes());
            writer = builder.from_writer(bytes);
            continue;
        }
        writer
            .write_record(row)
            .map_err(|e| BridgeError::Parse(format!("failed to serialize row: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| BridgeError::Parse(format!("failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| BridgeError::Parse(e.to_string()))
}

/// Result of a save request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to do, the session was clean
    Unchanged,
    /// Source written (through reverse conversion for spreadsheets)
    Saved { path: PathBuf, format: ExportFormat },
}

pub struct ExportDispatcher;

impl ExportDispatcher {
    /// Text the session would be saved as
    pub fn render(session: &Session) -> BridgeResult<String> {
        ExportFormat::from(session.separator()).render(session.table())
    }

    /// Persist a dirty session.
    ///
    /// The session is marked clean only when every step succeeded. On any
    /// error it stays dirty and the source file is unchanged.
    pub fn save(bridge: &ConversionBridge, session: &mut Session) -> BridgeResult<SaveOutcome> {
        if !session.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let format = ExportFormat::from(session.separator());
        let content = format.render(session.table())?;

        match session.spreadsheet_link() {
            Some(link) => {
                write_atomic(&link.temp_path, &content)?;
                bridge.reverse(&link.temp_path, &link.extension, session.source_path())?;
            }
            None => write_atomic(session.source_path(), &content)?,
        }

        session.mark_clean();
        tracing::info!(
            path = %session.source_path().display(),
            format = ?format,
            "saved session"
        );
        Ok(SaveOutcome::Saved {
            path: session.source_path().to_path_buf(),
            format,
        })
    }
}

/// Replace `path` with `content` via a sibling temporary file and rename,
/// keeping the existing file's permissions
fn write_atomic(path: &Path, content: &str) -> BridgeResult<()> {
    let export_error = |source: std::io::Error| BridgeError::ExportWrite {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".sheetbridge-")
        .tempfile_in(parent)
        .map_err(export_error)?;
    staged.write_all(content.as_bytes()).map_err(export_error)?;
    staged.as_file().sync_all().map_err(export_error)?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(staged.path(), metadata.permissions()).map_err(export_error)?;
    }
    staged.persist(path).map_err(|e| export_error(e.error))?;
    Ok(())
}
