use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Failed to write export to {}: {source}", path.display())]
    ExportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "Cannot open {}: its working copy {} already exists; move or remove it first",
        spreadsheet.display(),
        temp.display()
    )]
    TempPathInUse { spreadsheet: PathBuf, temp: PathBuf },

    #[error("No open session for {}", .0.display())]
    UnknownSession(PathBuf),

    #[error("Cell ({row}, {col}) is outside the table")]
    CellOutOfRange { row: usize, col: usize },
}

impl BridgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of a conversion service. Every variant names the tool so the
/// user knows what to install or fix.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("conversion tool `{tool}` was not found; {hint}")]
    ToolMissing { tool: String, hint: String },

    #[error("conversion tool `{tool}` failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    #[error("conversion tool `{tool}` timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },

    #[error("conversion with `{tool}` was cancelled")]
    Cancelled { tool: String },

    #[error("conversion tool `{tool}` did not produce a readable file at {}", path.display())]
    OutputMissing { tool: String, path: PathBuf },

    #[error("conversion tool `{tool}` cannot do this: {detail}")]
    Unsupported { tool: String, detail: String },

    #[error("failed to stage conversion output in {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
