//! Spreadsheet conversion bridge
//!
//! The bridge drives a [`ConversionService`] in two directions:
//! - Forward: spreadsheet → CSV at the session's temp path (on open)
//! - Reverse: CSV export → spreadsheet over the source path (on save)
//!
//! Output is always produced inside a staging directory next to the
//! destination, checked for readability, then renamed into place. A failed or
//! interrupted conversion never leaves a half-written destination behind.

mod builtin;
mod external;

pub use builtin::Builtin;
pub use external::{CancelToken, ExternalTool, ToolKind};

use crate::error::ConversionError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Extension of the intermediate delimited file
pub const TEMP_EXTENSION: &str = "csv";

/// Something that can turn one document format into another.
///
/// `convert` must produce `output` (in the format named by
/// `target_extension`) from `input`. It does not need to be atomic; the
/// bridge stages and verifies the result.
pub trait ConversionService {
    /// Tool name shown to the user in error messages
    fn name(&self) -> &str;

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_extension: &str,
    ) -> Result<(), ConversionError>;
}

/// Deterministic temp path: the source with its extension replaced by `.csv`
pub fn temp_path_for(source: &Path) -> PathBuf {
    source.with_extension(TEMP_EXTENSION)
}

pub struct ConversionBridge {
    service: Box<dyn ConversionService>,
}

impl ConversionBridge {
    pub fn new(service: Box<dyn ConversionService>) -> Self {
        Self { service }
    }

    pub fn tool_name(&self) -> &str {
        self.service.name()
    }

    /// Convert a spreadsheet into delimited text at its temp path
    pub fn forward(&self, source: &Path) -> Result<PathBuf, ConversionError> {
        let temp_path = temp_path_for(source);
        if temp_path == source {
            return Err(ConversionError::Unsupported {
                tool: self.tool_name().to_string(),
                detail: format!(
                    "{} already has the .{} extension",
                    source.display(),
                    TEMP_EXTENSION
                ),
            });
        }

        tracing::info!(
            source = %source.display(),
            temp = %temp_path.display(),
            tool = self.tool_name(),
            "forward conversion"
        );
        self.convert_staged(source, &temp_path, TEMP_EXTENSION)?;
        Ok(temp_path)
    }

    /// Convert an exported delimited file back into `target_extension`,
    /// replacing `source`
    pub fn reverse(
        &self,
        export_path: &Path,
        target_extension: &str,
        source: &Path,
    ) -> Result<PathBuf, ConversionError> {
        tracing::info!(
            export = %export_path.display(),
            source = %source.display(),
            tool = self.tool_name(),
            "reverse conversion"
        );
        self.convert_staged(export_path, source, target_extension)?;
        Ok(source.to_path_buf())
    }

    fn convert_staged(
        &self,
        input: &Path,
        destination: &Path,
        target_extension: &str,
    ) -> Result<(), ConversionError> {
        let parent = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let file_name = destination
            .file_name()
            .ok_or_else(|| ConversionError::OutputMissing {
                tool: self.tool_name().to_string(),
                path: destination.to_path_buf(),
            })?;

        let staging = tempfile::Builder::new()
            .prefix(".sheetbridge-")
            .tempdir_in(parent)
            .map_err(|source| ConversionError::Staging {
                path: parent.to_path_buf(),
                source,
            })?;
        let staged = staging.path().join(file_name);

        self.service.convert(input, &staged, target_extension)?;

        if !is_readable_file(&staged) {
            return Err(ConversionError::OutputMissing {
                tool: self.tool_name().to_string(),
                path: destination.to_path_buf(),
            });
        }

        fs::rename(&staged, destination).map_err(|source| ConversionError::Staging {
            path: destination.to_path_buf(),
            source,
        })?;
        tracing::debug!(destination = %destination.display(), "conversion output in place");
        Ok(())
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}
