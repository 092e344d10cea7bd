//! Bridge configuration
//!
//! Stored in `~/.config/sheetbridge/config.yaml` (or
//! `$XDG_CONFIG_HOME/sheetbridge/config.yaml`). Every field is optional;
//! a missing file means defaults.

use crate::classify::{FormatClassifier, DEFAULT_SPREADSHEET_EXTENSIONS};
use crate::convert::{Builtin, CancelToken, ConversionService, ExternalTool, ToolKind};
use crate::error::{BridgeError, BridgeResult};
use crate::separator::{SeparatorDetector, DEFAULT_HEADER_LINES};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const APP_DIR: &str = "sheetbridge";
const CONFIG_FILE: &str = "config.yaml";

/// Default conversion timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Extensions treated as spreadsheets
    pub spreadsheet_extensions: Vec<String>,
    /// Leading lines ignored by separator detection
    pub header_lines: usize,
    /// Upper bound on lines inspected by separator detection
    pub sample_limit: Option<usize>,
    pub converter: ConverterConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            spreadsheet_extensions: DEFAULT_SPREADSHEET_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            header_lines: DEFAULT_HEADER_LINES,
            sample_limit: None,
            converter: ConverterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterBackend {
    #[default]
    Ssconvert,
    Libreoffice,
    Builtin,
    Custom,
}

impl FromStr for ConverterBackend {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssconvert" | "gnumeric" => Ok(ConverterBackend::Ssconvert),
            "libreoffice" | "soffice" => Ok(ConverterBackend::Libreoffice),
            "builtin" => Ok(ConverterBackend::Builtin),
            "custom" => Ok(ConverterBackend::Custom),
            other => Err(BridgeError::Config(format!(
                "unknown converter backend `{}` (expected ssconvert, libreoffice, builtin or custom)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub backend: ConverterBackend,
    /// Executable; defaults to the backend's usual binary name
    pub program: Option<String>,
    /// Arguments for the custom backend
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            backend: ConverterBackend::default(),
            program: None,
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the configured conversion service
    pub fn build_service(&self, cancel: CancelToken) -> BridgeResult<Box<dyn ConversionService>> {
        let kind = match self.backend {
            ConverterBackend::Builtin => return Ok(Box::new(Builtin)),
            ConverterBackend::Ssconvert => ToolKind::Ssconvert,
            ConverterBackend::Libreoffice => ToolKind::Libreoffice,
            ConverterBackend::Custom => {
                if self.program.is_none() || self.args.is_empty() {
                    return Err(BridgeError::Config(
                        "the custom converter needs both `program` and `args`".to_string(),
                    ));
                }
                ToolKind::Custom(self.args.clone())
            }
        };

        let program = self
            .program
            .clone()
            .unwrap_or_else(|| kind.default_program().to_string());
        Ok(Box::new(
            ExternalTool::new(kind, program, self.timeout()).with_cancel_token(cancel),
        ))
    }
}

impl BridgeConfig {
    /// Load from an explicit path, or from the default location when `None`.
    ///
    /// An explicit path must exist; the default location may be absent.
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                Some(path) => {
                    tracing::debug!("Config file not found at {}, using defaults", path.display());
                    Ok(Self::default())
                }
                None => {
                    tracing::debug!("No config directory available, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn load_from(path: &Path) -> BridgeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> BridgeResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn classifier(&self) -> FormatClassifier {
        FormatClassifier::new(&self.spreadsheet_extensions)
    }

    pub fn detector(&self) -> SeparatorDetector {
        SeparatorDetector::new(self.header_lines).with_sample_limit(self.sample_limit)
    }
}

/// `$XDG_CONFIG_HOME/sheetbridge/config.yaml`, falling back to
/// `~/.config/sheetbridge/config.yaml` (`%APPDATA%` on Windows)
pub fn default_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let base = env::var_os("APPDATA").map(PathBuf::from);

    #[cfg(not(target_os = "windows"))]
    let base = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));

    base.map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
