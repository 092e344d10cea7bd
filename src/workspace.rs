//! Session registry and the open → edit → save flow
//!
//! The workspace owns every live [`Session`], keyed by normalized source
//! path, so a file can never be opened twice.

use crate::classify::{FileClass, FormatClassifier};
use crate::config::BridgeConfig;
use crate::convert::{temp_path_for, CancelToken, ConversionBridge, ConversionService};
use crate::error::{BridgeError, BridgeResult};
use crate::export::{ExportDispatcher, SaveOutcome};
use crate::separator::{Separator, SeparatorDetector};
use crate::session::{Session, SpreadsheetLink};
use crate::table::Table;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Prompt shown before a spreadsheet is converted
pub fn confirmation_prompt(path: &Path) -> String {
    format!(
        "{} is a spreadsheet. Editing it as a table loses formatting, formulas and \
         extra sheets when saved. Continue?",
        path.display()
    )
}

/// What `open` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new session was created under this key
    Opened(PathBuf),
    /// A session for the path already existed and is now focused
    Refocused(PathBuf),
    /// The user declined the spreadsheet confirmation; nothing changed
    Declined,
}

impl OpenOutcome {
    /// Session key, unless the request was declined
    pub fn key(&self) -> Option<&Path> {
        match self {
            OpenOutcome::Opened(key) | OpenOutcome::Refocused(key) => Some(key),
            OpenOutcome::Declined => None,
        }
    }
}

pub struct Workspace {
    classifier: FormatClassifier,
    detector: SeparatorDetector,
    bridge: ConversionBridge,
    sessions: BTreeMap<PathBuf, Session>,
    focused: Option<PathBuf>,
}

impl Workspace {
    pub fn new(
        classifier: FormatClassifier,
        detector: SeparatorDetector,
        service: Box<dyn ConversionService>,
    ) -> Self {
        Self {
            classifier,
            detector,
            bridge: ConversionBridge::new(service),
            sessions: BTreeMap::new(),
            focused: None,
        }
    }

    /// Workspace using the configured classifier, detector and converter
    pub fn from_config(config: &BridgeConfig, cancel: CancelToken) -> BridgeResult<Self> {
        Ok(Self::new(
            config.classifier(),
            config.detector(),
            config.converter.build_service(cancel)?,
        ))
    }

    /// Open `path` for editing.
    ///
    /// `confirm` is asked only for spreadsheets that are not already open.
    /// Declining returns [`OpenOutcome::Declined`] and touches nothing.
    pub fn open<F>(&mut self, path: impl AsRef<Path>, confirm: F) -> BridgeResult<OpenOutcome>
    where
        F: FnOnce(&str) -> bool,
    {
        let path = path.as_ref();
        let key = session_key(path);

        if self.sessions.contains_key(&key) {
            tracing::debug!(path = %key.display(), "already open, refocusing");
            self.focused = Some(key.clone());
            return Ok(OpenOutcome::Refocused(key));
        }

        // Classify the path as given; a symlink's name is what the user chose
        let session = match self.classifier.classify(path) {
            FileClass::Spreadsheet { extension } => {
                if !key.is_file() {
                    return Err(BridgeError::io(
                        &key,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                    ));
                }
                let location = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
                self.check_temp_path(&location)?;
                if !confirm(&confirmation_prompt(path)) {
                    tracing::debug!(path = %key.display(), "spreadsheet conversion declined");
                    return Ok(OpenOutcome::Declined);
                }
                self.load_spreadsheet(&key, &location, extension)?
            }
            FileClass::Delimited => self.load_delimited(&key)?,
        };

        tracing::info!(
            path = %key.display(),
            separator = %session.separator(),
            spreadsheet = session.is_spreadsheet(),
            rows = session.table().row_count(),
            "opened session"
        );
        self.sessions.insert(key.clone(), session);
        self.focused = Some(key.clone());
        Ok(OpenOutcome::Opened(key))
    }

    fn load_delimited(&self, path: &Path) -> BridgeResult<Session> {
        let content = fs::read_to_string(path).map_err(|e| BridgeError::io(path, e))?;
        let separator = self.detector.detect(&content);
        let table = Table::parse(&content, separator)?;
        Ok(Session::delimited(path.to_path_buf(), separator, table))
    }

    /// The working copy must not clobber a user's file or another session
    fn check_temp_path(&self, location: &Path) -> BridgeResult<()> {
        let temp = temp_path_for(location);
        if temp.exists() || self.sessions.contains_key(&session_key(&temp)) {
            tracing::warn!(temp = %temp.display(), "working copy path already taken");
            return Err(BridgeError::TempPathInUse {
                spreadsheet: location.to_path_buf(),
                temp,
            });
        }
        Ok(())
    }

    /// `key` is the canonical file written on save; `location` is where the
    /// user reached it and where the working copy lives
    fn load_spreadsheet(
        &self,
        key: &Path,
        location: &Path,
        extension: String,
    ) -> BridgeResult<Session> {
        let temp_path = self.bridge.forward(location)?;
        let content = fs::read_to_string(&temp_path).map_err(|e| BridgeError::io(&temp_path, e))?;
        // Converted spreadsheets are always comma separated; no detection
        let table = Table::parse(&content, Separator::Comma)?;
        Ok(Session::spreadsheet(
            key.to_path_buf(),
            SpreadsheetLink {
                extension,
                temp_path,
            },
            table,
        ))
    }

    pub fn session(&self, path: impl AsRef<Path>) -> Option<&Session> {
        self.sessions.get(&session_key(path.as_ref()))
    }

    pub fn session_mut(&mut self, path: impl AsRef<Path>) -> Option<&mut Session> {
        self.sessions.get_mut(&session_key(path.as_ref()))
    }

    /// Save the session for `path` through the export pipeline
    pub fn save(&mut self, path: impl AsRef<Path>) -> BridgeResult<SaveOutcome> {
        let key = session_key(path.as_ref());
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or_else(|| BridgeError::UnknownSession(key.clone()))?;

        ExportDispatcher::save(&self.bridge, session).inspect_err(|e| {
            tracing::warn!(path = %key.display(), error = %e, "save failed, session stays dirty");
        })
    }

    /// Drop the session for `path`, removing its temp file if it had one
    pub fn close(&mut self, path: impl AsRef<Path>) -> Option<Session> {
        let key = session_key(path.as_ref());
        let session = self.sessions.remove(&key)?;
        if self.focused.as_ref() == Some(&key) {
            self.focused = None;
        }

        if let Some(temp_path) = session.temp_path() {
            if let Err(e) = fs::remove_file(temp_path) {
                tracing::warn!(path = %temp_path.display(), error = %e, "could not remove temp file");
            }
        }
        if session.is_dirty() {
            tracing::warn!(path = %key.display(), "closed with unsaved changes");
        }
        tracing::info!(path = %key.display(), "closed session");
        Some(session)
    }

    pub fn focused(&self) -> Option<&Path> {
        self.focused.as_deref()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sessions.keys().map(PathBuf::as_path)
    }

    pub fn tool_name(&self) -> &str {
        self.bridge.tool_name()
    }
}

/// Canonical path when the file exists, otherwise the path as given
fn session_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
