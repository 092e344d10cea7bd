use crate::config::BridgeConfig;
use crate::convert::CancelToken;
use crate::error::{BridgeError, BridgeResult};
use crate::export::{ExportDispatcher, SaveOutcome};
use crate::workspace::{OpenOutcome, Workspace};
use colored::Colorize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One `ROW:COL=VALUE` edit from the command line (zero-based)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

impl FromStr for CellEdit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (position, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected ROW:COL=VALUE, got `{}`", s))?;
        let (row, col) = position
            .split_once(':')
            .ok_or_else(|| format!("expected ROW:COL before `=`, got `{}`", position))?;
        let row = row
            .trim()
            .parse()
            .map_err(|_| format!("invalid row `{}`", row))?;
        let col = col
            .trim()
            .parse()
            .map_err(|_| format!("invalid column `{}`", col))?;
        Ok(Self {
            row,
            col,
            value: value.to_string(),
        })
    }
}

/// Ask a yes/no question on stdin; anything but y/yes declines.
/// The question goes to stderr so `cat` output stays clean.
fn prompt_confirm(message: &str) -> bool {
    eprint!("{} {} ", message.yellow(), "[y/N]".bold());
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Open `file`, asking for confirmation unless `assume_yes`.
/// `None` means the user declined.
fn open_session(
    workspace: &mut Workspace,
    file: &Path,
    assume_yes: bool,
) -> BridgeResult<Option<PathBuf>> {
    let outcome = workspace.open(file, |prompt| assume_yes || prompt_confirm(prompt))?;
    match outcome {
        OpenOutcome::Declined => {
            println!("{}", "Cancelled - nothing was changed".yellow());
            Ok(None)
        }
        OpenOutcome::Opened(key) | OpenOutcome::Refocused(key) => Ok(Some(key)),
    }
}

/// Execute the inspect command
pub fn inspect(
    file: PathBuf,
    config: &BridgeConfig,
    assume_yes: bool,
    json: bool,
) -> BridgeResult<()> {
    let mut workspace = Workspace::from_config(config, CancelToken::new())?;
    let Some(key) = open_session(&mut workspace, &file, assume_yes)? else {
        return Ok(());
    };

    let summary = workspace
        .session(&key)
        .map(|session| session.summary())
        .ok_or_else(|| BridgeError::UnknownSession(key.clone()))?;
    workspace.close(&key);

    if json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| BridgeError::Parse(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    println!("{}", "📋 SheetBridge - Inspect".bold().green());
    println!("   File:      {}", summary.source_path.display());
    println!("   Kind:      {}", summary.kind.cyan());
    if let Some(ext) = &summary.extension {
        println!("   Extension: {}", ext.cyan());
    }
    if let Some(temp) = &summary.temp_path {
        println!("   Temp file: {}", temp.display());
    }
    println!("   Separator: {}", summary.separator.to_string().bright_blue().bold());
    println!("   Size:      {} rows × {} columns", summary.rows, summary.columns);
    Ok(())
}

/// Execute the cat command - print the table as it would be saved
pub fn cat(file: PathBuf, config: &BridgeConfig, assume_yes: bool) -> BridgeResult<()> {
    let mut workspace = Workspace::from_config(config, CancelToken::new())?;
    let Some(key) = open_session(&mut workspace, &file, assume_yes)? else {
        return Ok(());
    };

    let rendered = workspace
        .session(&key)
        .map(ExportDispatcher::render)
        .ok_or_else(|| BridgeError::UnknownSession(key.clone()))?;
    workspace.close(&key);

    print!("{}", rendered?);
    Ok(())
}

/// Execute the set command - apply cell edits and save
pub fn set(
    file: PathBuf,
    edits: Vec<CellEdit>,
    config: &BridgeConfig,
    assume_yes: bool,
    verbose: bool,
) -> BridgeResult<()> {
    println!("{}", "✏️  SheetBridge - Edit".bold().green());
    println!("   File: {}", file.display());

    let mut workspace = Workspace::from_config(config, CancelToken::new())?;
    let Some(key) = open_session(&mut workspace, &file, assume_yes)? else {
        return Ok(());
    };

    let result = apply_and_save(&mut workspace, &key, &edits, verbose);
    workspace.close(&key);

    match result? {
        SaveOutcome::Unchanged => println!("{}", "   No edits - file left as is".yellow()),
        SaveOutcome::Saved { path, format } => {
            println!("{}", "✅ Saved".bold().green());
            println!("   {} ({:?})", path.display(), format);
        }
    }
    Ok(())
}

fn apply_and_save(
    workspace: &mut Workspace,
    key: &Path,
    edits: &[CellEdit],
    verbose: bool,
) -> BridgeResult<SaveOutcome> {
    let session = workspace
        .session_mut(key)
        .ok_or_else(|| BridgeError::UnknownSession(key.to_path_buf()))?;

    if verbose {
        println!("   Separator: {}", session.separator().to_string().cyan());
    }
    for edit in edits {
        if verbose {
            println!(
                "   {} ({}, {}) = {}",
                "set".cyan(),
                edit.row,
                edit.col,
                edit.value.bright_blue()
            );
        }
        session.set_cell(edit.row, edit.col, edit.value.clone())?;
    }

    workspace.save(key)
}

/// Execute the detect command - separator detection only
pub fn detect(file: PathBuf, config: &BridgeConfig) -> BridgeResult<()> {
    if config.classifier().is_spreadsheet(&file) {
        println!(
            "{} is a spreadsheet; it is always edited as {}",
            file.display(),
            "comma".bright_blue().bold()
        );
        return Ok(());
    }

    let content = fs::read_to_string(&file).map_err(|e| BridgeError::io(&file, e))?;
    let separator = config.detector().detect(&content);
    println!("{}", separator);
    Ok(())
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
