//! Open → edit → save scenarios
//!
//! Spreadsheet conversion is replaced by deterministic fakes so these tests
//! never depend on an installed converter.

use pretty_assertions::assert_eq;
use royalbit_sheetbridge::classify::FormatClassifier;
use royalbit_sheetbridge::convert::ConversionService;
use royalbit_sheetbridge::error::{BridgeError, ConversionError};
use royalbit_sheetbridge::export::{ExportFormat, SaveOutcome};
use royalbit_sheetbridge::separator::SeparatorDetector;
use royalbit_sheetbridge::{OpenOutcome, Separator, Workspace};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

// ═══════════════════════════════════════════════════════════════════════════
// FAKE CONVERSION SERVICE
// ═══════════════════════════════════════════════════════════════════════════

/// Forward writes `sheet_csv`; reverse writes a marker containing the CSV it
/// was given. Either direction can be switched to "tool missing".
#[derive(Clone, Default)]
struct FakeConverter {
    sheet_csv: &'static str,
    state: Rc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    fail_forward: Cell<bool>,
    fail_reverse: Cell<bool>,
    calls: RefCell<Vec<String>>,
}

impl FakeConverter {
    fn new(sheet_csv: &'static str) -> Self {
        Self {
            sheet_csv,
            state: Rc::new(FakeState::default()),
        }
    }

    fn missing() -> ConversionError {
        ConversionError::ToolMissing {
            tool: "fakeconvert".to_string(),
            hint: "install fakeconvert".to_string(),
        }
    }
}

impl ConversionService for FakeConverter {
    fn name(&self) -> &str {
        "fakeconvert"
    }

    fn convert(&self, input: &Path, output: &Path, ext: &str) -> Result<(), ConversionError> {
        self.state.calls.borrow_mut().push(ext.to_string());
        let body = if ext == "csv" {
            if self.state.fail_forward.get() {
                return Err(Self::missing());
            }
            self.sheet_csv.to_string()
        } else {
            if self.state.fail_reverse.get() {
                return Err(Self::missing());
            }
            format!("SHEET[{}]:{}", ext, fs::read_to_string(input).unwrap())
        };
        fs::write(output, body).unwrap();
        Ok(())
    }
}

fn workspace_with(converter: &FakeConverter) -> Workspace {
    Workspace::new(
        FormatClassifier::default(),
        SeparatorDetector::new(1),
        Box::new(converter.clone()),
    )
}

/// Every file in `dir` with its bytes
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .map(|path| {
            let bytes = fs::read(&path).unwrap();
            (path, bytes)
        })
        .collect()
}

fn accept(_: &str) -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════════
// DELIMITED TEXT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_csv_scenario_edit_and_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.csv");
    fs::write(&path, "a,b,c\n1,2,3\n").unwrap();

    let converter = FakeConverter::new("");
    let mut workspace = workspace_with(&converter);
    let outcome = workspace.open(&path, accept).unwrap();
    let key = outcome.key().unwrap().to_path_buf();
    assert!(matches!(outcome, OpenOutcome::Opened(_)));

    let session = workspace.session_mut(&key).unwrap();
    assert_eq!(session.separator(), Separator::Comma);
    assert!(!session.is_dirty());

    session.set_cell(1, 1, "two, with comma").unwrap();
    assert!(session.is_dirty());

    let saved = workspace.save(&key).unwrap();
    assert_eq!(
        saved,
        SaveOutcome::Saved {
            path: key.clone(),
            format: ExportFormat::Csv
        }
    );
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "a,b,c\n1,\"two, with comma\",3\n"
    );
    assert!(!workspace.session(&key).unwrap().is_dirty());
    // Text files never reach the converter
    assert!(converter.state.calls.borrow().is_empty());
}

#[test]
fn test_tsv_detected_and_saved_as_tsv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.txt");
    fs::write(&path, "name\tqty\nbolt\t10\nnut\t20\n").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new(""));
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();

    let session = workspace.session_mut(&key).unwrap();
    assert_eq!(session.separator(), Separator::Tab);
    session.set_cell(2, 1, "25").unwrap();
    workspace.save(&key).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "name\tqty\nbolt\t10\nnut\t25\n"
    );
}

#[test]
fn test_space_separated_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixed.dat");
    fs::write(&path, "x y\n1 2\n3 4").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new(""));
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();

    let session = workspace.session_mut(&key).unwrap();
    assert_eq!(session.separator(), Separator::Space);
    session.set_cell(2, 0, "30").unwrap();
    workspace.save(&key).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "x y\n1 2\n30 4");
}

#[test]
fn test_unedited_save_is_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.csv");
    fs::write(&path, "a,b\n1,2\n").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new(""));
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();
    assert_eq!(workspace.save(&key).unwrap(), SaveOutcome::Unchanged);
}

#[test]
fn test_text_file_never_prompts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.csv");
    fs::write(&path, "a,b\n").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new(""));
    let outcome = workspace
        .open(&path, |_| panic!("text files must not prompt"))
        .unwrap();
    assert!(matches!(outcome, OpenOutcome::Opened(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_open_twice_yields_one_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.csv");
    fs::write(&path, "a,b\n1,2\n").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new(""));
    let first = workspace.open(&path, accept).unwrap();
    workspace
        .session_mut(first.key().unwrap())
        .unwrap()
        .set_cell(1, 0, "edited")
        .unwrap();

    // Same file through a different spelling of the path
    let alias = dir.path().join(".").join("data.csv");
    let second = workspace.open(&alias, accept).unwrap();

    assert!(matches!(second, OpenOutcome::Refocused(_)));
    assert_eq!(first.key(), second.key());
    assert_eq!(workspace.len(), 1);
    assert_eq!(workspace.focused(), first.key());
    // The existing session was surfaced, not reloaded
    assert_eq!(
        workspace.session(&alias).unwrap().table().get(1, 0),
        "edited"
    );
}

#[test]
fn test_reopen_spreadsheet_does_not_prompt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    fs::write(&path, b"xlsx-bytes").unwrap();

    let converter = FakeConverter::new("a,b\n1,2\n");
    let mut workspace = workspace_with(&converter);
    workspace.open(&path, accept).unwrap();

    let outcome = workspace
        .open(&path, |_| panic!("already open, must not prompt"))
        .unwrap();
    assert!(matches!(outcome, OpenOutcome::Refocused(_)));
    assert_eq!(converter.state.calls.borrow().len(), 1);
}

#[test]
fn test_existing_csv_blocks_spreadsheet_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    fs::write(&path, b"xlsx-bytes").unwrap();
    let users_csv = dir.path().join("report.csv");
    fs::write(&users_csv, "mine,not yours
").unwrap();

    let converter = FakeConverter::new("a,b\n");
    let mut workspace = workspace_with(&converter);
    let err = workspace
        .open(&path, |_| panic!("a blocked open must not prompt"))
        .unwrap_err();

    match err {
        BridgeError::TempPathInUse { temp, .. } => {
            assert_eq!(temp.file_name().unwrap(), "report.csv")
        }
        other => panic!("expected the working copy to be taken, got {other:?}"),
    }
    assert!(workspace.is_empty());
    assert!(converter.state.calls.borrow().is_empty());
    assert_eq!(fs::read_to_string(&users_csv).unwrap(), "mine,not yours\n");
}

#[test]
fn test_open_csv_session_blocks_matching_spreadsheet() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("report.csv");
    fs::write(&csv, "a,b\n1,2\n").unwrap();
    let xlsx = dir.path().join("report.xlsx");
    fs::write(&xlsx, b"xlsx-bytes").unwrap();

    let converter = FakeConverter::new("x,y\n");
    let mut workspace = workspace_with(&converter);
    let csv_key = workspace.open(&csv, accept).unwrap().key().unwrap().to_path_buf();
    workspace.session_mut(&csv_key).unwrap().set_cell(1, 0, "10").unwrap();

    let err = workspace.open(&xlsx, accept).unwrap_err();
    assert!(matches!(err, BridgeError::TempPathInUse { .. }));
    assert_eq!(workspace.len(), 1);
    assert_eq!(workspace.focused(), Some(csv_key.as_path()));
    assert_eq!(fs::read_to_string(&csv).unwrap(), "a,b\n1,2\n");

    // The text session still saves to its own file
    workspace.save(&csv_key).unwrap();
    assert_eq!(fs::read_to_string(&csv).unwrap(), "a,b\n10,2\n");
    assert_eq!(fs::read(&xlsx).unwrap(), b"xlsx-bytes");
}

#[test]
fn test_spreadsheet_open_again_after_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    fs::write(&path, b"xlsx-bytes").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new("a\n"));
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();
    workspace.close(&key);

    // Our own working copy is gone, so the path is free again
    let outcome = workspace.open(&path, accept).unwrap();
    assert!(matches!(outcome, OpenOutcome::Opened(_)));
}

#[cfg(unix)]
#[test]
fn test_symlinked_spreadsheet_uses_link_name_and_location() {
    use std::os::unix::fs::symlink;

    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    let desk = dir.path().join("desk");
    fs::create_dir(&store).unwrap();
    fs::create_dir(&desk).unwrap();
    let blob = store.join("blob.bin");
    fs::write(&blob, b"xlsx-bytes").unwrap();
    let link = desk.join("book.xlsx");
    symlink(&blob, &link).unwrap();

    let converter = FakeConverter::new("a,b\n1,2\n");
    let mut workspace = workspace_with(&converter);
    let key = workspace.open(&link, accept).unwrap().key().unwrap().to_path_buf();

    let session = workspace.session_mut(&key).unwrap();
    assert!(session.is_spreadsheet());
    assert_eq!(session.spreadsheet_extension(), Some("xlsx"));
    assert_eq!(session.temp_path(), Some(desk.join("book.csv").as_path()));
    assert!(!store.join("blob.csv").exists());

    session.set_cell(1, 1, "20").unwrap();
    workspace.save(&key).unwrap();

    // The target is rewritten and the link survives
    assert_eq!(
        fs::read_to_string(&blob).unwrap(),
        "SHEET[xlsx]:a,b\n1,20\n"
    );
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
}

#[test]
fn test_close_removes_session_and_temp_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.ods");
    fs::write(&path, b"ods-bytes").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new("a\n"));
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();
    assert!(dir.path().join("report.csv").exists());

    let closed = workspace.close(&key).unwrap();
    assert!(closed.is_spreadsheet());
    assert!(workspace.is_empty());
    assert!(workspace.focused().is_none());
    assert!(!dir.path().join("report.csv").exists());
    assert_eq!(fs::read(&path).unwrap(), b"ods-bytes");
}

// ═══════════════════════════════════════════════════════════════════════════
// SPREADSHEETS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_xlsx_scenario_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    fs::write(&path, b"xlsx-bytes").unwrap();

    let converter = FakeConverter::new("region,total\nnorth,10\n");
    let mut workspace = workspace_with(&converter);

    let mut prompted = None;
    let outcome = workspace
        .open(&path, |prompt| {
            prompted = Some(prompt.to_string());
            true
        })
        .unwrap();
    assert!(prompted.unwrap().contains("report.xlsx"));
    let key = outcome.key().unwrap().to_path_buf();

    let temp = dir.path().join("report.csv");
    let session = workspace.session_mut(&key).unwrap();
    assert!(session.is_spreadsheet());
    assert_eq!(session.separator(), Separator::Comma);
    assert_eq!(session.spreadsheet_extension(), Some("xlsx"));
    assert_eq!(
        session.temp_path().map(|p| p.file_name().unwrap().to_owned()),
        Some(OsString::from("report.csv"))
    );
    assert!(temp.exists());
    assert_eq!(session.table().get(1, 1), "10");

    session.set_cell(1, 1, "15").unwrap();
    workspace.save(&key).unwrap();

    assert_eq!(
        fs::read_to_string(&temp).unwrap(),
        "region,total\nnorth,15\n"
    );
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "SHEET[xlsx]:region,total\nnorth,15\n"
    );
    assert!(!workspace.session(&key).unwrap().is_dirty());
    assert_eq!(*converter.state.calls.borrow(), vec!["csv", "xlsx"]);
}

#[test]
fn test_spreadsheet_separator_is_comma_even_for_tab_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.ods");
    fs::write(&path, b"ods").unwrap();

    // Every line has a tab; detection would say TAB if it ran
    let mut workspace = workspace_with(&FakeConverter::new("a\tb\n1\t2\n"));
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();

    assert_eq!(workspace.session(&key).unwrap().separator(), Separator::Comma);
}

#[test]
fn test_decline_leaves_everything_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    fs::write(&path, b"xlsx-bytes").unwrap();
    let other = dir.path().join("other.csv");
    fs::write(&other, "a,b\n").unwrap();

    let converter = FakeConverter::new("a,b\n");
    let mut workspace = workspace_with(&converter);
    workspace.open(&other, accept).unwrap();

    let before_files = snapshot(dir.path());
    let before_sessions: Vec<PathBuf> = workspace.paths().map(Path::to_path_buf).collect();
    let before_focus = workspace.focused().map(Path::to_path_buf);

    let outcome = workspace.open(&path, |_| false).unwrap();

    assert_eq!(outcome, OpenOutcome::Declined);
    assert_eq!(snapshot(dir.path()), before_files);
    assert_eq!(
        workspace.paths().map(Path::to_path_buf).collect::<Vec<_>>(),
        before_sessions
    );
    assert_eq!(workspace.focused().map(Path::to_path_buf), before_focus);
    assert!(converter.state.calls.borrow().is_empty());
}

#[test]
fn test_forward_failure_creates_no_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    fs::write(&path, b"xlsx-bytes").unwrap();

    let converter = FakeConverter::new("a\n");
    converter.state.fail_forward.set(true);
    let mut workspace = workspace_with(&converter);

    let err = workspace.open(&path, accept).unwrap_err();
    assert!(err.to_string().contains("fakeconvert"));
    assert!(workspace.is_empty());
    assert!(!dir.path().join("report.csv").exists());
}

#[test]
fn test_reverse_failure_keeps_source_and_dirty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    fs::write(&path, b"original-xlsx").unwrap();

    let converter = FakeConverter::new("a,b\n1,2\n");
    let mut workspace = workspace_with(&converter);
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();
    workspace.session_mut(&key).unwrap().set_cell(1, 0, "9").unwrap();

    converter.state.fail_reverse.set(true);
    let err = workspace.save(&key).unwrap_err();

    match err {
        BridgeError::Conversion(ConversionError::ToolMissing { tool, .. }) => {
            assert_eq!(tool, "fakeconvert")
        }
        other => panic!("expected a missing tool, got {other:?}"),
    }
    assert_eq!(fs::read(&path).unwrap(), b"original-xlsx");
    assert!(workspace.session(&key).unwrap().is_dirty());

    // Once the tool is back, the same session saves cleanly
    converter.state.fail_reverse.set(false);
    workspace.save(&key).unwrap();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "SHEET[xlsx]:a,b\n9,2\n"
    );
    assert!(!workspace.session(&key).unwrap().is_dirty());
}

#[test]
fn test_missing_spreadsheet_is_io_error_without_prompt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ghost.xlsx");

    let mut workspace = workspace_with(&FakeConverter::new(""));
    let err = workspace
        .open(&path, |_| panic!("missing file must not prompt"))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Io { .. }));
}

#[cfg(unix)]
#[test]
fn test_export_write_failure_keeps_dirty() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("locked");
    fs::create_dir(&sub).unwrap();
    let path = sub.join("data.csv");
    fs::write(&path, "a,b\n1,2\n").unwrap();

    let mut workspace = workspace_with(&FakeConverter::new(""));
    let key = workspace.open(&path, accept).unwrap().key().unwrap().to_path_buf();
    workspace.session_mut(&key).unwrap().set_cell(1, 0, "x").unwrap();

    fs::set_permissions(&sub, fs::Permissions::from_mode(0o555)).unwrap();
    let probe = sub.join(".probe");
    let writable = fs::write(&probe, b"").is_ok();
    let result = workspace.save(&key);
    fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();

    // Running as root ignores directory permissions; nothing to check then
    if writable {
        return;
    }
    assert!(matches!(result, Err(BridgeError::ExportWrite { .. })));
    assert!(workspace.session(&key).unwrap().is_dirty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
}
