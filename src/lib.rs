//! SheetBridge - round-trip tabular editing for delimited text and spreadsheets
//!
//! This library classifies a file, loads it into an in-memory [`Table`],
//! and writes edits back in the file's original format.
//!
//! # Features
//!
//! - Separator detection for tab, comma and space separated text
//! - Spreadsheet (.xlsx, .xls, .ods) round trip through a conversion service
//! - One session per file, with dirty tracking
//! - All-or-nothing saves: a failed export or conversion never touches the source
//!
//! # Example
//!
//! ```no_run
//! use royalbit_sheetbridge::config::BridgeConfig;
//! use royalbit_sheetbridge::convert::CancelToken;
//! use royalbit_sheetbridge::workspace::Workspace;
//!
//! let config = BridgeConfig::default();
//! let mut workspace = Workspace::from_config(&config, CancelToken::new())?;
//!
//! let outcome = workspace.open("data.csv", |_prompt| true)?;
//! if let Some(key) = outcome.key().map(|k| k.to_path_buf()) {
//!     if let Some(session) = workspace.session_mut(&key) {
//!         session.set_cell(1, 0, "42")?;
//!     }
//!     workspace.save(&key)?;
//! }
//! # Ok::<(), royalbit_sheetbridge::error::BridgeError>(())
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod separator;
pub mod session;
pub mod table;
pub mod workspace;

// Re-export commonly used types
pub use error::{BridgeError, BridgeResult, ConversionError};
pub use separator::Separator;
pub use session::Session;
pub use table::Table;
pub use workspace::{OpenOutcome, Workspace};
