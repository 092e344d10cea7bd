//! CLI command handlers

pub mod commands;

pub use commands::{cat, detect, inspect, set, CellEdit};

use tracing_subscriber::EnvFilter;

/// Initialize console logging.
///
/// `RUST_LOG` wins when set; otherwise `sheetbridge=warn`, or
/// `sheetbridge=debug` with `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "royalbit_sheetbridge=debug,sheetbridge=debug"
    } else {
        "royalbit_sheetbridge=warn,sheetbridge=warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
