//! Conversion through an external command-line tool
//!
//! Supports Gnumeric's `ssconvert`, LibreOffice in headless mode, and a
//! user-supplied command template. The child process is bounded by a
//! timeout and can be cancelled from another thread.

use super::ConversionService;
use crate::error::ConversionError;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit, cancellation and timeout
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long a failed child's stderr may take to close after exit; helper
/// processes that inherited the pipe can keep it open
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Shared flag that aborts a running conversion
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Command-line convention of the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    /// `ssconvert INPUT OUTPUT`; format inferred from the output extension
    Ssconvert,
    /// `soffice --headless --convert-to EXT --outdir DIR INPUT`
    Libreoffice,
    /// Arbitrary arguments with `{input}`, `{output}`, `{ext}` and `{outdir}`
    /// placeholders
    Custom(Vec<String>),
}

impl ToolKind {
    pub fn default_program(&self) -> &'static str {
        match self {
            ToolKind::Ssconvert => "ssconvert",
            ToolKind::Libreoffice => "soffice",
            ToolKind::Custom(_) => "",
        }
    }

    fn install_hint(&self) -> &'static str {
        match self {
            ToolKind::Ssconvert => {
                "install Gnumeric (it provides ssconvert) or set converter.backend to `builtin`"
            }
            ToolKind::Libreoffice => {
                "install LibreOffice (it provides soffice) or set converter.backend to `builtin`"
            }
            ToolKind::Custom(_) => "check converter.program in the configuration",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternalTool {
    kind: ToolKind,
    program: String,
    timeout: Duration,
    cancel: CancelToken,
}

impl ExternalTool {
    pub fn new(kind: ToolKind, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kind,
            program: program.into(),
            timeout,
            cancel: CancelToken::new(),
        }
    }

    pub fn ssconvert(timeout: Duration) -> Self {
        Self::new(ToolKind::Ssconvert, "ssconvert", timeout)
    }

    pub fn libreoffice(timeout: Duration) -> Self {
        Self::new(ToolKind::Libreoffice, "soffice", timeout)
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn build_command(&self, input: &Path, output: &Path, ext: &str) -> Command {
        let outdir = output.parent().unwrap_or_else(|| Path::new("."));
        let mut command = Command::new(&self.program);
        match &self.kind {
            ToolKind::Ssconvert => {
                command.arg(input).arg(output);
            }
            ToolKind::Libreoffice => {
                command
                    .args(["--headless", "--convert-to", ext, "--outdir"])
                    .arg(outdir)
                    .arg(input);
            }
            ToolKind::Custom(args) => {
                command.args(args.iter().map(|arg| {
                    arg.replace("{input}", &input.to_string_lossy())
                        .replace("{output}", &output.to_string_lossy())
                        .replace("{outdir}", &outdir.to_string_lossy())
                        .replace("{ext}", ext)
                }));
            }
        }
        command
    }

    fn spawn(&self, mut command: Command) -> Result<Child, ConversionError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ConversionError::ToolMissing {
                    tool: self.program.clone(),
                    hint: self.kind.install_hint().to_string(),
                },
                _ => ConversionError::ToolFailed {
                    tool: self.program.clone(),
                    detail: e.to_string(),
                },
            })
    }

    /// Block until the child exits, the timeout passes, or the token fires
    fn wait(&self, mut child: Child) -> Result<(), ConversionError> {
        let stderr = child.stderr.take().map(drain);
        let deadline = Instant::now() + self.timeout;
        loop {
            let status = child.try_wait().map_err(|e| ConversionError::ToolFailed {
                tool: self.program.clone(),
                detail: e.to_string(),
            })?;

            if let Some(status) = status {
                if status.success() {
                    return Ok(());
                }
                let stderr = stderr
                    .and_then(|rx| rx.recv_timeout(STDERR_GRACE).ok())
                    .unwrap_or_default();
                let stderr = String::from_utf8_lossy(&stderr);
                return Err(ConversionError::ToolFailed {
                    tool: self.program.clone(),
                    detail: format!("{} {}", status, stderr.trim()).trim().to_string(),
                });
            }

            if self.cancel.is_cancelled() {
                stop(&mut child);
                return Err(ConversionError::Cancelled {
                    tool: self.program.clone(),
                });
            }

            if Instant::now() >= deadline {
                stop(&mut child);
                tracing::warn!(tool = %self.program, timeout = ?self.timeout, "conversion timed out");
                return Err(ConversionError::TimedOut {
                    tool: self.program.clone(),
                    after: self.timeout,
                });
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Read a pipe to its end on a separate thread so the child never blocks on
/// a full buffer. The bytes arrive on the returned channel once the pipe
/// closes.
fn drain(mut pipe: ChildStderr) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            tracing::debug!(error = %e, "stopped reading converter stderr");
        }
        let _ = tx.send(buf);
    });
    rx
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl ConversionService for ExternalTool {
    fn name(&self) -> &str {
        &self.program
    }

    fn convert(&self, input: &Path, output: &Path, ext: &str) -> Result<(), ConversionError> {
        let command = self.build_command(input, output, ext);
        tracing::debug!(command = ?command, "running conversion tool");

        let child = self.spawn(command)?;
        self.wait(child)?;

        // soffice names its output after the input file
        if self.kind == ToolKind::Libreoffice {
            if let (Some(outdir), Some(stem)) = (output.parent(), input.file_stem()) {
                let produced = outdir.join(format!("{}.{}", stem.to_string_lossy(), ext));
                if produced != output && produced.exists() {
                    fs::rename(&produced, output).map_err(|e| ConversionError::ToolFailed {
                        tool: self.program.clone(),
                        detail: format!("could not rename {}: {}", produced.display(), e),
                    })?;
                }
            }
        }
        Ok(())
    }
}
