//! Core logging types: file entries, status, and the [`Log`] trait.

/// Per-file deployment result for summary reporting.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// File name as written in the manifest.
    pub name: String,
    /// Final status of the file.
    pub status: FileStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Outcome of one file in the execute pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Bytes were copied to the target.
    Copied,
    /// The existing target was kept.
    Skipped,
    /// Dry run; the file would have been copied.
    DryRun,
    /// Copying failed and the run stopped here.
    Failed,
    /// The run was cancelled before this file was reached.
    Cancelled,
}

impl FileStatus {
    /// Short lowercase label used in log records.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Copied => "copied",
            Self::Skipped => "skipped",
            Self::DryRun => "dry-run",
            Self::Failed => "failed",
            Self::Cancelled => "not processed",
        }
    }
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) is the production implementation;
/// deployment code only sees this trait so tests can substitute their own.
pub trait Log {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a file result for the summary.
    fn record_file(&self, name: &str, status: FileStatus, message: Option<&str>);
}
