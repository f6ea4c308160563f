//! Structured logger with dry-run awareness, a progress bar and a summary.
use std::io::{IsTerminal as _, Write as _};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::subscriber::{DRY_RUN_TARGET, FILE_TARGET, PROGRESS_TARGET, STAGE_TARGET};
use super::types::{FileEntry, FileStatus, Log};
use super::utils::{log_file_path, render_bar, terminal_columns};
use crate::deploy::ProgressSink;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// State of the console progress bar.
#[derive(Debug, Default)]
struct ProgressLine {
    total: u32,
    done: u32,
    /// Whether the bar is currently drawn on the terminal.
    shown: bool,
    active: bool,
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Messages go through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) writes them to the
/// console and to `$XDG_CACHE_HOME/localdeploy/<command>.log`.
///
/// The logger is also the [`ProgressSink`] of a deployment: it renders a
/// single-row progress bar on stderr (only when stderr is a terminal) and
/// answers cancellation queries from a shared flag set by the Ctrl-C handler.
#[derive(Debug)]
pub struct Logger {
    files: Mutex<Vec<FileEntry>>,
    log_file: Option<PathBuf>,
    progress: Mutex<ProgressLine>,
    draw: bool,
    cancel: Arc<AtomicBool>,
}

impl Logger {
    /// Create a logger for `command`, remembering the cache log path for the summary.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    /// Create a logger that reports `log_file` in its summary.
    #[must_use]
    pub fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            log_file,
            progress: Mutex::new(ProgressLine::default()),
            draw: std::io::stderr().is_terminal(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share `flag` as the cancellation flag answered by [`ProgressSink::is_cancelled`].
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Handle to the cancellation flag, for installing a signal handler.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Return a clone of all recorded file entries.
    #[must_use]
    pub fn file_entries(&self) -> Vec<FileEntry> {
        self.files.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        self.clear_progress();
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        self.clear_progress();
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        self.clear_progress();
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        self.clear_progress();
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        self.clear_progress();
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        self.clear_progress();
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a file result for the summary and as a structured log record.
    pub fn record_file(&self, name: &str, status: FileStatus, message: Option<&str>) {
        self.clear_progress();
        tracing::debug!(
            target: FILE_TARGET,
            file = name,
            status = status.label(),
            detail = message.unwrap_or_default()
        );
        if let Ok(mut guard) = self.files.lock() {
            guard.push(FileEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed files.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count(FileStatus::Failed)
    }

    fn count(&self, status: FileStatus) -> usize {
        self.files
            .lock()
            .map_or(0, |guard| guard.iter().filter(|f| f.status == status).count())
    }

    /// One-line tally of the recorded files.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let total = self.files.lock().map_or(0, |g| g.len());
        format!(
            "{total} files: \x1b[32m{} copied\x1b[0m, \x1b[33m{} skipped\x1b[0m, \x1b[37m{} dry-run\x1b[0m, \x1b[31m{} failed\x1b[0m, \x1b[2m{} not processed\x1b[0m",
            self.count(FileStatus::Copied),
            self.count(FileStatus::Skipped),
            self.count(FileStatus::DryRun),
            self.count(FileStatus::Failed),
            self.count(FileStatus::Cancelled),
        )
    }

    /// Print the summary of all recorded files.
    ///
    /// Copied files are listed at debug level only; everything that did not
    /// copy is listed with its reason.
    pub fn print_summary(&self) {
        let files = match self.files.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        if files.is_empty() {
            return;
        }

        self.stage("Summary");

        for file in &files {
            let suffix = file
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            let (icon, color) = match file.status {
                FileStatus::Copied => {
                    self.debug(&format!("✓ {}{suffix}", file.name));
                    continue;
                }
                FileStatus::Skipped => ("○", "\x1b[33m"),
                FileStatus::DryRun => ("~", "\x1b[37m"),
                FileStatus::Failed => ("✗", "\x1b[31m"),
                FileStatus::Cancelled => ("·", "\x1b[2m"),
            };
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", file.name));
        }

        self.info(&self.summary_line());

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Units reported so far by the current (or last) execute pass.
    #[must_use]
    pub fn progress_done(&self) -> u32 {
        self.progress
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .done
    }

    /// Erase the progress bar from the console if it is shown.
    fn clear_progress(&self) {
        let mut line = self
            .progress
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if line.shown {
            let mut err = std::io::stderr();
            err.write_all(b"\r\x1b[K").ok();
            err.flush().ok();
            line.shown = false;
        }
    }

    /// Draw the progress bar, truncated to a single terminal row.
    fn draw_progress(&self, line: &mut ProgressLine) {
        if !self.draw || !line.active {
            return;
        }
        let width = terminal_columns().saturating_sub(16).clamp(10, 50);
        let bar = render_bar(line.done, line.total, width);
        let mut err = std::io::stderr();
        write!(err, "\r  \x1b[2m▹\x1b[0m {bar}").ok();
        err.flush().ok();
        line.shown = true;
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_file(&self, name: &str, status: FileStatus, message: Option<&str>) {
        self.record_file(name, status, message);
    }
}

impl ProgressSink for Logger {
    fn begin(&self, total_units: u32) {
        let mut line = self
            .progress
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *line = ProgressLine {
            total: total_units,
            done: 0,
            shown: line.shown,
            active: true,
        };
        self.draw_progress(&mut line);
    }

    fn step(&self, units: u32) {
        let mut line = self
            .progress
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        line.done = line.done.saturating_add(units);
        self.draw_progress(&mut line);
    }

    fn end(&self) {
        self.clear_progress();
        let mut line = self
            .progress
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if line.active {
            tracing::debug!(
                target: PROGRESS_TARGET,
                units = u64::from(line.done),
                total = u64::from(line.total)
            );
        }
        line.active = false;
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn logger_new_has_no_entries() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.file_entries().is_empty());
    }

    #[test]
    fn record_file_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_file("index.html", FileStatus::Skipped, Some("same age"));
        let entries = log.file_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "index.html");
        assert_eq!(entries[0].message.as_deref(), Some("same age"));
    }

    #[test]
    fn failure_count_counts_only_failed() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_file("a", FileStatus::Copied, None);
        log.record_file("b", FileStatus::Failed, Some("denied"));
        log.record_file("c", FileStatus::Cancelled, None);
        assert_eq!(log.failure_count(), 1);
    }

    #[test]
    fn summary_line_tallies_statuses() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_file("a", FileStatus::Copied, None);
        log.record_file("b", FileStatus::Copied, None);
        log.record_file("c", FileStatus::Skipped, None);
        let line = super::super::utils::strip_ansi(&log.summary_line());
        assert_eq!(
            line,
            "3 files: 2 copied, 1 skipped, 0 dry-run, 0 failed, 0 not processed"
        );
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record_file("via-trait", FileStatus::Copied, None);
        assert_eq!(log.file_entries().len(), 1);
    }

    #[test]
    fn progress_steps_accumulate() {
        let (log, _tmp, _guard) = isolated_logger();
        log.begin(1000);
        log.step(400);
        log.step(600);
        assert_eq!(log.progress_done(), 1000);
        log.end();
        log.begin(1000);
        assert_eq!(log.progress_done(), 0, "begin resets the counter");
    }

    #[test]
    fn cancel_flag_is_shared() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(!log.is_cancelled());
        log.cancel_flag().store(true, Ordering::SeqCst);
        assert!(log.is_cancelled());
    }

    #[test]
    fn debug_always_written_to_file() {
        let (log, tmp, _guard) = isolated_logger();
        let marker = format!("debug-marker-{}", std::process::id());
        log.debug(&marker);
        let contents = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert!(contents.contains(&marker));
        assert!(contents.contains("[debug]"));
    }

    #[test]
    fn stage_and_dry_run_tags_in_file() {
        let (log, tmp, _guard) = isolated_logger();
        log.stage("Copying");
        log.dry_run("would copy a -> b");
        log.warn("careful");
        let contents = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert!(contents.contains("==> Copying"));
        assert!(contents.contains("[DRY RUN] would copy a -> b"));
        assert!(contents.contains("[warn] careful"));
        assert!(contents.contains("localdeploy "), "run header missing");
        assert!(contents.contains(" test started "), "command missing from header");
    }

    #[test]
    fn file_outcomes_are_written_as_records() {
        let (log, tmp, _guard) = isolated_logger();
        log.record_file("src/a.txt", FileStatus::Skipped, Some("same age"));
        log.record_file("src/b.txt", FileStatus::Copied, None);
        let contents = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert!(contents.contains("[skipped] src/a.txt (same age)"), "{contents}");
        assert!(contents.contains("[copied] src/b.txt\n"), "{contents}");
    }

    #[test]
    fn progress_end_is_written_once() {
        let (log, tmp, _guard) = isolated_logger();
        log.begin(1000);
        log.step(250);
        log.end();
        log.end();
        let contents = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert_eq!(
            contents
                .matches("[progress] 250/1000 units (incomplete)")
                .count(),
            1
        );
    }

    #[test]
    fn ansi_codes_are_stripped_in_file() {
        let (log, tmp, _guard) = isolated_logger();
        log.info("\x1b[32mgreen\x1b[0m");
        let contents = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert!(contents.contains("green"));
        assert!(!contents.contains('\x1b'));
    }
}
