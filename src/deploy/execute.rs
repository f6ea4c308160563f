//! Execute pass: copy or skip each scanned task while reporting progress.
use std::path::PathBuf;

use super::progress::{FileProgress, ProgressScaler, ProgressSink, TOTAL_PROGRESS_UNITS};
use super::scan::{CopyTask, PlannedAction, SkipReason};
use crate::error::DeployError;
use crate::logging::{FileStatus, Log};
use crate::operations::FileSystemOps;

/// Switches for the execute pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Log what would be copied without touching the filesystem.
    pub dry_run: bool,
    /// Copy the source modification time onto each copied target.
    pub preserve_timestamps: bool,
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The file was copied.
    Copied {
        /// Bytes written.
        bytes: u64,
    },
    /// The target was left untouched.
    Skipped(SkipReason),
    /// Dry run; the file would have been copied.
    WouldCopy,
}

/// Outcome of one processed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Display name of the file.
    pub name: String,
    /// Destination path.
    pub target: PathBuf,
    /// What happened.
    pub outcome: Outcome,
}

/// Result of a deployment run.
#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    /// Processed files, in order.
    pub outcomes: Vec<FileOutcome>,
    /// Total bytes written.
    pub bytes_copied: u64,
    /// The run stopped early because cancellation was requested.
    pub cancelled: bool,
    /// Files left unprocessed by cancellation.
    pub pending: usize,
    /// Progress units reported to the sink.
    pub units_reported: u32,
}

impl DeployReport {
    /// Number of files copied.
    #[must_use]
    pub fn copied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Copied { .. }))
    }

    /// Number of files skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    /// Number of files a dry run would have copied.
    #[must_use]
    pub fn would_copy(&self) -> usize {
        self.count(|o| matches!(o, Outcome::WouldCopy))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|f| pred(&f.outcome)).count()
    }

    /// One-line summary, e.g. `"3 copied, 1 skipped"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use localdeploy_cli::deploy::DeployReport;
    ///
    /// let report = DeployReport { pending: 2, cancelled: true, ..DeployReport::default() };
    /// assert_eq!(report.summary(), "0 copied, 0 skipped, 2 not processed");
    /// ```
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if self.would_copy() > 0 {
            parts.push(format!("{} would copy", self.would_copy()));
        } else {
            parts.push(format!("{} copied", self.copied()));
        }
        parts.push(format!("{} skipped", self.skipped()));
        if self.pending > 0 {
            parts.push(format!("{} not processed", self.pending));
        }
        parts.join(", ")
    }
}

/// Feeds byte counts through the scaler into the sink.
struct Reporter<'a> {
    scaler: ProgressScaler,
    sink: &'a dyn ProgressSink,
    units: u32,
}

impl Reporter<'_> {
    fn advance(&mut self, bytes: u64) {
        let units = self.scaler.advance(bytes);
        self.emit(units);
    }

    fn finish(&mut self) {
        let units = self.scaler.finish();
        self.emit(units);
    }

    fn emit(&mut self, units: u32) {
        if units > 0 {
            self.sink.step(units);
            self.units += units;
        }
    }
}

/// Run the execute pass over `tasks` in order.
///
/// Cancellation is checked once before each file; a cancelled run returns
/// `Ok` with [`DeployReport::cancelled`] set and leaves already-copied files
/// in place.  [`ProgressSink::end`] is called whether the run succeeds or not.
///
/// # Errors
///
/// Returns [`DeployError::Io`] when a directory cannot be created, a copy
/// fails, or a timestamp cannot be set.  Processing stops at the first error.
pub fn execute(
    tasks: &[CopyTask],
    opts: ExecuteOptions,
    fs: &dyn FileSystemOps,
    progress: &dyn ProgressSink,
    log: &dyn Log,
) -> Result<DeployReport, DeployError> {
    let total = tasks.iter().fold(0u64, |acc, t| acc.saturating_add(t.size));
    let mut reporter = Reporter {
        scaler: ProgressScaler::new(total),
        sink: progress,
        units: 0,
    };

    progress.begin(TOTAL_PROGRESS_UNITS);
    let result = run(tasks, opts, fs, &mut reporter, log);
    progress.end();

    result.map(|mut report| {
        report.units_reported = reporter.units;
        report
    })
}

fn run(
    tasks: &[CopyTask],
    opts: ExecuteOptions,
    fs: &dyn FileSystemOps,
    reporter: &mut Reporter<'_>,
    log: &dyn Log,
) -> Result<DeployReport, DeployError> {
    let mut report = DeployReport::default();

    for (index, task) in tasks.iter().enumerate() {
        if reporter.sink.is_cancelled() {
            report.cancelled = true;
            report.pending = tasks.len() - index;
            log.warn(&format!(
                "cancelled: {} of {} files not processed",
                report.pending,
                tasks.len()
            ));
            for rest in tasks.iter().skip(index) {
                log.record_file(&rest.name, FileStatus::Cancelled, None);
            }
            return Ok(report);
        }

        if !opts.dry_run
            && let Err(e) = ensure_parent(task, fs)
        {
            log.error(&format!("{}: {e}", task.name));
            log.record_file(&task.name, FileStatus::Failed, Some(&e.to_string()));
            return Err(e);
        }

        let outcome = match task.action() {
            PlannedAction::Skip(reason) => {
                log.info(&format!("skip {}: {reason}", task.name));
                log.record_file(&task.name, FileStatus::Skipped, Some(&reason.to_string()));
                reporter.advance(task.size);
                Outcome::Skipped(reason)
            }
            PlannedAction::Copy if opts.dry_run => {
                log.dry_run(&format!(
                    "would copy {} -> {}",
                    task.name,
                    task.target.display()
                ));
                log.record_file(&task.name, FileStatus::DryRun, None);
                reporter.advance(task.size);
                Outcome::WouldCopy
            }
            PlannedAction::Copy => match copy_one(task, opts, fs, reporter, log) {
                Ok(bytes) => {
                    report.bytes_copied = report.bytes_copied.saturating_add(bytes);
                    Outcome::Copied { bytes }
                }
                Err(e) => {
                    log.error(&format!("{}: {e}", task.name));
                    log.record_file(&task.name, FileStatus::Failed, Some(&e.to_string()));
                    return Err(e);
                }
            },
        };

        report.outcomes.push(FileOutcome {
            name: task.name.clone(),
            target: task.target.clone(),
            outcome,
        });
    }

    reporter.finish();
    Ok(report)
}

/// Make sure the directory holding `task.target` exists.
fn ensure_parent(task: &CopyTask, fs: &dyn FileSystemOps) -> Result<(), DeployError> {
    match task.target.parent() {
        Some(parent) => fs
            .create_dir_all(parent)
            .map_err(|e| DeployError::io("create directory", parent, e)),
        None => Ok(()),
    }
}

/// Copy a single task, reporting exactly `task.size` bytes of progress.
fn copy_one(
    task: &CopyTask,
    opts: ExecuteOptions,
    fs: &dyn FileSystemOps,
    reporter: &mut Reporter<'_>,
    log: &dyn Log,
) -> Result<u64, DeployError> {
    let mut file = FileProgress::default();
    let size = task.size;
    let bytes = fs
        .copy_file(&task.source, &task.target, &mut |cumulative| {
            reporter.advance(file.delta(cumulative.min(size)));
        })
        .map_err(|e| DeployError::io("copy", &task.source, e))?;
    // A file that shrank since the scan still accounts for its scanned size.
    reporter.advance(size.saturating_sub(file.reported()));

    if opts.preserve_timestamps {
        fs.set_modified(&task.target, task.source_modified)
            .map_err(|e| DeployError::io("set modification time of", &task.target, e))?;
    }

    log.debug(&format!(
        "copied {} -> {} ({bytes} bytes)",
        task.name,
        task.target.display()
    ));
    log.record_file(&task.name, FileStatus::Copied, None);
    Ok(bytes)
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::deploy::decision::ReplaceDecision;
    use crate::deploy::test_helpers::{RecordingLog, RecordingProgress};
    use crate::operations::MockFileSystemOps;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn task(name: &str, size: u64, decision: ReplaceDecision) -> CopyTask {
        CopyTask {
            name: name.into(),
            source: PathBuf::from("/src").join(name),
            target: PathBuf::from("/dst").join(name),
            size,
            decision,
            source_modified: at(100),
            target_modified: None,
        }
    }

    fn fs_for(tasks: &[CopyTask]) -> MockFileSystemOps {
        tasks.iter().fold(MockFileSystemOps::new(), |fs, t| {
            fs.with_file(t.source.clone(), t.size, t.source_modified)
        })
    }

    #[test]
    fn copies_everything_and_reports_exactly_1000_units() {
        let tasks = vec![
            task("a", 333, ReplaceDecision::Replace),
            task("b", 333, ReplaceDecision::Replace),
            task("c", 334, ReplaceDecision::NotSet),
            task("d", 7, ReplaceDecision::Replace),
        ];
        let fs = fs_for(&tasks);
        let progress = RecordingProgress::default();
        let log = RecordingLog::default();

        let report = execute(&tasks, ExecuteOptions::default(), &fs, &progress, &log).unwrap();

        assert_eq!(report.copied(), 4);
        assert_eq!(report.bytes_copied, 1007);
        assert!(!report.cancelled);
        assert_eq!(progress.total(), TOTAL_PROGRESS_UNITS);
        assert_eq!(report.units_reported, TOTAL_PROGRESS_UNITS);
        assert_eq!(progress.begun(), Some(TOTAL_PROGRESS_UNITS));
        assert!(progress.ended());
        assert_eq!(fs.copies().len(), 4);
    }

    #[test]
    fn empty_files_still_sum_to_1000() {
        let tasks = vec![
            task("a", 0, ReplaceDecision::Replace),
            task("b", 0, ReplaceDecision::Replace),
        ];
        let fs = fs_for(&tasks);
        let progress = RecordingProgress::default();
        let report = execute(
            &tasks,
            ExecuteOptions::default(),
            &fs,
            &progress,
            &RecordingLog::default(),
        )
        .unwrap();
        assert_eq!(report.copied(), 2);
        assert_eq!(progress.total(), TOTAL_PROGRESS_UNITS);
    }

    #[test]
    fn no_tasks_reports_full_progress() {
        let progress = RecordingProgress::default();
        let report = execute(
            &[],
            ExecuteOptions::default(),
            &MockFileSystemOps::new(),
            &progress,
            &RecordingLog::default(),
        )
        .unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(progress.total(), TOTAL_PROGRESS_UNITS);
    }

    #[test]
    fn replace_older_with_equal_times_skips_as_same_age() {
        let mut t = task("a", 50, ReplaceDecision::ReplaceOlder);
        t.target_modified = Some(t.source_modified);
        let tasks = vec![t];
        let fs = fs_for(&tasks);
        let progress = RecordingProgress::default();
        let log = RecordingLog::default();

        let report = execute(&tasks, ExecuteOptions::default(), &fs, &progress, &log).unwrap();

        assert_eq!(report.skipped(), 1);
        assert_eq!(
            report.outcomes[0].outcome,
            Outcome::Skipped(SkipReason::SameAge)
        );
        assert!(fs.copies().is_empty());
        assert!(log.contains("same age"));
        assert_eq!(progress.total(), TOTAL_PROGRESS_UNITS);
    }

    #[test]
    fn replace_older_with_newer_target_logs_target_is_newer() {
        let mut t = task("a", 50, ReplaceDecision::ReplaceOlder);
        t.target_modified = Some(at(200));
        let tasks = vec![t];
        let fs = fs_for(&tasks);
        let log = RecordingLog::default();

        execute(
            &tasks,
            ExecuteOptions::default(),
            &fs,
            &RecordingProgress::default(),
            &log,
        )
        .unwrap();

        assert!(fs.copies().is_empty());
        assert!(log.contains("target is newer"));
    }

    #[test]
    fn replace_older_with_older_target_copies() {
        let mut t = task("a", 50, ReplaceDecision::ReplaceOlder);
        t.target_modified = Some(at(10));
        let tasks = vec![t];
        let fs = fs_for(&tasks);
        let report = execute(
            &tasks,
            ExecuteOptions::default(),
            &fs,
            &RecordingProgress::default(),
            &RecordingLog::default(),
        )
        .unwrap();
        assert_eq!(report.copied(), 1);
    }

    #[test]
    fn cancellation_after_k_files_leaves_k_copies() {
        let tasks: Vec<CopyTask> = (0..5)
            .map(|i| task(&format!("f{i}"), 100, ReplaceDecision::Replace))
            .collect();
        let fs = fs_for(&tasks);
        let progress = RecordingProgress::default().cancel_after(2);
        let log = RecordingLog::default();

        let report = execute(&tasks, ExecuteOptions::default(), &fs, &progress, &log).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.copied(), 2);
        assert_eq!(report.pending, 3);
        assert_eq!(fs.copies().len(), 2);
        assert!(progress.total() < TOTAL_PROGRESS_UNITS);
        assert!(progress.ended());
        assert_eq!(log.files_with(FileStatus::Cancelled).len(), 3);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tasks = vec![
            task("a", 10, ReplaceDecision::Replace),
            task("b", 10, ReplaceDecision::Skip),
        ];
        let fs = fs_for(&tasks);
        let progress = RecordingProgress::default();
        let log = RecordingLog::default();
        let opts = ExecuteOptions {
            dry_run: true,
            preserve_timestamps: false,
        };

        let report = execute(&tasks, opts, &fs, &progress, &log).unwrap();

        assert_eq!(report.would_copy(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(fs.copies().is_empty());
        assert!(fs.created_dirs().is_empty());
        assert!(log.contains("would copy a -> /dst/a"));
        assert_eq!(progress.total(), TOTAL_PROGRESS_UNITS);
        assert_eq!(report.summary(), "1 would copy, 1 skipped");
    }

    #[test]
    fn copy_failure_stops_the_run() {
        let tasks = vec![
            task("a", 10, ReplaceDecision::Replace),
            task("b", 10, ReplaceDecision::Replace),
            task("c", 10, ReplaceDecision::Replace),
        ];
        let fs = fs_for(&tasks).fail_copy_of("/src/b");
        let progress = RecordingProgress::default();
        let log = RecordingLog::default();

        let err = execute(&tasks, ExecuteOptions::default(), &fs, &progress, &log).unwrap_err();

        match err {
            DeployError::Io { action, path, .. } => {
                assert_eq!(action, "copy");
                assert_eq!(path, PathBuf::from("/src/b"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs.copies().len(), 1);
        assert!(progress.ended());
        assert_eq!(log.files_with(FileStatus::Failed), vec!["b".to_string()]);
    }

    #[test]
    fn parent_directories_are_created() {
        let mut t = task("a", 1, ReplaceDecision::NotSet);
        t.target = PathBuf::from("/dst/deep/er/a");
        let tasks = vec![t];
        let fs = fs_for(&tasks);
        execute(
            &tasks,
            ExecuteOptions::default(),
            &fs,
            &RecordingProgress::default(),
            &RecordingLog::default(),
        )
        .unwrap();
        assert_eq!(fs.created_dirs(), vec![PathBuf::from("/dst/deep/er")]);
    }

    #[test]
    fn skipped_files_still_get_their_directory() {
        let mut t = task("a", 1, ReplaceDecision::Skip);
        t.target = PathBuf::from("/dst/kept/a");
        t.target_modified = Some(at(1));
        let tasks = vec![t];
        let fs = fs_for(&tasks);
        let report = execute(
            &tasks,
            ExecuteOptions::default(),
            &fs,
            &RecordingProgress::default(),
            &RecordingLog::default(),
        )
        .unwrap();
        assert_eq!(report.skipped(), 1);
        assert!(fs.copies().is_empty());
        assert_eq!(fs.created_dirs(), vec![PathBuf::from("/dst/kept")]);
    }

    #[test]
    fn preserve_timestamps_sets_source_mtime() {
        let tasks = vec![task("a", 4, ReplaceDecision::Replace)];
        let fs = fs_for(&tasks);
        let opts = ExecuteOptions {
            dry_run: false,
            preserve_timestamps: true,
        };
        execute(
            &tasks,
            opts,
            &fs,
            &RecordingProgress::default(),
            &RecordingLog::default(),
        )
        .unwrap();
        assert_eq!(fs.modified(Path::new("/dst/a")), Some(at(100)));
    }

    #[test]
    fn shrunk_file_still_accounts_for_scanned_size() {
        let mut tasks = vec![
            task("a", 500, ReplaceDecision::Replace),
            task("b", 500, ReplaceDecision::Replace),
        ];
        // Only 100 bytes on "disk" for a, though the scan saw 500.
        let fs = MockFileSystemOps::new()
            .with_file("/src/a", 100, at(1))
            .with_file("/src/b", 500, at(1));
        tasks[0].source_modified = at(1);
        let progress = RecordingProgress::default();

        execute(
            &tasks,
            ExecuteOptions::default(),
            &fs,
            &progress,
            &RecordingLog::default(),
        )
        .unwrap();

        let steps = progress.steps();
        assert_eq!(progress.total(), TOTAL_PROGRESS_UNITS);
        // After file a, exactly half of the units have been reported.
        let mut running = 0;
        let mut saw_half = false;
        for s in steps {
            running += s;
            saw_half |= running == 500;
        }
        assert!(saw_half);
    }
}
