//! The two-pass file deployer.
//!
//! A [`Deployer`] first [`scan`](Deployer::scan)s its input files, resolving
//! each target and asking the [`ReplacePolicy`] about existing targets, then
//! [`execute`](Deployer::execute)s the resulting [`CopyTask`]s in order while
//! reporting scaled progress to a [`ProgressSink`].
mod context;
mod decision;
mod execute;
mod progress;
mod prompt;
mod scan;

pub use context::{DeployContext, DeployFile};
pub use decision::{FixedPolicy, ReplaceDecision, ReplacePolicy};
pub use execute::{DeployReport, ExecuteOptions, FileOutcome, Outcome, execute};
pub use progress::{ProgressScaler, ProgressSink, TOTAL_PROGRESS_UNITS};
pub use prompt::PromptPolicy;
pub use scan::{CopyTask, PlannedAction, SkipReason, join_relative, scan};

use crate::error::DeployError;
use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};

/// Default filesystem used when none is injected.
static SYSTEM_FS: SystemFileSystemOps = SystemFileSystemOps;

/// Deploys files described by a [`DeployContext`].
///
/// Collaborators are borrowed for the duration of a run; the filesystem
/// defaults to [`SystemFileSystemOps`] and can be replaced with
/// [`with_fs_ops`](Self::with_fs_ops).
pub struct Deployer<'a> {
    ctx: &'a dyn DeployContext,
    policy: &'a dyn ReplacePolicy,
    fs: &'a dyn FileSystemOps,
    log: &'a dyn Log,
    progress: &'a dyn ProgressSink,
    opts: ExecuteOptions,
}

impl std::fmt::Debug for Deployer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("fs", &self.fs)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl<'a> Deployer<'a> {
    /// Create a deployer over the real filesystem.
    #[must_use]
    pub fn new(
        ctx: &'a dyn DeployContext,
        policy: &'a dyn ReplacePolicy,
        log: &'a dyn Log,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            ctx,
            policy,
            fs: &SYSTEM_FS,
            log,
            progress,
            opts: ExecuteOptions::default(),
        }
    }

    /// Use `fs` for all filesystem access.
    #[must_use]
    pub fn with_fs_ops(mut self, fs: &'a dyn FileSystemOps) -> Self {
        self.fs = fs;
        self
    }

    /// Log intended copies instead of performing them.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.opts.dry_run = dry_run;
        self
    }

    /// Copy source modification times onto copied targets.
    #[must_use]
    pub const fn preserve_timestamps(mut self, preserve: bool) -> Self {
        self.opts.preserve_timestamps = preserve;
        self
    }

    /// Run the scan pass.
    ///
    /// # Errors
    ///
    /// See [`scan()`].
    pub fn scan(&self, files: &[DeployFile]) -> Result<Vec<CopyTask>, DeployError> {
        self.log.stage("Scanning");
        let tasks = scan(files, self.ctx, self.policy, self.fs, self.log)?;
        let bytes = tasks.iter().fold(0u64, |acc, t| acc.saturating_add(t.size));
        self.log
            .info(&format!("{} files, {bytes} bytes to process", tasks.len()));
        Ok(tasks)
    }

    /// Run the execute pass over tasks produced by [`scan`](Self::scan).
    ///
    /// # Errors
    ///
    /// See [`execute()`].
    pub fn execute(&self, tasks: &[CopyTask]) -> Result<DeployReport, DeployError> {
        self.log.stage(if self.opts.dry_run {
            "Copying (dry run)"
        } else {
            "Copying"
        });
        let report = execute(tasks, self.opts, self.fs, self.progress, self.log)?;
        self.log.info(&report.summary());
        Ok(report)
    }

    /// Scan then execute.
    ///
    /// # Errors
    ///
    /// Returns the first error of either pass.  Cancellation during the
    /// execute pass is not an error; check [`DeployReport::cancelled`].
    pub fn deploy(&self, files: &[DeployFile]) -> Result<DeployReport, DeployError> {
        let tasks = self.scan(files)?;
        self.execute(&tasks)
    }
}
