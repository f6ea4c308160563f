//! Scan pass: resolve targets, stat both sides and collect conflict decisions.
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use super::context::{DeployContext, DeployFile};
use super::decision::{ReplaceDecision, ReplacePolicy};
use crate::error::{ConfigError, DeployError};
use crate::logging::Log;
use crate::operations::{FileSystemOps, same_file_error};

/// One planned copy, built by [`scan`] and consumed by the execute pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    /// Display name of the file.
    pub name: String,
    /// Source path.
    pub source: PathBuf,
    /// Fully resolved destination path.
    pub target: PathBuf,
    /// Source size in bytes at scan time.
    pub size: u64,
    /// Conflict decision; [`ReplaceDecision::NotSet`] when the target did not exist.
    pub decision: ReplaceDecision,
    /// Source modification time at scan time.
    pub source_modified: SystemTime,
    /// Target modification time, `None` when the target does not exist.
    pub target_modified: Option<SystemTime>,
}

/// Why a task is not copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The policy chose [`ReplaceDecision::Skip`].
    Policy,
    /// `ReplaceOlder` and both sides have the same modification time.
    SameAge,
    /// `ReplaceOlder` and the target is newer than the source.
    TargetNewer,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Policy => "kept existing target",
            Self::SameAge => "same age",
            Self::TargetNewer => "target is newer",
        })
    }
}

/// What the execute pass will do with a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// Copy the source over the target.
    Copy,
    /// Leave the target untouched.
    Skip(SkipReason),
}

impl CopyTask {
    /// Resolve the decision against the recorded modification times.
    #[must_use]
    pub fn action(&self) -> PlannedAction {
        match (self.decision, self.target_modified) {
            (ReplaceDecision::Skip | ReplaceDecision::Abort, _) => {
                PlannedAction::Skip(SkipReason::Policy)
            }
            (ReplaceDecision::ReplaceOlder, Some(target_modified)) => {
                match self.source_modified.cmp(&target_modified) {
                    std::cmp::Ordering::Greater => PlannedAction::Copy,
                    std::cmp::Ordering::Equal => PlannedAction::Skip(SkipReason::SameAge),
                    std::cmp::Ordering::Less => PlannedAction::Skip(SkipReason::TargetNewer),
                }
            }
            _ => PlannedAction::Copy,
        }
    }
}

/// Join `relative` onto `dir`, refusing paths that could leave `dir`.
///
/// # Errors
///
/// Returns [`ConfigError::UnsafePath`] for empty, absolute or `..` paths.
pub fn join_relative(dir: &Path, relative: &Path) -> Result<PathBuf, ConfigError> {
    let mut joined = dir.to_path_buf();
    let mut pushed = false;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::UnsafePath(relative.display().to_string()));
            }
        }
    }
    if !pushed {
        return Err(ConfigError::UnsafePath(relative.display().to_string()));
    }
    Ok(joined)
}

/// Run the scan pass over `files`.
///
/// Excluded files are dropped; every other file yields one [`CopyTask`] in
/// input order.  The policy is consulted only for files whose target
/// already exists.
///
/// # Errors
///
/// - [`ConfigError::UnresolvedTargetId`] or [`ConfigError::UnsafePath`]
///   (wrapped in [`DeployError::Config`]) for unresolvable destinations
/// - [`DeployError::Io`] when a source is missing, a path cannot be stat'ed,
///   or a destination resolves to its own source
/// - [`DeployError::Cancelled`] as soon as the policy answers
///   [`ReplaceDecision::Abort`]
pub fn scan(
    files: &[DeployFile],
    ctx: &dyn DeployContext,
    policy: &dyn ReplacePolicy,
    fs: &dyn FileSystemOps,
    log: &dyn Log,
) -> Result<Vec<CopyTask>, DeployError> {
    let mut tasks = Vec::with_capacity(files.len());

    for file in files {
        if !ctx.is_included(file) {
            log.debug(&format!("excluded by filter: {}", file.name));
            continue;
        }

        let dir = ctx
            .resolve_target_id(&file.target_id)
            .ok_or_else(|| ConfigError::UnresolvedTargetId(file.target_id.clone()))?;
        let target = join_relative(&dir, &file.relative_path)?;

        let source_stat = fs
            .stat(&file.source)
            .map_err(|e| DeployError::io("stat", &file.source, e))?
            .ok_or_else(|| {
                DeployError::io("stat", &file.source, io::Error::from(io::ErrorKind::NotFound))
            })?;
        if source_stat.is_dir {
            return Err(DeployError::io(
                "stat",
                &file.source,
                io::Error::from(io::ErrorKind::IsADirectory),
            ));
        }

        let target_stat = fs
            .stat(&target)
            .map_err(|e| DeployError::io("stat", &target, e))?;

        let (decision, target_modified) = match target_stat {
            Some(stat) if stat.is_dir => {
                return Err(DeployError::io(
                    "stat",
                    &target,
                    io::Error::from(io::ErrorKind::IsADirectory),
                ));
            }
            Some(stat) => {
                if fs
                    .same_file(&file.source, &target)
                    .map_err(|e| DeployError::io("compare", &target, e))?
                {
                    return Err(DeployError::io("compare", &target, same_file_error()));
                }
                let decision =
                    policy.decide(&file.source, source_stat.modified, &target, stat.modified);
                (decision, Some(stat.modified))
            }
            None => (ReplaceDecision::NotSet, None),
        };

        if decision == ReplaceDecision::Abort {
            log.warn(&format!("aborted at conflict: {}", target.display()));
            return Err(DeployError::Cancelled {
                reason: format!("abort requested for {}", target.display()),
            });
        }

        log.debug(&format!(
            "{} -> {} ({decision})",
            file.name,
            target.display()
        ));
        tasks.push(CopyTask {
            name: file.name.clone(),
            source: file.source.clone(),
            target,
            size: source_stat.size,
            decision,
            source_modified: source_stat.modified,
            target_modified,
        });
    }

    Ok(tasks)
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
    use crate::deploy::decision::{FixedPolicy, MockReplacePolicy};
    use crate::deploy::test_helpers::{MapContext, RecordingLog};
    use crate::operations::MockFileSystemOps;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn task(decision: ReplaceDecision, source: u64, target: Option<u64>) -> CopyTask {
        CopyTask {
            name: "f".into(),
            source: "/src/f".into(),
            target: "/dst/f".into(),
            size: 1,
            decision,
            source_modified: at(source),
            target_modified: target.map(at),
        }
    }

    #[test]
    fn action_follows_decision_and_times() {
        use PlannedAction::{Copy, Skip};
        assert_eq!(task(ReplaceDecision::NotSet, 1, None).action(), Copy);
        assert_eq!(task(ReplaceDecision::NotSet, 1, Some(5)).action(), Copy);
        assert_eq!(task(ReplaceDecision::Replace, 1, Some(5)).action(), Copy);
        assert_eq!(
            task(ReplaceDecision::Skip, 9, Some(5)).action(),
            Skip(SkipReason::Policy)
        );
        assert_eq!(task(ReplaceDecision::ReplaceOlder, 9, Some(5)).action(), Copy);
        assert_eq!(
            task(ReplaceDecision::ReplaceOlder, 5, Some(5)).action(),
            Skip(SkipReason::SameAge)
        );
        assert_eq!(
            task(ReplaceDecision::ReplaceOlder, 1, Some(5)).action(),
            Skip(SkipReason::TargetNewer)
        );
    }

    #[test]
    fn join_relative_rejects_escapes() {
        let dir = Path::new("/srv");
        assert_eq!(
            join_relative(dir, Path::new("./a/b.txt")).unwrap(),
            PathBuf::from("/srv/a/b.txt")
        );
        assert!(join_relative(dir, Path::new("../etc/passwd")).is_err());
        assert!(join_relative(dir, Path::new("/etc/passwd")).is_err());
        assert!(join_relative(dir, Path::new("")).is_err());
        assert!(join_relative(dir, Path::new(".")).is_err());
    }

    #[test]
    fn new_targets_get_not_set_without_asking() {
        let fs = MockFileSystemOps::new().with_file("/src/a", 10, at(1));
        let ctx = MapContext::new("/dst");
        let mut policy = MockReplacePolicy::new();
        policy.expect_decide().never();
        let log = RecordingLog::default();

        let tasks = scan(
            &[DeployFile::new("/src/a", "", "a")],
            &ctx,
            &policy,
            &fs,
            &log,
        )
        .unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].target, PathBuf::from("/dst/a"));
        assert_eq!(tasks[0].size, 10);
        assert_eq!(tasks[0].decision, ReplaceDecision::NotSet);
        assert_eq!(tasks[0].target_modified, None);
    }

    #[test]
    fn conflicts_are_decided_by_policy_with_both_times() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/a", 10, at(100))
            .with_file("/dst/web/a", 3, at(50));
        let ctx = MapContext::new("/dst").with_location("web", "/dst/web");
        let mut policy = MockReplacePolicy::new();
        policy
            .expect_decide()
            .withf(|s, st, t, tt| {
                s == Path::new("/src/a")
                    && *st == at(100)
                    && t == Path::new("/dst/web/a")
                    && *tt == at(50)
            })
            .times(1)
            .return_const(ReplaceDecision::Skip);
        let log = RecordingLog::default();

        let tasks = scan(
            &[DeployFile::new("/src/a", "web", "a")],
            &ctx,
            &policy,
            &fs,
            &log,
        )
        .unwrap();

        assert_eq!(tasks[0].decision, ReplaceDecision::Skip);
        assert_eq!(tasks[0].target_modified, Some(at(50)));
    }

    #[test]
    fn target_that_is_its_own_source_fails_before_asking() {
        let fs = MockFileSystemOps::new().with_file("/dst/a", 5, at(1));
        let ctx = MapContext::new("/dst");
        let mut policy = MockReplacePolicy::new();
        policy.expect_decide().never();
        let log = RecordingLog::default();

        let err = scan(
            &[DeployFile::new("/dst/a", "", "a")],
            &ctx,
            &policy,
            &fs,
            &log,
        )
        .unwrap_err();

        match err {
            DeployError::Io { action, path, source } => {
                assert_eq!(action, "compare");
                assert_eq!(path, PathBuf::from("/dst/a"));
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn abort_stops_scan_at_first_conflict() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/a", 1, at(1))
            .with_file("/src/b", 1, at(1))
            .with_file("/dst/a", 1, at(1))
            .with_file("/dst/b", 1, at(1));
        let ctx = MapContext::new("/dst");
        let mut policy = MockReplacePolicy::new();
        policy
            .expect_decide()
            .times(1)
            .return_const(ReplaceDecision::Abort);
        let log = RecordingLog::default();

        let err = scan(
            &[
                DeployFile::new("/src/a", "", "a"),
                DeployFile::new("/src/b", "", "b"),
            ],
            &ctx,
            &policy,
            &fs,
            &log,
        )
        .unwrap_err();

        assert!(err.is_cancelled());
        assert!(fs.copies().is_empty());
    }

    #[test]
    fn unresolved_target_id_names_the_id() {
        let fs = MockFileSystemOps::new().with_file("/src/a", 1, at(1));
        let ctx = MapContext::new("/dst");
        let log = RecordingLog::default();

        let err = scan(
            &[DeployFile::new("/src/a", "assets", "a")],
            &ctx,
            &FixedPolicy(ReplaceDecision::Replace),
            &fs,
            &log,
        )
        .unwrap_err();

        assert!(
            matches!(&err, DeployError::Config(ConfigError::UnresolvedTargetId(id)) if id == "assets")
        );
        assert!(err.to_string().contains("assets"));
    }

    #[test]
    fn missing_source_is_io_error_naming_path() {
        let fs = MockFileSystemOps::new();
        let ctx = MapContext::new("/dst");
        let log = RecordingLog::default();

        let err = scan(
            &[DeployFile::new("/src/missing", "", "m")],
            &ctx,
            &FixedPolicy(ReplaceDecision::Replace),
            &fs,
            &log,
        )
        .unwrap_err();

        match err {
            DeployError::Io { path, source, .. } => {
                assert_eq!(path, PathBuf::from("/src/missing"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn excluded_files_are_dropped() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/a", 1, at(1))
            .with_file("/src/b.tmp", 1, at(1));
        let ctx = MapContext::new("/dst").excluding("/src/b.tmp");
        let log = RecordingLog::default();

        let tasks = scan(
            &[
                DeployFile::new("/src/a", "", "a"),
                DeployFile::new("/src/b.tmp", "", "b.tmp"),
            ],
            &ctx,
            &FixedPolicy(ReplaceDecision::Replace),
            &fs,
            &log,
        )
        .unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "/src/a");
        assert!(log.contains("excluded by filter: /src/b.tmp"));
    }
}
