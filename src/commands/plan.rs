//! Command: scan only, listing the decision for every file.
use anyhow::Result;
use std::path::Path;

use super::CommandSetup;
use crate::cli::{DeployOpts, GlobalOpts};
use crate::deploy::{CopyTask, Deployer, PlannedAction};
use crate::logging::Logger;

/// Run the plan command.
///
/// With the `prompt` policy the user is still asked about each conflict,
/// since those answers are what the plan shows.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the scan fails.
pub fn run(global: &GlobalOpts, opts: &DeployOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, opts, log)?;
    let policy = setup.policy();

    let tasks = Deployer::new(&setup.config, policy.as_ref(), log, log)
        .scan(&setup.config.files)?;

    log.stage("Plan");
    for line in describe(&tasks, &setup.config.target_dir) {
        log.info(&line);
    }
    Ok(())
}

/// One line per task: `<name> -> <target>: <action>`.
///
/// Targets under `root` are shown relative to it.
#[must_use]
pub fn describe(tasks: &[CopyTask], root: &Path) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let target = task.target.strip_prefix(root).unwrap_or(&task.target);
            let action = match (task.action(), task.target_modified) {
                (PlannedAction::Copy, None) => "copy (new)".to_string(),
                (PlannedAction::Copy, Some(_)) => format!("copy ({})", task.decision),
                (PlannedAction::Skip(reason), _) => format!("skip ({reason})"),
            };
            format!("{} -> {}: {action}", task.name, target.display())
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::deploy::ReplaceDecision;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn task(name: &str, decision: ReplaceDecision, target_secs: Option<u64>) -> CopyTask {
        CopyTask {
            name: name.into(),
            source: PathBuf::from("/src").join(name),
            target: PathBuf::from("/dst").join(name),
            size: 1,
            decision,
            source_modified: SystemTime::UNIX_EPOCH + Duration::from_secs(100),
            target_modified: target_secs.map(|s| SystemTime::UNIX_EPOCH + Duration::from_secs(s)),
        }
    }

    #[test]
    fn describe_lists_each_action() {
        let lines = describe(
            &[
                task("new.txt", ReplaceDecision::NotSet, None),
                task("over.txt", ReplaceDecision::Replace, Some(500)),
                task("kept.txt", ReplaceDecision::Skip, Some(1)),
                task("same.txt", ReplaceDecision::ReplaceOlder, Some(100)),
            ],
            Path::new("/dst"),
        );
        assert_eq!(
            lines,
            vec![
                "new.txt -> new.txt: copy (new)",
                "over.txt -> over.txt: copy (replace)",
                "kept.txt -> kept.txt: skip (kept existing target)",
                "same.txt -> same.txt: skip (same age)",
            ]
        );
    }

    #[test]
    fn targets_outside_root_stay_absolute() {
        let lines = describe(
            &[task("a", ReplaceDecision::NotSet, None)],
            Path::new("/elsewhere"),
        );
        assert_eq!(lines, vec!["a -> /dst/a: copy (new)"]);
    }
}
