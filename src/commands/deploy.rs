//! Command: scan and copy.
use anyhow::Result;

use super::CommandSetup;
use super::version::version;
use crate::cli::{DeployOpts, GlobalOpts};
use crate::deploy::Deployer;
use crate::logging::Logger;

/// Run the deploy command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the scan or a copy
/// fails, or the run is cancelled (by an abort answer or by Ctrl-C).
pub fn run(global: &GlobalOpts, opts: &DeployOpts, log: &Logger) -> Result<()> {
    log.info(&format!("localdeploy {}", version()));

    let setup = CommandSetup::init(global, opts, log)?;
    let policy = setup.policy();

    let result = Deployer::new(&setup.config, policy.as_ref(), log, log)
        .dry_run(global.dry_run)
        .preserve_timestamps(setup.config.preserve_timestamps)
        .deploy(&setup.config.files);

    log.print_summary();

    let report = result?;
    if report.cancelled {
        anyhow::bail!(
            "deployment cancelled: {} file(s) not processed",
            report.pending
        );
    }
    Ok(())
}
