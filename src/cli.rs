use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PolicyKind;

/// Top-level CLI entry point for the local file deployer.
#[derive(Parser, Debug)]
#[command(
    name = "localdeploy",
    about = "Copy files into local target directories with conflict resolution",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by all subcommands.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Deploy manifest (defaults to ./deploy.toml)
    #[arg(short, long, global = true, env = "LOCALDEPLOY_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Preview changes without copying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan and copy files
    Deploy(DeployOpts),
    /// Scan only and list what each file would do
    Plan(DeployOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file of this command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Deploy(_) => "deploy",
            Self::Plan(_) => "plan",
            Self::Version => "version",
        }
    }
}

/// Options for the `deploy` and `plan` subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct DeployOpts {
    /// Target directory (overrides the manifest)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Conflict policy: skip, replace, replace-older, prompt or abort
    #[arg(short, long)]
    pub replace: Option<PolicyKind>,
}
