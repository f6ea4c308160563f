pub mod deploy;
pub mod plan;
pub mod version;

use anyhow::Result;
use std::path::PathBuf;

use crate::cli::{DeployOpts, GlobalOpts};
use crate::config::{DEFAULT_MANIFEST, DeployConfig, Overrides, PolicyKind};
use crate::deploy::{FixedPolicy, PromptPolicy, ReplacePolicy};
use crate::logging::Logger;

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates manifest resolution and configuration loading so that each
/// command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Manifest the configuration was loaded from.
    pub manifest: PathBuf,
    /// Validated configuration.
    pub config: DeployConfig,
}

impl CommandSetup {
    /// Resolve the manifest path and load the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read, parsed or validated.
    pub fn init(global: &GlobalOpts, opts: &DeployOpts, log: &Logger) -> Result<Self> {
        let manifest = resolve_manifest(global);

        log.stage("Loading manifest");
        log.info(&format!("manifest: {}", manifest.display()));
        let overrides = Overrides {
            target: opts.target.clone(),
            replace: opts.replace,
        };
        let config = DeployConfig::load(&manifest, &overrides)?;

        log.info(&format!("target: {}", config.target_dir.display()));
        log.debug(&format!("policy: {}", config.policy));
        log.debug(&format!("{} locations", config.locations.len()));
        log.info(&format!("{} files listed", config.files.len()));

        Ok(Self { manifest, config })
    }

    /// Build the replace policy selected by the configuration.
    #[must_use]
    pub fn policy(&self) -> Box<dyn ReplacePolicy> {
        match self.config.policy {
            PolicyKind::Fixed(decision) => Box::new(FixedPolicy(decision)),
            PolicyKind::Prompt => Box::new(PromptPolicy::stdio()),
        }
    }
}

/// Manifest path from `--manifest` / `LOCALDEPLOY_MANIFEST`, or `./deploy.toml`.
#[must_use]
pub fn resolve_manifest(global: &GlobalOpts) -> PathBuf {
    global
        .manifest
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST))
}
