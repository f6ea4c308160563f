//! Deploy configuration: manifest loading, validation and path resolution.
pub mod filter;
pub mod manifest;
pub mod toml_loader;

use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::deploy::{DeployContext, DeployFile, ReplaceDecision};
use crate::error::ConfigError;
use filter::PathFilter;
use manifest::Manifest;

/// Manifest file name used when none is given.
pub const DEFAULT_MANIFEST: &str = "deploy.toml";

/// Replace policy selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Answer every conflict with the same decision.
    Fixed(ReplaceDecision),
    /// Ask the user on the terminal.
    Prompt,
}

impl Default for PolicyKind {
    fn default() -> Self {
        Self::Fixed(ReplaceDecision::ReplaceOlder)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(decision) => decision.fmt(f),
            Self::Prompt => f.write_str("prompt"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("prompt") {
            return Ok(Self::Prompt);
        }
        match s.parse::<ReplaceDecision>()? {
            ReplaceDecision::NotSet => Err(ConfigError::UnknownPolicy(s.to_string())),
            decision => Ok(Self::Fixed(decision)),
        }
    }
}

/// Command-line values that take precedence over the manifest.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Target directory, used as given.
    pub target: Option<String>,
    /// Replace policy.
    pub replace: Option<PolicyKind>,
}

/// Validated deployment configuration.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Directory containing the manifest; relative sources resolve against it.
    pub manifest_dir: PathBuf,
    /// Directory the empty target-ID resolves to.
    pub target_dir: PathBuf,
    /// Conflict policy.
    pub policy: PolicyKind,
    /// Copy source modification times onto copied targets.
    pub preserve_timestamps: bool,
    /// Resolved `[locations]`.
    pub locations: BTreeMap<String, PathBuf>,
    /// Compiled `[filter]`.
    pub filter: PathFilter,
    /// Files in manifest order.
    pub files: Vec<DeployFile>,
}

impl DeployConfig {
    /// Load and validate the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or parsed, or if it
    /// fails validation (see [`from_manifest`](Self::from_manifest)).
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
        let manifest: Manifest = toml_loader::load_config(path)?;
        let manifest_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_manifest(manifest, manifest_dir, overrides)
            .with_context(|| format!("invalid manifest {}", path.display()))
    }

    /// Validate a parsed manifest.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnconfiguredTarget`] if no target directory is set
    /// - [`ConfigError::EmptyLocation`] if the target directory is blank
    /// - [`ConfigError::UnknownPolicy`] for an unknown replace policy
    /// - [`ConfigError::InvalidPattern`] for a filter glob that does not compile
    /// - [`ConfigError::UnsafePath`] for a source with no file name and no
    ///   explicit relative path
    pub fn from_manifest(
        manifest: Manifest,
        manifest_dir: &Path,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let target_dir = match (&overrides.target, &manifest.target.directory) {
            (Some(cli), _) => PathBuf::from(non_blank(cli)?),
            (None, Some(dir)) => manifest_dir.join(non_blank(dir)?),
            (None, None) => return Err(ConfigError::UnconfiguredTarget),
        };

        let policy = match (overrides.replace, &manifest.target.replace) {
            (Some(policy), _) => policy,
            (None, Some(name)) => name.parse()?,
            (None, None) => PolicyKind::default(),
        };

        let locations = manifest
            .locations
            .into_iter()
            .map(|(id, dir)| (id, target_dir.join(dir)))
            .collect();

        let filter = PathFilter::new(&manifest.filter.include, &manifest.filter.exclude)?;

        let files = manifest
            .files
            .into_iter()
            .map(|entry| -> Result<DeployFile, ConfigError> {
                let source = manifest_dir.join(&entry.source);
                let relative_path = match entry.relative_path {
                    Some(rel) => PathBuf::from(rel),
                    None => source
                        .file_name()
                        .map(PathBuf::from)
                        .ok_or_else(|| ConfigError::UnsafePath(entry.source.clone()))?,
                };
                Ok(DeployFile {
                    name: entry.source,
                    source,
                    target_id: entry.target_id,
                    relative_path,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            manifest_dir: manifest_dir.to_path_buf(),
            target_dir,
            policy,
            preserve_timestamps: manifest.target.preserve_timestamps,
            locations,
            filter,
            files,
        })
    }
}

fn non_blank(dir: &str) -> Result<&str, ConfigError> {
    if dir.trim().is_empty() {
        Err(ConfigError::EmptyLocation)
    } else {
        Ok(dir)
    }
}

impl DeployContext for DeployConfig {
    fn is_included(&self, file: &DeployFile) -> bool {
        self.filter.matches(&file.name)
    }

    fn resolve_target_id(&self, target_id: &str) -> Option<PathBuf> {
        if target_id.is_empty() {
            return Some(self.target_dir.clone());
        }
        self.locations.get(target_id).cloned()
    }
}
