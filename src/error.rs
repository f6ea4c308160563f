//! Domain-specific error types for the deployment engine.
//!
//! Internal modules return typed errors built with [`thiserror`]; command
//! handlers at the CLI boundary convert them to [`anyhow::Error`] via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! DeployError
//! ├── Config(ConfigError)   manifest, target directory, target-ID resolution
//! ├── Cancelled             abort decision or user cancellation during scan
//! └── Io { path, source }   stat/copy/create failures, processing stops
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for a deployment run.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The deployment is misconfigured; raised before any file is copied.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run was cancelled before the execute pass started.
    #[error("Deployment cancelled: {reason}")]
    Cancelled {
        /// Why the run stopped (e.g. the conflicting file that got `Abort`).
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("{action} {}: {source}", .path.display())]
    Io {
        /// Short description of the failed operation (`"copy"`, `"stat"`, ...).
        action: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl DeployError {
    /// Wrap an [`std::io::Error`] with the operation and path it belongs to.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error represents a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Errors that arise from loading or validating the deploy configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No target directory was configured.
    #[error("no target directory configured (set [target] directory or pass --target)")]
    UnconfiguredTarget,

    /// The target directory was configured as an empty string.
    #[error("target directory is empty")]
    EmptyLocation,

    /// A deploy file references a target-ID that has no location.
    #[error("cannot resolve target id '{0}'")]
    UnresolvedTargetId(String),

    /// A relative path would land outside its target directory.
    #[error("unsafe relative path '{0}': must stay inside the target directory")]
    UnsafePath(String),

    /// An include/exclude glob could not be compiled.
    #[error("invalid filter pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Message reported by the glob compiler.
        message: String,
    },

    /// The replace policy name is not one of the known policies.
    #[error("unknown replace policy '{0}': expected skip, replace, replace-older, prompt or abort")]
    UnknownPolicy(String),
}
