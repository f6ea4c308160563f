//! Input descriptors and the caller-supplied deployment context.
use std::path::PathBuf;

/// One file to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployFile {
    /// Display name, used in logs and the summary.
    pub name: String,
    /// Absolute (or working-directory relative) source path.
    pub source: PathBuf,
    /// Location ID resolved through [`DeployContext::resolve_target_id`].
    pub target_id: String,
    /// Path below the resolved location.
    pub relative_path: PathBuf,
}

impl DeployFile {
    /// Create a descriptor whose display name is the source path.
    #[must_use]
    pub fn new(
        source: impl Into<PathBuf>,
        target_id: impl Into<String>,
        relative_path: impl Into<PathBuf>,
    ) -> Self {
        let source = source.into();
        Self {
            name: source.display().to_string(),
            source,
            target_id: target_id.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// Path resolution and filtering supplied by the caller of a deployment.
pub trait DeployContext {
    /// Whether `file` takes part in this deployment.
    fn is_included(&self, file: &DeployFile) -> bool;

    /// Directory for `target_id`, or `None` if the ID is unknown.
    fn resolve_target_id(&self, target_id: &str) -> Option<PathBuf>;
}
