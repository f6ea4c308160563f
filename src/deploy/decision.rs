//! Conflict decisions and the replace-policy seam.
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;

use crate::error::ConfigError;

/// What to do with a file whose target already exists.
///
/// # Examples
///
/// ```
/// use localdeploy_cli::deploy::ReplaceDecision;
///
/// let d: ReplaceDecision = "replace-older".parse().unwrap();
/// assert_eq!(d, ReplaceDecision::ReplaceOlder);
/// assert_eq!(d.to_string(), "replace-older");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceDecision {
    /// No conflict was found, or the policy had no opinion; the file is copied.
    #[default]
    NotSet,
    /// Keep the existing target.
    Skip,
    /// Overwrite the target unconditionally.
    Replace,
    /// Overwrite only if the source is strictly newer than the target.
    ReplaceOlder,
    /// Stop the whole deployment before anything is copied.
    Abort,
}

impl ReplaceDecision {
    /// Every decision, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::NotSet,
        Self::Skip,
        Self::Replace,
        Self::ReplaceOlder,
        Self::Abort,
    ];

    /// Stable lower-case name, also accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSet => "not-set",
            Self::Skip => "skip",
            Self::Replace => "replace",
            Self::ReplaceOlder => "replace-older",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for ReplaceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplaceDecision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPolicy(s.to_string()))
    }
}

/// Decides how to resolve a conflict with an existing target file.
///
/// Called once per conflicting file during the scan pass.
#[cfg_attr(test, mockall::automock)]
pub trait ReplacePolicy {
    /// Decide what to do with `source` given that `target` already exists.
    fn decide(
        &self,
        source: &Path,
        source_modified: SystemTime,
        target: &Path,
        target_modified: SystemTime,
    ) -> ReplaceDecision;
}

/// A policy that answers every conflict with the same decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy(pub ReplaceDecision);

impl ReplacePolicy for FixedPolicy {
    fn decide(&self, _: &Path, _: SystemTime, _: &Path, _: SystemTime) -> ReplaceDecision {
        self.0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_names() {
        for d in ReplaceDecision::ALL {
            assert_eq!(d.as_str().parse::<ReplaceDecision>().unwrap(), d);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(
            " Replace-Older ".parse::<ReplaceDecision>().unwrap(),
            ReplaceDecision::ReplaceOlder
        );
    }

    #[test]
    fn parse_unknown_is_config_error() {
        let err = "overwrite".parse::<ReplaceDecision>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPolicy(ref s) if s == "overwrite"));
    }

    #[test]
    fn default_is_not_set() {
        assert_eq!(ReplaceDecision::default(), ReplaceDecision::NotSet);
    }

    #[test]
    fn fixed_policy_ignores_times() {
        let policy = FixedPolicy(ReplaceDecision::Skip);
        let now = SystemTime::now();
        assert_eq!(
            policy.decide(Path::new("a"), now, Path::new("b"), SystemTime::UNIX_EPOCH),
            ReplaceDecision::Skip
        );
    }
}
