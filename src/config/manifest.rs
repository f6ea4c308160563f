//! Deploy manifest schema (`deploy.toml`).
use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level manifest document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// `[target]` section.
    pub target: TargetSection,
    /// `[locations]` section: target-ID to directory.
    pub locations: BTreeMap<String, String>,
    /// `[filter]` section.
    pub filter: FilterSection,
    /// `[[files]]` entries, in deployment order.
    pub files: Vec<ManifestFile>,
}

/// Where and how files are deployed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    /// Target directory; `None` when the key is absent.
    pub directory: Option<String>,
    /// Replace policy name (`skip`, `replace`, `replace-older`, `prompt`, `abort`).
    pub replace: Option<String>,
    /// Copy the source modification time onto each copied target.
    pub preserve_timestamps: bool,
}

/// Glob patterns applied to each file's `source` string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSection {
    /// Files must match one of these (all files pass when empty).
    pub include: Vec<String>,
    /// Files matching any of these are left out.
    pub exclude: Vec<String>,
}

/// One `[[files]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    /// Source path, relative to the manifest directory or absolute.
    pub source: String,
    /// Location ID; empty means the target directory itself.
    #[serde(default)]
    pub target_id: String,
    /// Path below the resolved location; defaults to the source file name.
    #[serde(default)]
    pub relative_path: Option<String>,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::toml_loader::parse_config;

    #[test]
    fn parses_full_manifest() {
        let manifest: Manifest = parse_config(
            r#"
[target]
directory = "/srv/app"
replace = "replace-older"
preserve_timestamps = true

[locations]
web = "public"

[filter]
include = ["**"]
exclude = ["**/*.tmp"]

[[files]]
source = "build/index.html"
target_id = "web"
relative_path = "index.html"

[[files]]
source = "README"
"#,
        )
        .unwrap();

        assert_eq!(manifest.target.directory.as_deref(), Some("/srv/app"));
        assert_eq!(manifest.target.replace.as_deref(), Some("replace-older"));
        assert!(manifest.target.preserve_timestamps);
        assert_eq!(manifest.locations["web"], "public");
        assert_eq!(manifest.filter.exclude, vec!["**/*.tmp"]);
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].target_id, "web");
        assert_eq!(manifest.files[1].target_id, "");
        assert!(manifest.files[1].relative_path.is_none());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let manifest: Manifest = parse_config("").unwrap();
        assert!(manifest.target.directory.is_none());
        assert!(!manifest.target.preserve_timestamps);
        assert!(manifest.files.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config::<Manifest>("[target]\ndirectroy = \"x\"\n").is_err());
    }

    #[test]
    fn file_without_source_is_rejected() {
        assert!(parse_config::<Manifest>("[[files]]\ntarget_id = \"web\"\n").is_err());
    }
}
