// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed deployment fixture and a fluent
// builder so each integration test can set up sources, pre-existing targets
// and a manifest without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use localdeploy_cli::config::{DeployConfig, Overrides};
use localdeploy_cli::deploy::ProgressSink;

/// Modification time `secs` seconds after the Unix epoch.
pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// Write `contents` to `path`, creating parent directories.
fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, contents).expect("write file");
}

/// Set the modification time of `path`.
pub fn set_mtime(path: &Path, secs: u64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs as i64, 0))
        .expect("set mtime");
}

/// An isolated deployment fixture backed by a [`tempfile::TempDir`].
///
/// Layout: sources under `src/`, the target directory at `out/`, and the
/// manifest at `deploy.toml`.
pub struct DeployFixture {
    /// Temporary directory holding everything.
    pub root: tempfile::TempDir,
}

impl DeployFixture {
    /// Root of the fixture.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Path of the manifest.
    pub fn manifest(&self) -> PathBuf {
        self.path().join("deploy.toml")
    }

    /// Path of the target directory.
    pub fn target_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    /// Path of `rel` under the target directory.
    pub fn target(&self, rel: &str) -> PathBuf {
        self.target_dir().join(rel)
    }

    /// Contents of `rel` under the target directory, if it exists.
    pub fn read_target(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.target(rel)).ok()
    }

    /// Number of regular files anywhere under the target directory.
    pub fn target_file_count(&self) -> usize {
        fn walk(dir: &Path) -> usize {
            std::fs::read_dir(dir).map_or(0, |entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| {
                        let path = e.path();
                        if path.is_dir() { walk(&path) } else { 1 }
                    })
                    .sum()
            })
        }
        walk(&self.target_dir())
    }

    /// Load the manifest with `overrides`.
    pub fn load(&self, overrides: &Overrides) -> DeployConfig {
        DeployConfig::load(&self.manifest(), overrides).expect("load manifest")
    }
}

/// Fluent builder for [`DeployFixture`].
pub struct DeployFixtureBuilder {
    fixture: DeployFixture,
    files: Vec<String>,
    header: String,
}

impl DeployFixtureBuilder {
    /// Begin with an empty fixture whose manifest targets `out/`.
    pub fn new() -> Self {
        Self {
            fixture: DeployFixture {
                root: tempfile::tempdir().expect("create temp dir"),
            },
            files: Vec::new(),
            header: "[target]\ndirectory = \"out\"\n".to_string(),
        }
    }

    /// Replace the manifest text that precedes the `[[files]]` entries.
    pub fn with_header(mut self, header: &str) -> Self {
        self.header = header.to_string();
        self
    }

    /// Create `src/<name>` with `contents` and list it in the manifest,
    /// deployed to the target directory under the same name.
    pub fn with_source(self, name: &str, contents: &str) -> Self {
        self.with_source_at(name, contents, "", name)
    }

    /// Create `src/<name>` and list it with an explicit target-ID and
    /// relative path.
    pub fn with_source_at(mut self, name: &str, contents: &str, target_id: &str, rel: &str) -> Self {
        write_file(&self.fixture.path().join("src").join(name), contents);
        self.files.push(format!(
            "[[files]]\nsource = \"src/{name}\"\ntarget_id = \"{target_id}\"\nrelative_path = \"{rel}\"\n"
        ));
        self
    }

    /// Create `out/<rel>` with `contents` before the deployment runs.
    pub fn with_existing_target(self, rel: &str, contents: &str) -> Self {
        write_file(&self.fixture.target(rel), contents);
        self
    }

    /// Set the modification time of `src/<name>`.
    pub fn source_mtime(self, name: &str, secs: u64) -> Self {
        set_mtime(&self.fixture.path().join("src").join(name), secs);
        self
    }

    /// Set the modification time of `out/<rel>`.
    pub fn target_mtime(self, rel: &str, secs: u64) -> Self {
        set_mtime(&self.fixture.target(rel), secs);
        self
    }

    /// Write the manifest and return the fixture.
    pub fn build(self) -> DeployFixture {
        let mut manifest = self.header;
        for entry in &self.files {
            manifest.push('\n');
            manifest.push_str(entry);
        }
        std::fs::write(self.fixture.manifest(), manifest).expect("write manifest");
        self.fixture
    }
}

/// [`ProgressSink`] that records every call and can request cancellation
/// after a number of files.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    steps: Mutex<Vec<u32>>,
    checks: Mutex<usize>,
    ended: Mutex<bool>,
    cancel_after: Option<usize>,
}

impl RecordingProgress {
    /// Answer `false` to the first `files` cancellation checks and `true` after.
    pub fn cancel_after(files: usize) -> Self {
        Self {
            cancel_after: Some(files),
            ..Self::default()
        }
    }

    /// Sum of all steps.
    pub fn total(&self) -> u32 {
        self.steps.lock().expect("steps poisoned").iter().sum()
    }

    /// Whether `end` was called.
    pub fn ended(&self) -> bool {
        *self.ended.lock().expect("ended poisoned")
    }
}

impl ProgressSink for RecordingProgress {
    fn begin(&self, _total_units: u32) {}

    fn step(&self, units: u32) {
        self.steps.lock().expect("steps poisoned").push(units);
    }

    fn end(&self) {
        *self.ended.lock().expect("ended poisoned") = true;
    }

    fn is_cancelled(&self) -> bool {
        let mut checks = self.checks.lock().expect("checks poisoned");
        *checks += 1;
        self.cancel_after.is_some_and(|n| *checks > n)
    }
}
