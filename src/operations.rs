//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that the deployer can be
//! unit-tested without touching the real filesystem.  Production code uses
//! [`SystemFileSystemOps`]; tests use `MockFileSystemOps`.

use std::fs;
use std::io::{self, Read as _, Write as _};
use std::path::Path;
use std::time::SystemTime;

/// Size of the read buffer used by [`SystemFileSystemOps::copy_file`].
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// The metadata the deployer needs about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Length in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Whether the path is a directory.
    pub is_dir: bool,
}

/// Abstraction over the filesystem calls made by the scan and execute passes.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Return metadata for `path`, or `None` if nothing exists there.
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but its metadata cannot be read.
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>>;

    /// Create `path` and all missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Whether `first` and `second` name the same existing file, through
    /// symlinks, `.` segments or hard links.  `false` when either is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a path exists but cannot be resolved.
    fn same_file(&self, first: &Path, second: &Path) -> io::Result<bool>;

    /// Copy `source` over `target`, calling `on_progress` with the cumulative
    /// number of bytes written after every chunk.  Returns the bytes copied.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened, a read/write fails,
    /// or `source` and `target` are the same file.
    fn copy_file(
        &self,
        source: &Path,
        target: &Path,
        on_progress: &mut dyn FnMut(u64),
    ) -> io::Result<u64>;

    /// Set the modification time of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp cannot be written.
    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(FileStat {
                size: meta.len(),
                modified: meta.modified()?,
                is_dir: meta.is_dir(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn same_file(&self, first: &Path, second: &Path) -> io::Result<bool> {
        let (Some(first), Some(second)) = (canonical(first)?, canonical(second)?) else {
            return Ok(false);
        };
        if first == second {
            return Ok(true);
        }
        Ok(same_inode(&fs::metadata(&first)?, &fs::metadata(&second)?))
    }

    fn copy_file(
        &self,
        source: &Path,
        target: &Path,
        on_progress: &mut dyn FnMut(u64),
    ) -> io::Result<u64> {
        // Creating the target truncates it, so a self-copy would empty the source.
        if self.same_file(source, target)? {
            return Err(same_file_error());
        }
        let mut reader = fs::File::open(source)?;
        let mut writer = fs::File::create(target)?;
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(buf.get(..n).unwrap_or_default())?;
            copied += n as u64;
            on_progress(copied);
        }
        writer.flush()?;
        Ok(copied)
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(modified))
    }
}

/// The error reported when a copy would read and write the same file.
#[must_use]
pub fn same_file_error() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        "source and target are the same file",
    )
}

/// Resolve `path` through symlinks, `None` if it does not exist.
fn canonical(path: &Path) -> io::Result<Option<std::path::PathBuf>> {
    match fs::canonicalize(path) {
        Ok(resolved) => Ok(Some(resolved)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn same_inode(first: &fs::Metadata, second: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt as _;
    first.dev() == second.dev() && first.ino() == second.ino()
}

// Hard links are not detected here; canonical paths still catch symlinks.
#[cfg(not(unix))]
const fn same_inode(_first: &fs::Metadata, _second: &fs::Metadata) -> bool {
    false
}

/// In-memory [`FileSystemOps`] for unit tests.
///
/// Files are registered with [`with_file`](Self::with_file); copies move the
/// registered contents and are recorded in order so tests can assert on them.
/// [`fail_copy_of`](Self::fail_copy_of) makes copying a given source fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    files: std::sync::Mutex<std::collections::HashMap<std::path::PathBuf, (u64, SystemTime)>>,
    dirs: std::sync::Mutex<Vec<std::path::PathBuf>>,
    copies: std::sync::Mutex<Vec<(std::path::PathBuf, std::path::PathBuf)>>,
    failing: Vec<std::path::PathBuf>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl MockFileSystemOps {
    /// Create an empty mock filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file of `size` bytes last modified at `modified`.
    #[must_use]
    pub fn with_file(self, path: impl Into<std::path::PathBuf>, size: u64, modified: SystemTime) -> Self {
        self.files
            .lock()
            .expect("mock files poisoned")
            .insert(path.into(), (size, modified));
        self
    }

    /// Make every copy whose source is `path` fail with `PermissionDenied`.
    #[must_use]
    pub fn fail_copy_of(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.failing.push(path.into());
        self
    }

    /// `(source, target)` pairs copied so far, in order.
    #[must_use]
    pub fn copies(&self) -> Vec<(std::path::PathBuf, std::path::PathBuf)> {
        self.copies.lock().expect("mock copies poisoned").clone()
    }

    /// Directories created so far, in order.
    #[must_use]
    pub fn created_dirs(&self) -> Vec<std::path::PathBuf> {
        self.dirs.lock().expect("mock dirs poisoned").clone()
    }

    /// Modification time currently recorded for `path`.
    #[must_use]
    pub fn modified(&self, path: &Path) -> Option<SystemTime> {
        self.files
            .lock()
            .expect("mock files poisoned")
            .get(path)
            .map(|(_, m)| *m)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl FileSystemOps for MockFileSystemOps {
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        Ok(self
            .files
            .lock()
            .expect("mock files poisoned")
            .get(path)
            .map(|&(size, modified)| FileStat {
                size,
                modified,
                is_dir: false,
            }))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.dirs
            .lock()
            .expect("mock dirs poisoned")
            .push(path.to_path_buf());
        Ok(())
    }

    fn same_file(&self, first: &Path, second: &Path) -> io::Result<bool> {
        Ok(first == second && self.stat(first)?.is_some())
    }

    fn copy_file(
        &self,
        source: &Path,
        target: &Path,
        on_progress: &mut dyn FnMut(u64),
    ) -> io::Result<u64> {
        if source == target {
            return Err(same_file_error());
        }
        if self.failing.iter().any(|p| p == source) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        let mut files = self.files.lock().expect("mock files poisoned");
        let size = files
            .get(source)
            .map(|(size, _)| *size)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        // Report in two halves so callers see more than one callback.
        on_progress(size / 2);
        on_progress(size);
        files.insert(target.to_path_buf(), (size, SystemTime::now()));
        drop(files);
        self.copies
            .lock()
            .expect("mock copies poisoned")
            .push((source.to_path_buf(), target.to_path_buf()));
        Ok(size)
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        let mut files = self.files.lock().expect("mock files poisoned");
        let entry = files
            .get_mut(path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        entry.1 = modified;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stat_missing_path_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let stat = SystemFileSystemOps.stat(&dir.path().join("absent")).unwrap();
        assert!(stat.is_none());
    }

    #[test]
    fn stat_reports_size_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();
        let stat = SystemFileSystemOps.stat(&file).unwrap().unwrap();
        assert_eq!(stat.size, 5);
        assert!(!stat.is_dir);
        let dir_stat = SystemFileSystemOps.stat(dir.path()).unwrap().unwrap();
        assert!(dir_stat.is_dir);
    }

    #[test]
    fn copy_file_reports_cumulative_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        let data = vec![7u8; COPY_BUFFER_SIZE * 2 + 10];
        fs::write(&src, &data).unwrap();

        let mut seen = Vec::new();
        let copied = SystemFileSystemOps
            .copy_file(&src, &dst, &mut |n| seen.push(n))
            .unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(fs::read(&dst).unwrap(), data);
        assert_eq!(seen.last().copied(), Some(data.len() as u64));
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "not monotonic: {seen:?}");
    }

    #[test]
    fn copy_file_overwrites_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old and longer").unwrap();
        SystemFileSystemOps.copy_file(&src, &dst, &mut |_| {}).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"new");
    }

    #[test]
    fn copy_onto_itself_fails_and_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"keep me").unwrap();
        let via_dot = dir.path().join(".").join("a.txt");

        let err = SystemFileSystemOps
            .copy_file(&file, &via_dot, &mut |_| {})
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(fs::read(&file).unwrap(), b"keep me");
    }

    #[test]
    fn same_file_sees_through_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        let other = dir.path().join("b.txt");
        fs::write(&file, b"a").unwrap();
        fs::write(&other, b"a").unwrap();
        let ops = SystemFileSystemOps;

        assert!(ops.same_file(&file, &dir.path().join(".").join("a.txt")).unwrap());
        assert!(!ops.same_file(&file, &other).unwrap());
        assert!(!ops.same_file(&file, &dir.path().join("missing")).unwrap());

        #[cfg(unix)]
        {
            let link = dir.path().join("link.txt");
            std::os::unix::fs::symlink(&file, &link).unwrap();
            assert!(ops.same_file(&file, &link).unwrap());

            let hard = dir.path().join("hard.txt");
            fs::hard_link(&file, &hard).unwrap();
            assert!(ops.same_file(&file, &hard).unwrap());
        }
    }

    #[test]
    fn copy_empty_file_never_calls_back() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("empty");
        fs::write(&src, b"").unwrap();
        let mut calls = 0;
        let copied = SystemFileSystemOps
            .copy_file(&src, &dir.path().join("out"), &mut |_| calls += 1)
            .unwrap();
        assert_eq!(copied, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn set_modified_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        SystemFileSystemOps.set_modified(&file, when).unwrap();
        let stat = SystemFileSystemOps.stat(&file).unwrap().unwrap();
        assert_eq!(stat.modified, when);
    }

    #[test]
    fn mock_copy_records_and_fails_on_request() {
        let t = SystemTime::UNIX_EPOCH;
        let fs = MockFileSystemOps::new()
            .with_file("/src/a", 10, t)
            .with_file("/src/b", 4, t)
            .fail_copy_of("/src/b");
        fs.copy_file(Path::new("/src/a"), Path::new("/dst/a"), &mut |_| {})
            .unwrap();
        assert!(
            fs.copy_file(Path::new("/src/b"), Path::new("/dst/b"), &mut |_| {})
                .is_err()
        );
        assert_eq!(fs.copies().len(), 1);
        assert!(fs.stat(Path::new("/dst/a")).unwrap().is_some());
    }
}
