//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that the edit planner can be
//! unit-tested without touching the real filesystem. Production code uses
//! [`SystemFileSystemOps`]; tests use `MockFileSystemOps`.

use std::io;
use std::path::Path;
#[cfg(test)]
use std::path::PathBuf;

/// Permission bit granting write access to "other".
pub const OTHER_WRITE: u32 = 0o002;

/// What [`FileSystemOps::inspect`] knows about an existing path.
///
/// Describes the path itself, without following a final symbolic link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    /// The path is a symbolic link.
    pub is_symlink: bool,
    /// The path is a directory.
    pub is_dir: bool,
    /// Unix permission bits; `None` where the platform has none.
    pub mode: Option<u32>,
}

impl PathInfo {
    /// A plain directory with the given mode.
    #[must_use]
    pub const fn dir(mode: u32) -> Self {
        Self {
            is_symlink: false,
            is_dir: true,
            mode: Some(mode),
        }
    }

    /// A regular file with the given mode.
    #[must_use]
    pub const fn file(mode: u32) -> Self {
        Self {
            is_symlink: false,
            is_dir: false,
            mode: Some(mode),
        }
    }

    /// A symbolic link.
    #[must_use]
    pub const fn symlink() -> Self {
        Self {
            is_symlink: true,
            is_dir: false,
            mode: None,
        }
    }

    /// `true` when "other" may write to the path.
    #[must_use]
    pub const fn is_world_writable(&self) -> bool {
        matches!(self.mode, Some(mode) if mode & OTHER_WRITE != 0)
    }
}

/// Abstraction over the filesystem calls made while planning and writing a
/// drop-in.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Describe `path` without following a final symlink; `Ok(None)` if it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than "not found".
    fn inspect(&self, path: &Path) -> io::Result<Option<PathInfo>>;

    /// Create `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write `contents` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn inspect(&self, path: &Path) -> io::Result<Option<PathInfo>> {
        let meta = match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(PathInfo {
            is_symlink: meta.file_type().is_symlink(),
            is_dir: meta.is_dir(),
            mode: mode_of(&meta),
        }))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }
}

#[cfg(unix)]
fn mode_of(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt as _;
    Some(meta.permissions().mode())
}

#[cfg(not(unix))]
const fn mode_of(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}

/// Mock [`FileSystemOps`] for unit tests.
///
/// Pre-configure paths with the builder-style methods; every
/// `create_dir_all` and `write` call is recorded instead of performed.
///
/// # Example
///
/// ```ignore
/// use netrepair_cli::operations::{MockFileSystemOps, PathInfo};
///
/// let fs = MockFileSystemOps::new()
///     .with_path("/etc/systemd/resolved.conf.d", PathInfo::dir(0o755));
/// ```
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    paths: std::collections::HashMap<PathBuf, PathInfo>,
    created: std::sync::Mutex<Vec<PathBuf>>,
    written: std::sync::Mutex<Vec<(PathBuf, String)>>,
    fail_writes: bool,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl MockFileSystemOps {
    /// Create an empty mock where nothing exists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` with the given description.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>, info: PathInfo) -> Self {
        self.paths.insert(path.into(), info);
        self
    }

    /// Make every `write` call fail with `PermissionDenied`.
    #[must_use]
    pub const fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Directories passed to `create_dir_all`, in call order.
    #[must_use]
    pub fn created(&self) -> Vec<PathBuf> {
        self.created.lock().expect("mock poisoned").clone()
    }

    /// Files passed to `write`, in call order.
    #[must_use]
    pub fn written(&self) -> Vec<(PathBuf, String)> {
        self.written.lock().expect("mock poisoned").clone()
    }

    /// Total number of mutating calls.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.created().len() + self.written().len()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl FileSystemOps for MockFileSystemOps {
    fn inspect(&self, path: &Path) -> io::Result<Option<PathInfo>> {
        Ok(self.paths.get(path).copied())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.created
            .lock()
            .expect("mock poisoned")
            .push(path.to_path_buf());
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.written
            .lock()
            .expect("mock poisoned")
            .push((path.to_path_buf(), contents.to_string()));
        Ok(())
    }
}
