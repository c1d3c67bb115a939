//! Temporary paper repositories with controllable modification times.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Seconds since the epoch used as the base for fixture mtimes.
pub const BASE_EPOCH: u64 = 1_700_000_000;

/// A temporary repository root that is removed on drop.
#[derive(Debug)]
pub struct PaperWorkspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl PaperWorkspace {
    /// Create an empty workspace.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary directory cannot be created or its
    /// path is not UTF-8.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("create temp dir")?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|path| anyhow::anyhow!("temp dir {} is not UTF-8", path.display()))?;
        Ok(Self { _dir: dir, root })
    }

    /// Create a workspace whose `Paperfile` holds `body` after the version
    /// header.
    ///
    /// # Errors
    ///
    /// See [`PaperWorkspace::new`] and [`PaperWorkspace::write`].
    pub fn with_manifest(body: &str) -> Result<Self> {
        let ws = Self::new()?;
        ws.write("Paperfile", &crate::manifest_yaml(body))?;
        Ok(ws)
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `name` inside the workspace.
    #[must_use]
    pub fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Write `contents` to `name`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when the file or its parents cannot be written.
    pub fn write(&self, name: &str, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create parent of {name}"))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {name}"))?;
        Ok(path)
    }

    /// Create `name` if needed and set its mtime to `BASE_EPOCH + offset`
    /// seconds.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or its time set.
    pub fn touch_at(&self, name: &str, offset: u64) -> Result<()> {
        let path = self.path(name);
        if !path.exists() {
            self.write(name, "")?;
        }
        set_mtime(&path, offset)
    }

    /// Modification time of `name`, or `None` when it does not exist.
    #[must_use]
    pub fn mtime(&self, name: &str) -> Option<SystemTime> {
        fs::metadata(self.path(name)).and_then(|m| m.modified()).ok()
    }

    /// Whether `name` exists in the workspace.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

/// Set the mtime of an existing file to `BASE_EPOCH + offset` seconds.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or its time set.
pub fn set_mtime(path: &Utf8Path, offset: u64) -> Result<()> {
    let file = File::options()
        .append(true)
        .open(path)
        .with_context(|| format!("open {path}"))?;
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(BASE_EPOCH + offset))
        .with_context(|| format!("set mtime of {path}"))
}
