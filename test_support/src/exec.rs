//! Helpers for creating executable stubs in tests.
//!
//! These utilities write tiny shell scripts and mark them executable so
//! manifests can call stand-ins for `latexmk` or the figure exporter without
//! depending on real binaries. Callers own the containing directory's lifetime
//! to keep the stub on disk.
//!
//! # Examples
//!
//! ```rust
//! use camino::Utf8Path;
//! use tempfile::TempDir;
//! use test_support::write_script;
//!
//! let temp = TempDir::new().expect("tempdir");
//! let root = Utf8Path::from_path(temp.path()).expect("utf8 path");
//! let path = write_script(root, "bin/latexmk", "touch paper.pdf").expect("stub");
//! assert!(path.exists());
//! ```

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Write an executable `sh` script at `root/name` running `body`.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns an error when the script cannot be written or made executable.
pub fn write_script(root: &Utf8Path, name: &str, body: &str) -> Result<Utf8PathBuf> {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .with_context(|| format!("create directory for {name}"))?;
    }
    fs::write(path.as_std_path(), format!("#!/bin/sh\nset -e\n{body}\n"))
        .with_context(|| format!("write script stub {name}"))?;
    make_executable(&path)?;
    Ok(path)
}

/// Mark an existing file as executable on Unix; no-op elsewhere.
///
/// # Errors
///
/// Returns an error when the permissions cannot be read or updated.
pub fn make_executable(path: &Utf8Path) -> Result<()> {
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(path.as_std_path())
            .context("stat script stub")?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path.as_std_path(), perms).context("chmod script stub")?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
