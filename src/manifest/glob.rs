//! Filesystem globbing for the `glob()` template helper.
//!
//! Relative patterns are matched beneath the workspace root and returned
//! relative to it, so the results can be used directly as prerequisites.
use camino::{Utf8Path, Utf8PathBuf};
use minijinja::{Error, ErrorKind};

fn glob_error(pattern: &str, kind: ErrorKind, detail: impl std::fmt::Display) -> Error {
    Error::new(kind, format!("glob failed for '{pattern}': {detail}"))
}

/// Expand `pattern` into the sorted list of matching regular files.
///
/// Directories are skipped and separators are normalised to `/`.
///
/// # Errors
///
/// Returns a template error for malformed patterns, unreadable entries, or
/// matches that are not valid UTF-8.
pub fn glob_paths(root: &Utf8Path, pattern: &str) -> Result<Vec<String>, Error> {
    let full_pattern = if Utf8Path::new(pattern).is_absolute() {
        pattern.to_owned()
    } else {
        let escaped_root = glob::Pattern::escape(root.as_str());
        format!("{escaped_root}/{pattern}")
    };
    let entries = glob::glob(&full_pattern).map_err(|err| {
        Error::new(
            ErrorKind::SyntaxError,
            format!("invalid glob pattern '{pattern}': {}", err.msg),
        )
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| glob_error(pattern, ErrorKind::InvalidOperation, err))?;
        if !path.is_file() {
            continue;
        }
        let utf8 = Utf8PathBuf::try_from(path).map_err(|_| {
            glob_error(
                pattern,
                ErrorKind::InvalidOperation,
                "glob matched a non-UTF-8 path",
            )
        })?;
        let relative = utf8.strip_prefix(root).map_or(utf8.as_path(), |rel| rel);
        matches.push(relative.as_str().replace('\\', "/"));
    }
    matches.sort();
    Ok(matches)
}
