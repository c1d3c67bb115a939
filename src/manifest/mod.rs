//! Manifest loading helpers.
//!
//! This module parses a `Paperfile` without a global template preprocessing
//! pass. The YAML is parsed first and Jinja expressions are evaluated only
//! within string values or the `foreach` and `when` keys. Templates can call
//! `env()` to read environment variables and `glob()` to expand filesystem
//! patterns relative to the manifest's directory. Both helpers fail fast when
//! inputs are missing or patterns are invalid.
//!
//! Every variable is resolved here, once, before any command runs.

use crate::ast::PaperManifest;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use std::{fs, path::Path};

mod diagnostics;
mod expand;
mod glob;
mod hints;
mod render;

/// JSON representation of a manifest node after YAML parsing.
pub type ManifestValue = serde_json::Value;
/// JSON object mapping string keys to manifest values.
pub type ManifestMap = serde_json::Map<String, ManifestValue>;

pub use diagnostics::ManifestError;
pub use expand::expand_foreach;
pub use glob::glob_paths;
pub use render::render_manifest;

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "Paperfile";

/// A loaded manifest together with the directory its relative paths refer to.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    /// The rendered manifest.
    pub manifest: PaperManifest,
    /// Directory containing the manifest; commands run here.
    pub workspace_root: Utf8PathBuf,
}

fn env_var(name: &str) -> std::result::Result<String, Error> {
    match std::env::var(name) {
        Ok(val) => Ok(val),
        Err(std::env::VarError::NotPresent) => Err(Error::new(
            ErrorKind::UndefinedError,
            format!("environment variable '{name}' is not set"),
        )),
        Err(std::env::VarError::NotUnicode(_)) => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("environment variable '{name}' is set but contains invalid UTF-8"),
        )),
    }
}

fn environment(workspace_root: &Utf8Path) -> Environment<'static> {
    let mut jinja = Environment::new();
    jinja.set_undefined_behavior(UndefinedBehavior::Strict);
    let root = workspace_root.to_path_buf();
    jinja.add_function("env", |var_name: String| env_var(&var_name));
    jinja.add_function("glob", move |pattern: String| glob_paths(&root, &pattern));
    jinja
}

fn from_str_named(yaml: &str, name: &str, workspace_root: &Utf8Path) -> Result<PaperManifest> {
    let mut doc: ManifestValue =
        serde_saphyr::from_str(yaml).map_err(|e| ManifestError::yaml(e, yaml, name))?;

    let mut jinja = environment(workspace_root);

    if let Some(vars_value) = doc.get("vars") {
        let vars = vars_value
            .as_object()
            .cloned()
            .ok_or_else(|| ManifestError::VarsNotMapping {
                manifest: name.to_owned(),
            })?;
        for (key, value) in vars {
            let rendered = render::render_value(&jinja, &value)
                .with_context(|| format!("render var '{key}'"))?;
            jinja.add_global(key, rendered);
        }
    }

    expand_foreach(&mut doc, &jinja)?;

    let manifest: PaperManifest =
        serde_json::from_value(doc).map_err(|e| ManifestError::structure(e, name))?;

    render_manifest(manifest, &jinja)
}

/// Parse a manifest string, resolving relative globs against `workspace_root`.
///
/// # Errors
///
/// Returns an error if YAML parsing or template evaluation fails.
///
/// ```rust
/// use camino::Utf8Path;
/// use papermake::manifest;
///
/// let yaml = "paper_version: \"1.0.0\"\nvars:\n  main: paper\ntargets:\n  - name: \"{{ main }}.pdf\"\n    command: latexmk -pdf\n";
/// let manifest = manifest::from_str_in(yaml, Utf8Path::new(".")).expect("parse");
/// assert_eq!(manifest.targets[0].name.items(), vec!["paper.pdf"]);
/// ```
pub fn from_str_in(yaml: &str, workspace_root: &Utf8Path) -> Result<PaperManifest> {
    from_str_named(yaml, DEFAULT_MANIFEST, workspace_root)
}

/// Parse a manifest string relative to the current directory.
///
/// # Errors
///
/// Returns an error if YAML parsing or template evaluation fails.
pub fn from_str(yaml: &str) -> Result<PaperManifest> {
    from_str_in(yaml, Utf8Path::new("."))
}

/// Load a manifest from `path`.
///
/// The manifest's parent directory becomes the workspace root: `glob()`
/// patterns resolve against it and the evaluator runs commands inside it.
///
/// # Errors
///
/// Returns an error if the file cannot be read, its path is not UTF-8, or the
/// YAML fails to parse or render.
pub fn from_path(path: impl AsRef<Path>) -> Result<LoadedManifest> {
    let path_ref = path.as_ref();
    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("failed to read {}", path_ref.display()))?;
    let workspace_root = workspace_root_for(path_ref)?;
    let name = path_ref.display().to_string();
    let manifest = from_str_named(&data, &name, &workspace_root)?;
    Ok(LoadedManifest {
        manifest,
        workspace_root,
    })
}

fn workspace_root_for(path: &Path) -> Result<Utf8PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).map_err(|invalid| {
        anyhow::anyhow!(
            "manifest directory {} is not valid UTF-8",
            invalid.display()
        )
    })
}

#[cfg(test)]
mod tests;
