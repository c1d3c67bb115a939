//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point. It
//! loads the manifest, builds the graph and then either prints it or hands
//! the requested targets to the [`Evaluator`].

mod error;
mod process;

pub use error::RunnerError;
#[cfg(test)]
pub use process::MockCommandRunner;
pub use process::{CommandRunner, CommandStatus, SHELL_PROGRAM, ShellRunner};

use crate::cli::Cli;
use crate::evaluator::{EvalError, EvalOptions, Evaluator};
use crate::graph::{BuildGraph, GraphError};
use crate::manifest::{self, LoadedManifest, ManifestError};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use std::io::{self, Write};
use tracing::{debug, info};

/// Determine the manifest path respecting the CLI's directory option.
///
/// # Errors
///
/// Returns [`RunnerError::NonUtf8Path`] when the file or directory is not
/// valid UTF-8.
pub fn resolve_manifest_path(cli: &Cli) -> Result<Utf8PathBuf, RunnerError> {
    let file = utf8(&cli.file)?;
    match &cli.directory {
        Some(dir) => Ok(utf8(dir)?.join(file)),
        None => Ok(file),
    }
}

fn utf8(path: &std::path::Path) -> Result<Utf8PathBuf, RunnerError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|path| RunnerError::NonUtf8Path { path })
}

fn ensure_manifest_exists(cli: &Cli, manifest_path: &Utf8Path) -> Result<(), RunnerError> {
    if manifest_path.exists() {
        return Ok(());
    }
    let manifest_name = manifest_path
        .file_name()
        .unwrap_or(manifest_path.as_str())
        .to_owned();
    let directory = match (&cli.directory, manifest_path.parent()) {
        (Some(_), Some(parent)) if !parent.as_str().is_empty() => format!("directory '{parent}'"),
        _ => "the current directory".to_owned(),
    };
    Err(RunnerError::ManifestNotFound {
        manifest_name,
        directory,
        path: manifest_path.to_path_buf().into_std_path_buf(),
    })
}

/// Load the manifest and graph referenced by `cli`.
///
/// # Errors
///
/// Returns an error if the manifest is missing or fails to load, or the graph
/// is invalid.
pub fn load_graph(cli: &Cli) -> Result<(BuildGraph, Utf8PathBuf)> {
    let manifest_path = resolve_manifest_path(cli)?;
    ensure_manifest_exists(cli, &manifest_path)?;
    let LoadedManifest {
        manifest,
        workspace_root,
    } = manifest::from_path(manifest_path.as_std_path())
        .with_context(|| format!("loading manifest {manifest_path}"))?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        let ast_json =
            serde_json::to_string_pretty(&manifest).context("serialising manifest")?;
        debug!("AST:\n{ast_json}");
    }
    let graph = BuildGraph::from_manifest(&manifest).context("building dependency graph")?;
    Ok((graph, workspace_root))
}

/// Execute the parsed [`Cli`], writing listings and echoed commands to
/// stdout.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded, the graph is invalid,
/// or a target cannot be brought up to date.
pub fn run(cli: &Cli) -> Result<()> {
    // Child output is forwarded to stdout from helper threads, so the handle
    // must not be locked for the whole run.
    run_with(cli, ShellRunner::new(), io::stdout())
}

/// Execute `cli` with an explicit runner and output sink.
///
/// # Errors
///
/// See [`run`].
pub fn run_with<R, W>(cli: &Cli, runner: R, mut out: W) -> Result<()>
where
    R: CommandRunner,
    W: Write,
{
    let (graph, root) = load_graph(cli)?;

    if cli.graph {
        out.write_all(graph.to_dot().as_bytes())
            .context("writing graph")?;
        return Ok(());
    }
    if cli.list {
        write_listing(&graph, &mut out).context("writing target list")?;
        return Ok(());
    }

    let targets: Vec<Utf8PathBuf> = cli.targets.iter().map(Utf8PathBuf::from).collect();
    let options = EvalOptions {
        dry_run: cli.dry_run,
        keep_going: cli.keep_going,
    };
    let report = Evaluator::new(&graph, root, runner, &mut out)
        .with_options(options)
        .build(&targets)?;
    if report.is_empty() {
        let shown = if targets.is_empty() {
            graph.implicit_targets()
        } else {
            targets
        };
        for target in shown {
            info!(output = %target, "nothing to be done");
            writeln!(out, "papermake: Nothing to be done for '{target}'.")
                .context("writing status")?;
        }
    }
    Ok(())
}

fn find_diagnostic(err: &anyhow::Error) -> Option<&dyn Diagnostic> {
    if let Some(diag) = err.downcast_ref::<ManifestError>() {
        return Some(diag as &dyn Diagnostic);
    }
    if let Some(diag) = err.downcast_ref::<GraphError>() {
        return Some(diag as &dyn Diagnostic);
    }
    if let Some(diag) = err.downcast_ref::<EvalError>() {
        return Some(diag as &dyn Diagnostic);
    }
    err.downcast_ref::<RunnerError>()
        .map(|diag| diag as &dyn Diagnostic)
}

/// Render `err` for the terminal.
///
/// Errors carrying a [`Diagnostic`] are drawn by `miette`, so source
/// snippets and help text reach the user; any outer context is printed
/// first. Other errors print their context chain on one line.
#[must_use]
pub fn render_error(err: &anyhow::Error) -> String {
    let Some(diag) = find_diagnostic(err) else {
        return format!("{err:#}");
    };
    let mut rendered = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    if handler.render_report(&mut rendered, diag).is_err() {
        return format!("{err:#}");
    }
    let outer = err.to_string();
    if outer == diag.to_string() {
        rendered
    } else {
        format!("{outer}:\n{rendered}")
    }
}

fn write_listing<W: Write>(graph: &BuildGraph, out: &mut W) -> io::Result<()> {
    for (target, id) in &graph.targets {
        let edge = graph.edges.get(*id);
        let phony = edge.is_some_and(|edge| edge.phony);
        let description = edge.and_then(|edge| edge.action.description.as_deref());
        match (phony, description) {
            (true, Some(text)) => writeln!(out, "{target} (phony): {text}")?,
            (true, None) => writeln!(out, "{target} (phony)")?,
            (false, Some(text)) => writeln!(out, "{target}: {text}")?,
            (false, None) => writeln!(out, "{target}")?,
        }
    }
    Ok(())
}
