//! The dependency graph evaluator.
//!
//! Given requested targets and a [`BuildGraph`], the evaluator brings each
//! target up to date the way `make` does:
//!
//! - prerequisites are processed first, depth-first and left to right;
//! - a prerequisite without a rule is a leaf and must exist on disk;
//! - a non-phony target is stale when an output is missing, when a
//!   prerequisite is newer than its oldest output, or when a rule-backed
//!   prerequisite was rebuilt (or is phony) in this pass;
//! - phony targets are always stale;
//! - a stale target's command runs once, from the workspace root.
//!
//! Evaluation is sequential. A failing command fails its target and every
//! dependent; the pass stops unless `keep_going` is set, in which case
//! unrelated targets are still attempted. Outputs touched by a failed command
//! are deleted so no partial artefact survives.

mod staleness;

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ast::Recipe;
use crate::graph::{BuildEdge, BuildGraph, EdgeId};
use crate::runner::{CommandRunner, CommandStatus};

use staleness::{InputSummary, OutputTimes, Staleness, modified_time};

/// Switches that alter how a pass behaves.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Print commands without running them.
    pub dry_run: bool,
    /// Continue with unrelated targets after a failure.
    pub keep_going: bool,
}

/// Per-edge progress within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    /// Prerequisites are being brought up to date.
    PrereqsPending,
    /// Nothing needed doing.
    UpToDate,
    /// The command ran (or was echoed in a dry run) and succeeded.
    Built,
    /// The command, or a prerequisite, failed.
    Failed,
}

/// What a completed pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// First output of each edge whose command ran, in execution order.
    pub executed: Vec<Utf8PathBuf>,
}

impl BuildReport {
    /// Whether no command ran.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Errors raised while evaluating targets.
#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    /// A prerequisite has no rule and does not exist.
    #[error("No rule to make target '{target}'{}", needed_by_suffix(needed_by.as_deref()))]
    #[diagnostic(
        code(papermake::eval::no_rule),
        help("Create the file or declare a target that produces it.")
    )]
    NoRule {
        /// The missing file.
        target: Utf8PathBuf,
        /// The target that listed it, if any.
        needed_by: Option<Utf8PathBuf>,
    },

    /// A command exited unsuccessfully.
    #[error("Command for '{target}' failed with {status}")]
    #[diagnostic(code(papermake::eval::command_failed))]
    CommandFailed {
        /// First output of the failing edge.
        target: Utf8PathBuf,
        /// How the command ended.
        status: CommandStatus,
    },

    /// A command could not be started.
    #[error("Failed to run command for '{target}'")]
    #[diagnostic(code(papermake::eval::spawn))]
    Spawn {
        /// First output of the edge.
        target: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A target was skipped because one of its prerequisites failed.
    #[error("Target '{target}' not remade because of errors")]
    #[diagnostic(code(papermake::eval::upstream))]
    Upstream {
        /// The skipped target.
        target: Utf8PathBuf,
    },

    /// Some requested targets failed while `keep_going` was set.
    #[error("Targets not remade because of errors: {}", join_paths(failed))]
    #[diagnostic(code(papermake::eval::incomplete))]
    Incomplete {
        /// Requested targets that could not be brought up to date.
        failed: Vec<Utf8PathBuf>,
    },

    /// A target was reached again while its prerequisites were pending.
    #[error("Circular dependency through '{target}'")]
    #[diagnostic(code(papermake::eval::cycle))]
    Cycle {
        /// A target on the cycle.
        target: Utf8PathBuf,
    },

    /// File metadata could not be read or a partial output removed.
    #[error("IO error on '{path}'")]
    #[diagnostic(code(papermake::eval::io))]
    Io {
        /// The path involved.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

fn needed_by_suffix(needed_by: Option<&Utf8Path>) -> String {
    needed_by.map_or_else(String::new, |parent| format!(", needed by '{parent}'"))
}

fn join_paths(paths: &[Utf8PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of bringing one prerequisite up to date.
#[derive(Debug, Clone, Copy)]
enum NodeOutcome {
    /// A plain file with its modification time.
    File(SystemTime),
    /// A rule-backed target that was rebuilt this pass or is phony.
    Rebuilt,
    /// A rule-backed target that was already up to date.
    Fresh,
}

/// Walks a [`BuildGraph`] and runs the commands of stale targets.
///
/// `W` receives the echoed command lines, as `make` prints them.
pub struct Evaluator<'g, R, W> {
    graph: &'g BuildGraph,
    root: Utf8PathBuf,
    runner: R,
    echo: W,
    options: EvalOptions,
    states: HashMap<EdgeId, EdgeState>,
    report: BuildReport,
}

impl<'g, R: CommandRunner, W: Write> Evaluator<'g, R, W> {
    /// Create an evaluator that resolves relative paths against `root` and
    /// runs commands there.
    pub fn new(graph: &'g BuildGraph, root: impl Into<Utf8PathBuf>, runner: R, echo: W) -> Self {
        Self {
            graph,
            root: root.into(),
            runner,
            echo,
            options: EvalOptions::default(),
            states: HashMap::new(),
            report: BuildReport::default(),
        }
    }

    /// Replace the evaluation options.
    #[must_use]
    pub const fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// What has run so far, including during a pass that failed.
    #[must_use]
    pub const fn report(&self) -> &BuildReport {
        &self.report
    }

    /// State of the edge producing `target` in the current pass.
    #[must_use]
    pub fn state_of(&self, target: &Utf8Path) -> Option<EdgeState> {
        let (id, _) = self.graph.edge_for(target)?;
        self.states.get(&id).copied()
    }

    /// Consume the evaluator, returning its echo sink.
    pub fn into_echo(self) -> W {
        self.echo
    }

    /// Bring every requested target up to date, in order.
    ///
    /// An empty request builds the graph's implicit targets.
    ///
    /// # Errors
    ///
    /// Returns the first [`EvalError`] encountered, or
    /// [`EvalError::Incomplete`] listing the failed requests when
    /// `keep_going` is set.
    pub fn build(&mut self, targets: &[Utf8PathBuf]) -> Result<BuildReport, EvalError> {
        let requested = if targets.is_empty() {
            self.graph.implicit_targets()
        } else {
            targets.to_vec()
        };
        let mut failed = Vec::new();
        for target in &requested {
            match self.ensure(target, None) {
                Ok(NodeOutcome::File(_) | NodeOutcome::Fresh) => {
                    debug!(output = %target, "nothing to be done");
                }
                Ok(NodeOutcome::Rebuilt) => {}
                Err(err) if self.options.keep_going => {
                    warn!(output = %target, error = %err, "target failed; continuing");
                    failed.push(target.clone());
                }
                Err(err) => return Err(err),
            }
        }
        if failed.is_empty() {
            Ok(self.report.clone())
        } else {
            Err(EvalError::Incomplete { failed })
        }
    }

    fn ensure(
        &mut self,
        target: &Utf8Path,
        needed_by: Option<&Utf8Path>,
    ) -> Result<NodeOutcome, EvalError> {
        let graph = self.graph;
        let Some((id, edge)) = graph.edge_for(target) else {
            return self.ensure_leaf(target, needed_by);
        };
        match self.states.get(&id) {
            Some(EdgeState::PrereqsPending) => {
                return Err(EvalError::Cycle {
                    target: target.to_path_buf(),
                });
            }
            Some(EdgeState::Failed) => {
                return Err(EvalError::Upstream {
                    target: target.to_path_buf(),
                });
            }
            Some(EdgeState::Built) => return Ok(NodeOutcome::Rebuilt),
            Some(EdgeState::UpToDate) => return Ok(Self::settled(edge)),
            None => {}
        }
        self.states.insert(id, EdgeState::PrereqsPending);
        match self.ensure_edge(id, edge) {
            Ok(state) => {
                self.states.insert(id, state);
                Ok(match state {
                    EdgeState::Built => NodeOutcome::Rebuilt,
                    _ => Self::settled(edge),
                })
            }
            Err(err) => {
                self.states.insert(id, EdgeState::Failed);
                Err(err)
            }
        }
    }

    const fn settled(edge: &BuildEdge) -> NodeOutcome {
        if edge.phony {
            NodeOutcome::Rebuilt
        } else {
            NodeOutcome::Fresh
        }
    }

    fn ensure_leaf(
        &self,
        target: &Utf8Path,
        needed_by: Option<&Utf8Path>,
    ) -> Result<NodeOutcome, EvalError> {
        match modified_time(&self.resolve(target))? {
            Some(mtime) => Ok(NodeOutcome::File(mtime)),
            None => Err(EvalError::NoRule {
                target: target.to_path_buf(),
                needed_by: needed_by.map(Utf8Path::to_path_buf),
            }),
        }
    }

    fn ensure_edge(&mut self, id: EdgeId, edge: &'g BuildEdge) -> Result<EdgeState, EvalError> {
        let label = edge_label(edge);
        let mut inputs = InputSummary::default();
        let mut upstream_failed = false;

        for input in &edge.inputs {
            match self.ensure(input, Some(label.as_path())) {
                Ok(NodeOutcome::Rebuilt) => inputs.record_rebuilt(input),
                Ok(NodeOutcome::File(mtime)) => inputs.record_mtime(input, mtime),
                Ok(NodeOutcome::Fresh) => match modified_time(&self.resolve(input))? {
                    Some(mtime) => inputs.record_mtime(input, mtime),
                    None => inputs.record_rebuilt(input),
                },
                Err(err) if self.options.keep_going => {
                    warn!(output = %label, prerequisite = %input, error = %err, "prerequisite failed");
                    upstream_failed = true;
                }
                Err(err) => return Err(err),
            }
        }
        if upstream_failed {
            return Err(EvalError::Upstream { target: label });
        }

        let staleness = Staleness::decide(edge.phony, inputs, self.output_times(edge)?);
        if staleness.is_fresh() {
            debug!(output = %label, "up to date");
            return Ok(EdgeState::UpToDate);
        }
        debug!(output = %label, "stale because {staleness}");
        self.fire(id, edge, &label)?;
        Ok(EdgeState::Built)
    }

    fn output_times(&self, edge: &BuildEdge) -> Result<OutputTimes, EvalError> {
        let mut oldest: Option<SystemTime> = None;
        if edge.phony {
            return Ok(OutputTimes::Oldest(oldest));
        }
        for output in &edge.outputs {
            match modified_time(&self.resolve(output))? {
                Some(mtime) => oldest = Some(oldest.map_or(mtime, |cur| cur.min(mtime))),
                None => return Ok(OutputTimes::Missing(output.clone())),
            }
        }
        Ok(OutputTimes::Oldest(oldest))
    }

    fn fire(&mut self, id: EdgeId, edge: &BuildEdge, label: &Utf8Path) -> Result<(), EvalError> {
        if let Some(description) = &edge.action.description {
            info!(output = %label, "{description}");
        }
        writeln!(self.echo, "{}", recipe_text(&edge.action.recipe)).map_err(|source| {
            EvalError::Io {
                path: label.to_path_buf(),
                source,
            }
        })?;
        self.report.executed.push(label.to_path_buf());
        if self.options.dry_run {
            return Ok(());
        }

        let before = self.snapshot_outputs(edge)?;
        info!(output = %label, edge = id, "running command");
        let result = self.runner.run(&edge.action.recipe, &self.root);
        let failure = match result {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => EvalError::CommandFailed {
                target: label.to_path_buf(),
                status,
            },
            Err(source) => EvalError::Spawn {
                target: label.to_path_buf(),
                source,
            },
        };
        self.delete_partial_outputs(edge, &before)?;
        Err(failure)
    }

    fn snapshot_outputs(&self, edge: &BuildEdge) -> Result<Vec<Option<SystemTime>>, EvalError> {
        if edge.phony {
            return Ok(Vec::new());
        }
        edge.outputs
            .iter()
            .map(|output| modified_time(&self.resolve(output)))
            .collect()
    }

    fn delete_partial_outputs(
        &self,
        edge: &BuildEdge,
        before: &[Option<SystemTime>],
    ) -> Result<(), EvalError> {
        for (output, previous) in edge.outputs.iter().zip(before) {
            let path = self.resolve(output);
            let current = modified_time(&path)?;
            if current.is_some() && current != *previous {
                warn!(output = %output, "deleting output of failed command");
                std::fs::remove_file(&path).map_err(|source| EvalError::Io {
                    path: output.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.root.join(path)
    }
}

fn edge_label(edge: &BuildEdge) -> Utf8PathBuf {
    edge.outputs.first().cloned().unwrap_or_default()
}

fn recipe_text(recipe: &Recipe) -> &str {
    match recipe {
        Recipe::Command { command } => command.as_str(),
        Recipe::Script { script } => script.trim_end(),
        Recipe::Rule { .. } => "",
    }
}
