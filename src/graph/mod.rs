//! The validated build graph.
//!
//! A [`BuildGraph`] is produced from a rendered [`PaperManifest`] and is what
//! the evaluator walks. Every output path maps to exactly one [`BuildEdge`];
//! rule templates are resolved and commands interpolated, so edges carry
//! ready-to-run recipes.
//!
//! ```
//! use camino::{Utf8Path, Utf8PathBuf};
//! use papermake::ast::Recipe;
//! use papermake::graph::{Action, BuildEdge, BuildGraph};
//!
//! let mut graph = BuildGraph::default();
//! graph.push_edge(BuildEdge {
//!     outputs: vec![Utf8PathBuf::from("paper.pdf")],
//!     inputs: vec![Utf8PathBuf::from("paper.tex")],
//!     action: Action {
//!         recipe: Recipe::Command { command: "latexmk -pdf paper.tex".into() },
//!         description: None,
//!     },
//!     phony: false,
//! });
//! assert!(graph.edge_for(Utf8Path::new("paper.pdf")).is_some());
//! ```
//!
//! [`PaperManifest`]: crate::ast::PaperManifest

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Recipe;

mod cmd_interpolate;
mod cycle;
mod dot;
mod from_manifest;

/// Index of an edge within [`BuildGraph::edges`].
pub type EdgeId = usize;

/// The command attached to an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Interpolated command or script. Never [`Recipe::Rule`].
    pub recipe: Recipe,
    /// Text logged instead of the command line when present.
    pub description: Option<String>,
}

/// A rule instance: outputs produced together from ordered inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEdge {
    /// Files (or phony labels) produced by the action.
    pub outputs: Vec<Utf8PathBuf>,
    /// Ordered prerequisites, evaluated left to right.
    pub inputs: Vec<Utf8PathBuf>,
    /// What to run when the edge fires.
    pub action: Action,
    /// Phony edges are always stale and never checked on disk.
    pub phony: bool,
}

/// The complete graph of declared targets.
#[derive(Debug, Default, Clone)]
pub struct BuildGraph {
    /// Edges in declaration order.
    pub edges: Vec<BuildEdge>,
    /// Maps each output to the edge producing it, in declaration order.
    pub targets: IndexMap<Utf8PathBuf, EdgeId>,
    /// Targets built when none are requested.
    pub default_targets: Vec<Utf8PathBuf>,
}

impl BuildGraph {
    /// Append an edge and index its outputs, returning its id.
    ///
    /// Outputs that are already indexed are left pointing at their first
    /// producer; [`BuildGraph::from_manifest`] rejects such duplicates before
    /// calling this.
    pub fn push_edge(&mut self, edge: BuildEdge) -> EdgeId {
        let id = self.edges.len();
        for out in &edge.outputs {
            self.targets.entry(out.clone()).or_insert(id);
        }
        self.edges.push(edge);
        id
    }

    /// Look up the edge producing `target`.
    #[must_use]
    pub fn edge_for(&self, target: &Utf8Path) -> Option<(EdgeId, &BuildEdge)> {
        let id = *self.targets.get(target)?;
        self.edges.get(id).map(|edge| (id, edge))
    }

    /// Targets to build when the caller names none.
    ///
    /// Falls back to the first declared target, as `make` does.
    #[must_use]
    pub fn implicit_targets(&self) -> Vec<Utf8PathBuf> {
        if self.default_targets.is_empty() {
            self.targets.keys().take(1).cloned().collect()
        } else {
            self.default_targets.clone()
        }
    }
}

/// Errors raised while turning a manifest into a [`BuildGraph`].
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A target references a rule that is not declared.
    #[error("No rule '{rule_name}' found for target '{target_name}'")]
    #[diagnostic(code(papermake::graph::rule_not_found))]
    RuleNotFound {
        /// Target holding the reference.
        target_name: String,
        /// Missing rule name.
        rule_name: String,
    },

    /// A target lists several rules.
    #[error("Multiple rules for target {target_name}: {rules:?}")]
    #[diagnostic(
        code(papermake::graph::multiple_rules),
        help("A target may reference exactly one rule.")
    )]
    MultipleRules {
        /// Target holding the references.
        target_name: String,
        /// Sorted rule names.
        rules: Vec<String>,
    },

    /// A target's `rule` key is empty.
    #[error("No rules specified for target {target_name}")]
    #[diagnostic(code(papermake::graph::empty_rule))]
    EmptyRule {
        /// Target with the empty reference.
        target_name: String,
    },

    /// A target declares no outputs.
    #[error("Target without a name (sources: {sources:?})")]
    #[diagnostic(code(papermake::graph::unnamed_target))]
    UnnamedTarget {
        /// Prerequisites of the unnamed target, to help locate it.
        sources: Vec<String>,
    },

    /// The same output is declared by more than one target.
    #[error("Duplicate target outputs: {outputs:?}")]
    #[diagnostic(
        code(papermake::graph::duplicate_output),
        help("Each output file may be produced by exactly one target.")
    )]
    DuplicateOutput {
        /// Sorted duplicated outputs.
        outputs: Vec<String>,
    },

    /// Targets depend on each other in a loop.
    #[error("Circular dependency detected: {}", format_cycle(cycle))]
    #[diagnostic(code(papermake::graph::cycle))]
    CircularDependency {
        /// The cycle, rotated to start at its smallest node and closed.
        cycle: Vec<Utf8PathBuf>,
    },

    /// An interpolated command cannot be parsed by a POSIX shell.
    #[error("Invalid command interpolation: {snippet}")]
    #[diagnostic(
        code(papermake::graph::invalid_command),
        help("Check for unbalanced quotes or backticks.")
    )]
    InvalidCommand {
        /// The full interpolated command.
        command: String,
        /// A short prefix of the command for display.
        snippet: String,
    },
}

fn format_cycle(cycle: &[Utf8PathBuf]) -> String {
    cycle
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
