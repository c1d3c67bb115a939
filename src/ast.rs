//! Paperfile manifest Abstract Syntax Tree structures.
//!
//! This module defines the data structures used to represent a parsed
//! `Paperfile`. The YAML document is first loaded into a JSON value, expanded
//! and then deserialised into these types with `serde_json`.
//!
//! ```rust
//! use papermake::ast::{PaperManifest, Recipe, StringOrList};
//!
//! let doc = serde_json::json!({
//!     "paper_version": "1.0.0",
//!     "targets": [{ "name": "paper.pdf", "sources": "paper.tex", "command": "latexmk -pdf $first" }],
//! });
//! let manifest: PaperManifest = serde_json::from_value(doc).expect("parse");
//! let target = &manifest.targets[0];
//! assert_eq!(target.name, StringOrList::String("paper.pdf".into()));
//! assert!(matches!(target.recipe, Recipe::Command { .. }));
//! ```

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Map type for `vars` blocks, preserving declaration order.
pub type Vars = serde_json::Map<String, serde_json::Value>;

/// Top-level manifest structure parsed from a `Paperfile`.
///
/// ```yaml
/// paper_version: "1.0.0"
/// vars:
///   main: rotletter
/// targets:
///   - name: "{{ main }}.pdf"
///     sources: "{{ main }}.tex"
///     command: latexmk -pdf $first
/// defaults: ["{{ main }}.pdf"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaperManifest {
    /// Semantic version of the manifest format.
    pub paper_version: Version,

    /// Global key/value pairs available to every template.
    #[serde(default)]
    pub vars: Vars,

    /// Named command templates that targets can reference.
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Declared build targets, in declaration order.
    pub targets: Vec<Target>,

    /// Targets built when none are requested on the command line.
    #[serde(default)]
    pub defaults: Vec<String>,
}

/// A reusable command template.
///
/// Rules are expanded per target, so `$in`, `$out` and `$first` resolve to the
/// referencing target's own paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(try_from = "RawRule")]
pub struct Rule {
    /// Unique identifier used by targets to reference this rule.
    pub name: String,
    /// The action executed when the rule is invoked.
    pub recipe: Recipe,
    /// Optional human-friendly summary.
    pub description: Option<String>,
}

/// Execution style for rules and targets.
///
/// Exactly one of `command`, `script` or `rule` must be present on a rule or
/// target; the key that is present selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Recipe {
    /// A single shell command, run with `sh -c`.
    Command {
        /// The command line.
        command: String,
    },
    /// An embedded multi-line script, run with `sh -e -c`.
    Script {
        /// The script body.
        script: String,
    },
    /// Invoke a named rule template.
    Rule {
        /// Name of the referenced rule. Lists are rejected during graph
        /// construction.
        rule: StringOrList,
    },
}

/// Reasons a rule or target fails to describe a single recipe.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipeError {
    /// None of `command`, `script` or `rule` was supplied.
    #[error("missing one of command, script, or rule")]
    Missing,
    /// More than one recipe key was supplied.
    #[error("fields {0} are mutually exclusive")]
    Conflicting(String),
}

impl Recipe {
    /// Build a recipe from the optional recipe keys of a rule or target.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError`] when zero or several keys are present.
    ///
    /// ```rust
    /// use papermake::ast::{Recipe, RecipeError};
    ///
    /// let recipe = Recipe::from_parts(Some("echo hi".into()), None, None);
    /// assert_eq!(recipe, Ok(Recipe::Command { command: "echo hi".into() }));
    /// assert_eq!(Recipe::from_parts(None, None, None), Err(RecipeError::Missing));
    /// ```
    pub fn from_parts(
        command: Option<String>,
        script: Option<String>,
        rule: Option<StringOrList>,
    ) -> Result<Self, RecipeError> {
        match (command, script, rule) {
            (Some(command), None, None) => Ok(Self::Command { command }),
            (None, Some(script), None) => Ok(Self::Script { script }),
            (None, None, Some(rule)) => Ok(Self::Rule { rule }),
            (None, None, None) => Err(RecipeError::Missing),
            (command, script, rule) => {
                let present: Vec<&str> = [
                    ("command", command.is_some()),
                    ("script", script.is_some()),
                    ("rule", rule.is_some()),
                ]
                .into_iter()
                .filter_map(|(name, is_present)| is_present.then_some(name))
                .collect();
                Err(RecipeError::Conflicting(present.join(", ")))
            }
        }
    }
}

/// A single build target.
///
/// Targets describe the files produced by a recipe and the prerequisites that
/// gate rebuilding them. `phony` targets are labels rather than files and are
/// always considered stale.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(try_from = "RawTarget")]
pub struct Target {
    /// Output file or files.
    pub name: StringOrList,
    /// How the target is built.
    pub recipe: Recipe,
    /// Ordered prerequisites.
    pub sources: StringOrList,
    /// Optional text logged instead of the command line.
    pub description: Option<String>,
    /// Target-scoped template variables.
    pub vars: Vars,
    /// Declares that the target does not correspond to a real file.
    pub phony: bool,
}

/// A helper for fields that accept either a single string or a list of
/// strings.
///
/// ```yaml
/// # Scalar
/// sources: paper.tex
/// # Sequence
/// sources:
///   - paper.tex
///   - refs.bib
/// ```
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum StringOrList {
    /// No value provided.
    #[default]
    Empty,
    /// A single string item.
    String(String),
    /// A list of string items.
    List(Vec<String>),
}

impl StringOrList {
    /// Borrow the contained strings in order.
    ///
    /// ```rust
    /// use papermake::ast::StringOrList;
    ///
    /// let value = StringOrList::List(vec!["a".into(), "b".into()]);
    /// assert_eq!(value.items(), vec!["a", "b"]);
    /// assert!(StringOrList::Empty.items().is_empty());
    /// ```
    #[must_use]
    pub fn items(&self) -> Vec<&str> {
        match self {
            Self::Empty => Vec::new(),
            Self::String(s) => vec![s.as_str()],
            Self::List(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    name: String,
    command: Option<String>,
    script: Option<String>,
    rule: Option<StringOrList>,
    description: Option<String>,
}

impl TryFrom<RawRule> for Rule {
    type Error = RecipeError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        Ok(Self {
            recipe: Recipe::from_parts(raw.command, raw.script, raw.rule)?,
            name: raw.name,
            description: raw.description,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    name: StringOrList,
    command: Option<String>,
    script: Option<String>,
    rule: Option<StringOrList>,
    #[serde(default)]
    sources: StringOrList,
    description: Option<String>,
    #[serde(default)]
    vars: Vars,
    #[serde(default)]
    phony: bool,
}

impl TryFrom<RawTarget> for Target {
    type Error = RecipeError;

    fn try_from(raw: RawTarget) -> Result<Self, Self::Error> {
        Ok(Self {
            recipe: Recipe::from_parts(raw.command, raw.script, raw.rule)?,
            name: raw.name,
            sources: raw.sources,
            description: raw.description,
            vars: raw.vars,
            phony: raw.phony,
        })
    }
}
