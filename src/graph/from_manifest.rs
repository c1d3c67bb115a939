//! Manifest-to-graph conversion.

use std::collections::HashMap;

use camino::Utf8PathBuf;

use crate::ast::{PaperManifest, Recipe, Rule, StringOrList, Target};

use super::{
    Action, BuildEdge, BuildGraph, GraphError,
    cmd_interpolate::{interpolate_command, interpolate_script},
    cycle,
};

impl BuildGraph {
    /// Transform a rendered manifest into a [`BuildGraph`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] when a target has no name, a referenced rule is
    /// missing or ambiguous, an output is declared twice, a command cannot be
    /// interpolated, or the targets form a cycle.
    pub fn from_manifest(manifest: &PaperManifest) -> Result<Self, GraphError> {
        let rule_map: HashMap<&str, &Rule> = manifest
            .rules
            .iter()
            .map(|rule| (rule.name.as_str(), rule))
            .collect();

        let mut graph = Self::default();
        let mut duplicates = Vec::new();
        for target in &manifest.targets {
            let edge = build_edge(target, &rule_map)?;
            duplicates.extend(
                edge.outputs
                    .iter()
                    .filter(|out| graph.targets.contains_key(*out))
                    .map(|out| out.as_str().to_owned()),
            );
            graph.push_edge(edge);
        }
        if !duplicates.is_empty() {
            duplicates.sort();
            duplicates.dedup();
            return Err(GraphError::DuplicateOutput {
                outputs: duplicates,
            });
        }

        graph
            .default_targets
            .extend(manifest.defaults.iter().map(Utf8PathBuf::from));

        if let Some(cycle) = cycle::find_cycle(&graph) {
            return Err(GraphError::CircularDependency { cycle });
        }
        Ok(graph)
    }
}

fn build_edge(target: &Target, rule_map: &HashMap<&str, &Rule>) -> Result<BuildEdge, GraphError> {
    let outputs = to_paths(&target.name);
    let inputs = to_paths(&target.sources);
    let Some(target_name) = outputs.first().map(ToString::to_string) else {
        return Err(GraphError::UnnamedTarget {
            sources: target.sources.items().into_iter().map(str::to_owned).collect(),
        });
    };

    let (recipe, description) = match &target.recipe {
        Recipe::Rule { rule } => {
            let tmpl = resolve_rule(rule, rule_map, &target_name)?;
            (
                tmpl.recipe.clone(),
                target.description.clone().or_else(|| tmpl.description.clone()),
            )
        }
        other => (other.clone(), target.description.clone()),
    };

    let recipe = match recipe {
        Recipe::Command { command } => Recipe::Command {
            command: interpolate_command(&command, &inputs, &outputs)?,
        },
        Recipe::Script { script } => Recipe::Script {
            script: interpolate_script(&script, &inputs, &outputs),
        },
        // Rules referencing other rules are not chained.
        Recipe::Rule { rule } => {
            return Err(GraphError::RuleNotFound {
                target_name,
                rule_name: rule.items().join(","),
            });
        }
    };
    let description =
        description.map(|text| interpolate_script(&text, &inputs, &outputs));

    Ok(BuildEdge {
        outputs,
        inputs,
        action: Action {
            recipe,
            description,
        },
        phony: target.phony,
    })
}

fn to_paths(sol: &StringOrList) -> Vec<Utf8PathBuf> {
    sol.items()
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(Utf8PathBuf::from)
        .collect()
}

fn resolve_rule<'a>(
    rule: &StringOrList,
    rule_map: &HashMap<&str, &'a Rule>,
    target_name: &str,
) -> Result<&'a Rule, GraphError> {
    match rule.items().as_slice() {
        [] => Err(GraphError::EmptyRule {
            target_name: target_name.to_owned(),
        }),
        [name] => rule_map
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::RuleNotFound {
                target_name: target_name.to_owned(),
                rule_name: (*name).to_owned(),
            }),
        names => {
            let mut rules: Vec<String> = names.iter().map(|s| (*s).to_owned()).collect();
            rules.sort();
            Err(GraphError::MultipleRules {
                target_name: target_name.to_owned(),
                rules,
            })
        }
    }
}
