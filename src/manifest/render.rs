//! Renders manifest templates using `MiniJinja` before graph construction.
//!
//! Path-valued fields (`name` and `sources`) splice sequences: an entry that
//! consists of a single `{{ expr }}` evaluating to a list expands into one
//! path per element. This lets `sources: "{{ tables }}"` pull in every file a
//! `glob()` variable matched.
use super::ManifestValue;
use crate::ast::{PaperManifest, Recipe, Rule, StringOrList, Target, Vars};
use anyhow::{Context, Result};
use minijinja::{Environment, value::Value};

/// Render manifest targets and rules by evaluating template expressions.
///
/// # Errors
///
/// Returns an error when a template evaluation fails.
pub fn render_manifest(
    mut manifest: PaperManifest,
    env: &Environment,
) -> Result<PaperManifest> {
    for target in &mut manifest.targets {
        render_target(target, env)?;
    }
    // Manifest vars are already environment globals.
    let no_locals = Vars::new();
    for rule in &mut manifest.rules {
        render_rule(rule, env, &no_locals)?;
    }
    for default in &mut manifest.defaults {
        *default = render_str_with(env, default, &no_locals, || "render default".into())?;
    }
    Ok(manifest)
}

/// Render a variable value, preserving the type of single-expression strings.
///
/// # Errors
///
/// Returns an error when a template or expression fails to evaluate.
pub(crate) fn render_value(env: &Environment, value: &ManifestValue) -> Result<Value> {
    match value {
        ManifestValue::String(s) => match single_expression(s) {
            Some(expr) => eval_expression(env, expr, &Vars::new()),
            None => Ok(Value::from(env.render_str(s, ())?)),
        },
        ManifestValue::Array(items) => items
            .iter()
            .map(|item| render_value(env, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::from),
        other => Ok(Value::from_serialize(other)),
    }
}

fn render_rule(rule: &mut Rule, env: &Environment, vars: &Vars) -> Result<()> {
    if let Some(desc) = &mut rule.description {
        *desc = render_str_with(env, desc, vars, || "render rule description".into())?;
    }
    let name = rule.name.clone();
    render_recipe(&mut rule.recipe, env, vars, || format!("render rule '{name}'"))
}

fn render_target(target: &mut Target, env: &Environment) -> Result<()> {
    render_vars(&mut target.vars, env)?;
    let ctx = target.vars.clone();
    render_paths(&mut target.name, env, &ctx).context("render target name")?;
    let label = target.name.items().join(" ");
    render_paths(&mut target.sources, env, &ctx)
        .with_context(|| format!("render sources of '{label}'"))?;
    if let Some(desc) = &mut target.description {
        *desc = render_str_with(env, desc, &ctx, || format!("render description of '{label}'"))?;
    }
    render_recipe(&mut target.recipe, env, &ctx, || {
        format!("render recipe of '{label}'")
    })
}

fn render_recipe(
    recipe: &mut Recipe,
    env: &Environment,
    ctx: &Vars,
    what: impl Fn() -> String,
) -> Result<()> {
    match recipe {
        Recipe::Command { command } => {
            *command = render_str_with(env, command, ctx, &what)?;
        }
        Recipe::Script { script } => {
            *script = render_str_with(env, script, ctx, &what)?;
        }
        Recipe::Rule { rule } => render_paths(rule, env, ctx)?,
    }
    Ok(())
}

fn render_vars(vars: &mut Vars, env: &Environment) -> Result<()> {
    let snapshot = vars.clone();
    for (key, value) in vars.iter_mut() {
        if let ManifestValue::String(s) = value {
            *s = render_str_with(env, s, &snapshot, || format!("render var '{key}'"))?;
        }
    }
    Ok(())
}

fn render_paths(value: &mut StringOrList, env: &Environment, ctx: &Vars) -> Result<()> {
    let rendered = match value {
        StringOrList::Empty => return Ok(()),
        StringOrList::String(s) => {
            let mut items = render_path_item(s, env, ctx)?;
            if items.len() == 1 && single_expression(s).is_none() {
                StringOrList::String(items.remove(0))
            } else {
                StringOrList::List(items)
            }
        }
        StringOrList::List(list) => {
            let mut items = Vec::with_capacity(list.len());
            for item in list.iter() {
                items.extend(render_path_item(item, env, ctx)?);
            }
            StringOrList::List(items)
        }
    };
    *value = rendered;
    Ok(())
}

fn render_path_item(item: &str, env: &Environment, ctx: &Vars) -> Result<Vec<String>> {
    if let Some(expr) = single_expression(item) {
        let value = eval_expression(env, expr, ctx)?;
        if let Ok(iter) = value.try_iter()
            && !value.is_undefined()
            && value.as_str().is_none()
        {
            return Ok(iter.map(|v| v.to_string()).collect());
        }
        return Ok(vec![value.to_string()]);
    }
    Ok(vec![render_str_with(env, item, ctx, || {
        format!("render path '{item}'")
    })?])
}

/// Return the inner expression when `tpl` is exactly one `{{ ... }}` block.
fn single_expression(tpl: &str) -> Option<&str> {
    let inner = tpl
        .trim()
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))?;
    let nested = ["{{", "}}", "{%", "%}"]
        .iter()
        .any(|token| inner.contains(token));
    (!nested).then(|| inner.trim_matches('-').trim())
}

fn eval_expression(env: &Environment, expr: &str, ctx: &Vars) -> Result<Value> {
    env.compile_expression(expr)
        .with_context(|| format!("expression parse error in '{expr}'"))?
        .eval(ctx)
        .with_context(|| format!("evaluation error in '{expr}'"))
}

fn render_str_with(
    env: &Environment,
    tpl: &str,
    ctx: &impl serde::Serialize,
    what: impl FnOnce() -> String,
) -> Result<String> {
    env.render_str(tpl, ctx).with_context(what)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use semver::Version;

    fn manifest_with(target: Target) -> Result<PaperManifest> {
        Ok(PaperManifest {
            paper_version: Version::parse("1.0.0")?,
            vars: Vars::new(),
            rules: Vec::new(),
            targets: vec![target],
            defaults: Vec::new(),
        })
    }

    fn target(name: &str, sources: StringOrList, command: &str) -> Target {
        let mut vars = Vars::new();
        vars.insert("stem".into(), ManifestValue::String("rotletter".into()));
        Target {
            name: StringOrList::String(name.into()),
            recipe: Recipe::Command {
                command: command.into(),
            },
            sources,
            description: None,
            vars,
            phony: false,
        }
    }

    #[rstest]
    #[case("{{ x }}", Some("x"))]
    #[case("  {{ tables }} ", Some("tables"))]
    #[case("{{ a }}/{{ b }}", None)]
    #[case("fig/{{ item }}.pdf", None)]
    fn single_expression_detection(#[case] tpl: &str, #[case] expected: Option<&str>) {
        assert_eq!(single_expression(tpl), expected);
    }

    #[test]
    fn sources_splice_sequence_globals() -> Result<()> {
        let mut env = Environment::new();
        env.add_global("tables", Value::from(vec!["tables/a.tex", "tables/b.tex"]));
        let manifest = manifest_with(target(
            "{{ stem }}.tar.gz",
            StringOrList::List(vec!["{{ stem }}.tex".into(), "{{ tables }}".into()]),
            "tar -czf $out $in",
        ))?;
        let rendered = render_manifest(manifest, &env)?;
        let t = rendered.targets.first().context("target missing")?;
        assert_eq!(t.name, StringOrList::String("rotletter.tar.gz".into()));
        assert_eq!(
            t.sources.items(),
            vec!["rotletter.tex", "tables/a.tex", "tables/b.tex"]
        );
        Ok(())
    }

    #[test]
    fn single_string_expression_becomes_list() -> Result<()> {
        let mut env = Environment::new();
        env.add_global("tables", Value::from(vec!["tables/a.tex"]));
        let manifest = manifest_with(target(
            "out",
            StringOrList::String("{{ tables }}".into()),
            "cat $in",
        ))?;
        let rendered = render_manifest(manifest, &env)?;
        let t = rendered.targets.first().context("target missing")?;
        assert_eq!(t.sources, StringOrList::List(vec!["tables/a.tex".into()]));
        Ok(())
    }

    #[test]
    fn commands_see_target_vars() -> Result<()> {
        let env = Environment::new();
        let manifest = manifest_with(target(
            "{{ stem }}.pdf",
            StringOrList::String("{{ stem }}.tex".into()),
            "latexmk -pdf {{ stem }}",
        ))?;
        let rendered = render_manifest(manifest, &env)?;
        let t = rendered.targets.first().context("target missing")?;
        assert_eq!(t.sources, StringOrList::String("rotletter.tex".into()));
        assert_eq!(
            t.recipe,
            Recipe::Command {
                command: "latexmk -pdf rotletter".into()
            }
        );
        Ok(())
    }
}
