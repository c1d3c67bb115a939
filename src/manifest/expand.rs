//! Expands `foreach` directives into concrete targets.
//!
//! A target carrying `foreach` is cloned once per item. Each clone receives
//! `item` and `index` in its `vars`, and an optional `when` expression can
//! drop individual items.
use super::{ManifestMap, ManifestValue};
use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, context, value::Value};

/// Replace every `foreach` target in `doc` with its per-item clones.
///
/// Targets without `foreach` keep their position; clones take the place of
/// the target they came from.
///
/// # Errors
///
/// Returns an error when `foreach` is neither a list nor an expression
/// yielding one, when `when` fails to evaluate, or when a target's `vars` is
/// not a mapping.
pub fn expand_foreach(doc: &mut ManifestValue, env: &Environment) -> Result<()> {
    let Some(targets) = doc.get_mut("targets").and_then(ManifestValue::as_array_mut) else {
        return Ok(());
    };
    let declared = std::mem::take(targets);
    for (position, target) in declared.into_iter().enumerate() {
        match target {
            ManifestValue::Object(mut template) if template.contains_key("foreach") => {
                let clones = instantiate(&mut template, env)
                    .with_context(|| format!("expand foreach of target #{}", position + 1))?;
                targets.extend(clones);
            }
            other => targets.push(other),
        }
    }
    Ok(())
}

fn instantiate(template: &mut ManifestMap, env: &Environment) -> Result<Vec<ManifestValue>> {
    let over = template.remove("foreach").unwrap_or_default();
    let items = iteration_items(&over, env)?;
    let when = template
        .remove("when")
        .map(|value| expression_text(value, "when"))
        .transpose()?;
    let filter = when
        .as_deref()
        .map(|source| {
            env.compile_expression(source)
                .context("when expression parse error")
        })
        .transpose()?;

    let mut clones = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if let Some(expr) = &filter {
            let keep = expr
                .eval(context! { item, index })
                .context("when evaluation error")?;
            if !keep.is_true() {
                continue;
            }
        }
        let mut target = template.clone();
        bind_iteration(&mut target, item, index)?;
        clones.push(ManifestValue::Object(target));
    }
    Ok(clones)
}

fn iteration_items(over: &ManifestValue, env: &Environment) -> Result<Vec<Value>> {
    match over {
        ManifestValue::Array(seq) => Ok(seq.iter().map(Value::from_serialize).collect()),
        ManifestValue::String(expr) => {
            let value = env
                .compile_expression(expr)
                .context("foreach expression parse error")?
                .eval(context! {})
                .context("foreach evaluation error")?;
            let iter = value
                .try_iter()
                .context("foreach expression did not yield an iterable")?;
            Ok(iter.collect())
        }
        other => Err(anyhow!("foreach must be a list or an expression, got: {other}")),
    }
}

fn expression_text(value: ManifestValue, field: &str) -> Result<String> {
    match value {
        ManifestValue::String(text) => Ok(text),
        other => Err(anyhow!("{field} must be a string expression, got: {other}")),
    }
}

fn bind_iteration(target: &mut ManifestMap, item: &Value, index: usize) -> Result<()> {
    let vars = target
        .entry("vars")
        .or_insert_with(|| ManifestValue::Object(ManifestMap::new()));
    match vars {
        ManifestValue::Object(map) => {
            map.insert("item".into(), serde_json::to_value(item).context("serialise item")?);
            map.insert("index".into(), ManifestValue::from(index));
            Ok(())
        }
        other => Err(anyhow!("target.vars must be an object, got: {other}")),
    }
}
