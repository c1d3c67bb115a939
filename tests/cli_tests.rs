//! Integration tests for the `papermake` binary using `assert_cmd`.
#![cfg(unix)]

use anyhow::{Context, Result, ensure};
use predicates::prelude::*;
use test_support::{PaperWorkspace, papermake_in, write_script};

const MANIFEST: &str = r#"
targets:
  - name: fig/A.pdf
    sources: paperexport.py
    command: ./paperexport.py A
  - name: paper.pdf
    sources: [paper.tex, fig/A.pdf]
    command: cat $first > $out
    description: Typesetting $out
  - name: clean
    phony: true
    command: rm -f paper.pdf fig/A.pdf
  - name: all
    phony: true
    sources: paper.pdf
    command: "true"
defaults: [all]
"#;

fn workspace() -> Result<PaperWorkspace> {
    let ws = PaperWorkspace::with_manifest(MANIFEST)?;
    write_script(
        ws.root(),
        "paperexport.py",
        "mkdir -p fig\n[ \"$1\" != broken ] || exit 3\necho \"$1\" > \"fig/$1.pdf\"",
    )?;
    ws.write("paper.tex", "paper")?;
    ws.touch_at("paper.tex", 0)?;
    ws.touch_at("paperexport.py", 0)?;
    Ok(ws)
}

#[test]
fn builds_default_target_and_echoes_commands() -> Result<()> {
    let ws = workspace()?;
    papermake_in(&ws)
        .assert()
        .success()
        .stdout(predicate::str::contains("./paperexport.py A"))
        .stdout(predicate::str::contains("cat paper.tex > paper.pdf"));
    ensure!(ws.exists("paper.pdf"), "paper.pdf should be built");
    Ok(())
}

#[test]
fn second_run_has_nothing_to_do() -> Result<()> {
    let ws = workspace()?;
    papermake_in(&ws).arg("paper.pdf").assert().success();
    papermake_in(&ws)
        .arg("paper.pdf")
        .assert()
        .success()
        .stdout(predicate::eq("papermake: Nothing to be done for 'paper.pdf'.\n"));
    Ok(())
}

#[test]
fn dry_run_prints_without_building() -> Result<()> {
    let ws = workspace()?;
    papermake_in(&ws)
        .args(["-n", "paper.pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("./paperexport.py A"));
    ensure!(!ws.exists("paper.pdf"), "dry run must not build");
    ensure!(!ws.exists("fig/A.pdf"), "dry run must not build figures");
    Ok(())
}

#[test]
fn failing_command_exits_non_zero() -> Result<()> {
    let ws = workspace()?;
    ws.write(
        "Paperfile",
        &test_support::manifest_yaml(
            "targets:\n  - name: fig/X.pdf\n    sources: paperexport.py\n    command: ./paperexport.py broken\n",
        ),
    )?;
    papermake_in(&ws)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("fig/X.pdf"));
    Ok(())
}

#[test]
fn missing_prerequisite_is_reported() -> Result<()> {
    let ws = workspace()?;
    std::fs::remove_file(ws.path("paper.tex")).context("remove paper.tex")?;
    papermake_in(&ws)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "No rule to make target 'paper.tex', needed by 'paper.pdf'",
        ));
    Ok(())
}

#[test]
fn list_shows_targets() -> Result<()> {
    let ws = workspace()?;
    papermake_in(&ws)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::eq(
            "fig/A.pdf\npaper.pdf: Typesetting paper.pdf\nclean (phony)\nall (phony)\n",
        ));
    Ok(())
}

#[test]
fn graph_prints_dot() -> Result<()> {
    let ws = workspace()?;
    papermake_in(&ws)
        .arg("--graph")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph papermake {"))
        .stdout(predicate::str::contains("\"paper.pdf\" -> \"all\";"));
    Ok(())
}

#[test]
fn missing_manifest_fails() -> Result<()> {
    let ws = PaperWorkspace::new()?;
    papermake_in(&ws)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No `Paperfile` found"));
    Ok(())
}

#[test]
fn file_flag_selects_alternative_manifest() -> Result<()> {
    let ws = workspace()?;
    ws.write(
        "alt.yml",
        &test_support::manifest_yaml(
            "targets:\n  - name: hello\n    phony: true\n    command: echo hello-from-alt\n",
        ),
    )?;
    papermake_in(&ws)
        .args(["-f", "alt.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello-from-alt"));
    Ok(())
}

#[test]
fn yaml_errors_show_the_fix_it_hint() -> Result<()> {
    let ws = PaperWorkspace::new()?;
    ws.write("Paperfile", "\tkey: \"unterminated")?;
    papermake_in(&ws)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Indent with spaces; YAML rejects tabs."));
    Ok(())
}
