//! Tests for manifest loading, variables and template helpers.

use super::*;
use crate::ast::{Recipe, StringOrList};
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

#[fixture]
fn paper_dir() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
    fs::create_dir_all(root.join("tables")).expect("tables dir");
    for table in ["tab2.tex", "tab1.tex"] {
        fs::write(root.join("tables").join(table), "\\begin{table}").expect("write table");
    }
    fs::create_dir_all(root.join("tables/old")).expect("nested dir");
    (dir, root)
}

fn sources(manifest: &PaperManifest, idx: usize) -> Vec<&str> {
    manifest
        .targets
        .get(idx)
        .map(|target| target.sources.items())
        .unwrap_or_default()
}

#[rstest]
fn vars_become_template_globals() {
    let yaml = r#"
paper_version: "1.0.0"
vars:
  main: rotletter
  pdf: "{{ main }}.pdf"
targets:
  - name: "{{ pdf }}"
    sources: "{{ main }}.tex"
    command: latexmk -pdf {{ main }}
"#;
    let manifest = from_str(yaml).expect("parse");
    let target = manifest.targets.first().expect("target");
    assert_eq!(target.name.items(), vec!["rotletter.pdf"]);
    assert_eq!(target.sources.items(), vec!["rotletter.tex"]);
    assert!(matches!(
        &target.recipe,
        Recipe::Command { command } if command == "latexmk -pdf rotletter"
    ));
}

#[rstest]
fn glob_var_splices_table_files(paper_dir: (TempDir, Utf8PathBuf)) {
    let (_dir, root) = paper_dir;
    let yaml = r#"
paper_version: "1.0.0"
vars:
  tables: "{{ glob('tables/*') }}"
targets:
  - name: mnras
    phony: true
    sources: ["rotletter.tex", "{{ tables }}"]
    command: tar czf mnras.tar.gz $in
"#;
    let manifest = from_str_in(yaml, &root).expect("parse");
    assert_eq!(
        sources(&manifest, 0),
        vec!["rotletter.tex", "tables/tab1.tex", "tables/tab2.tex"]
    );
}

#[rstest]
fn glob_without_matches_is_empty(paper_dir: (TempDir, Utf8PathBuf)) {
    let (_dir, root) = paper_dir;
    let yaml = r#"
paper_version: "1.0.0"
targets:
  - name: arxiv
    phony: true
    sources: "{{ glob('fig/*.pdf') }}"
    command: "true"
"#;
    let manifest = from_str_in(yaml, &root).expect("parse");
    assert!(sources(&manifest, 0).is_empty());
}

#[rstest]
fn invalid_glob_pattern_fails_load() {
    let yaml = r#"
paper_version: "1.0.0"
targets:
  - name: arxiv
    sources: "{{ glob('tables/[') }}"
    command: "true"
"#;
    let err = from_str(yaml).expect_err("bad pattern");
    assert!(format!("{err:#}").contains("invalid glob pattern"), "{err:#}");
}

#[rstest]
fn env_reads_and_rejects_missing_variables() {
    let home = std::env::var("HOME").unwrap_or_default();
    let yaml = r#"
paper_version: "1.0.0"
targets:
  - name: "{{ env('HOME') }}/paper.pdf"
    command: "true"
"#;
    if !home.is_empty() {
        let manifest = from_str(yaml).expect("parse");
        let target = manifest.targets.first().expect("target");
        assert_eq!(target.name.items(), vec![format!("{home}/paper.pdf").as_str()]);
    }

    let missing = r#"
paper_version: "1.0.0"
targets:
  - name: "{{ env('PAPERMAKE_SURELY_UNSET_VARIABLE') }}"
    command: "true"
"#;
    let err = from_str(missing).expect_err("unset variable");
    assert!(format!("{err:#}").contains("is not set"), "{err:#}");
}

#[rstest]
fn foreach_expands_figure_targets() {
    let yaml = r#"
paper_version: "1.0.0"
vars:
  figures: [Bruntt, SH, asterosamp]
targets:
  - foreach: "figures"
    when: "item != 'SH'"
    name: "fig/{{ item }}.pdf"
    sources: paperexport.py
    command: "python paperexport.py {{ item }} --index {{ index }}"
"#;
    let manifest = from_str(yaml).expect("parse");
    let names: Vec<Vec<&str>> = manifest.targets.iter().map(|t| t.name.items()).collect();
    assert_eq!(names, vec![vec!["fig/Bruntt.pdf"], vec!["fig/asterosamp.pdf"]]);
    let commands: Vec<&str> = manifest
        .targets
        .iter()
        .filter_map(|t| match &t.recipe {
            Recipe::Command { command } => Some(command.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        commands,
        vec![
            "python paperexport.py Bruntt --index 0",
            "python paperexport.py asterosamp --index 2",
        ]
    );
}

#[rstest]
fn defaults_and_rules_are_rendered() {
    let yaml = r#"
paper_version: "1.0.0"
vars:
  main: rotletter
rules:
  - name: latex
    command: latexmk -pdf $first
    description: "Typesetting {{ main }}"
targets:
  - name: "{{ main }}.pdf"
    sources: "{{ main }}.tex"
    rule: latex
defaults: ["{{ main }}.pdf"]
"#;
    let manifest = from_str(yaml).expect("parse");
    assert_eq!(manifest.defaults, vec!["rotletter.pdf".to_owned()]);
    let rule = manifest.rules.first().expect("rule");
    assert_eq!(rule.description.as_deref(), Some("Typesetting rotletter"));
    let target = manifest.targets.first().expect("target");
    assert!(matches!(&target.recipe, Recipe::Rule { rule } if *rule == StringOrList::String("latex".into())));
}

#[rstest]
#[case("paper_version: \"1.0.0\"\ntargets:\n  - name: x\n    command: a\n    script: b\n", "mutually exclusive")]
#[case("paper_version: \"1.0.0\"\ntargets:\n  - name: x\n", "missing one of command, script, or rule")]
#[case("paper_version: \"1.0.0\"\ntargets:\n  - name: x\n    command: a\n    deps: y\n", "unknown field")]
#[case("paper_version: \"1.0.0\"\nvars: [a, b]\n", "vars must be a mapping")]
#[case("paper_version: not-semver\n", "major version")]
#[case("paper_version: \"1.0.0\"\ntargets: [\n", "yaml parse error")]
fn malformed_manifests_are_rejected(#[case] yaml: &str, #[case] needle: &str) {
    let err = from_str(yaml).expect_err("manifest should fail");
    assert!(err.downcast_ref::<ManifestError>().is_some(), "{err:?}");
    let rendered = format!("{err:#}").to_lowercase();
    assert!(rendered.contains(needle), "expected '{needle}' in {rendered}");
}

#[test]
fn from_path_uses_manifest_directory_as_root() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
    fs::create_dir_all(root.join("tables")).expect("tables dir");
    fs::write(root.join("tables/tab1.tex"), "").expect("table");
    let path = root.join("Paperfile");
    fs::write(
        &path,
        "paper_version: \"1.0.0\"\ntargets:\n  - name: all\n    phony: true\n    sources: \"{{ glob('tables/*') }}\"\n    command: \"true\"\n",
    )
    .expect("write manifest");
    let loaded = from_path(&path).expect("load");
    assert_eq!(loaded.workspace_root, root);
    assert_eq!(sources(&loaded.manifest, 0), vec!["tables/tab1.tex"]);
}

#[test]
fn from_path_reports_missing_file() {
    let err = from_path("definitely/not/here/Paperfile").expect_err("missing file");
    assert!(err.to_string().contains("failed to read"), "{err}");
}
