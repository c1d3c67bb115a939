//! Snapshot of the Graphviz rendering of a small paper graph.

use insta::{Settings, assert_snapshot};
use papermake::{graph::BuildGraph, manifest};

#[test]
fn paper_graph_dot() {
    let manifest_yaml = r#"
        paper_version: "1.0.0"
        targets:
          - name: fig/A.pdf
            sources: paperexport.py
            command: ./paperexport.py A
          - name: paper.pdf
            sources: [paper.tex, fig/A.pdf]
            command: latexmk -pdf $first
          - name: mnras
            phony: true
            sources: [paper.pdf, fig/A.pdf]
            command: tar czf mnras.tar.gz $in
    "#;
    let manifest = manifest::from_str(manifest_yaml).expect("parse manifest");
    let graph = BuildGraph::from_manifest(&manifest).expect("graph");
    let dot = graph.to_dot();

    let mut settings = Settings::new();
    settings.set_snapshot_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/snapshots/dot"));
    settings.bind(|| {
        assert_snapshot!("paper_graph", dot);
    });
}
