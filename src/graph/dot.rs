//! Graphviz rendering of the build graph.

use std::fmt;

use super::BuildGraph;

fn quote(label: &str) -> String {
    format!("\"{}\"", label.replace('\\', "\\\\").replace('"', "\\\""))
}

/// DOT view over a [`BuildGraph`].
struct Dot<'a>(&'a BuildGraph);

impl fmt::Display for Dot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.0;
        writeln!(f, "digraph papermake {{")?;
        writeln!(f, "  rankdir=LR;")?;
        for (target, id) in &graph.targets {
            let shape = match graph.edges.get(*id) {
                Some(edge) if edge.phony => "box",
                _ => "ellipse",
            };
            writeln!(f, "  {} [shape={shape}];", quote(target.as_str()))?;
        }
        for edge in &graph.edges {
            for output in &edge.outputs {
                for input in &edge.inputs {
                    writeln!(f, "  {} -> {};", quote(input.as_str()), quote(output.as_str()))?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

impl BuildGraph {
    /// Render the graph in Graphviz DOT format.
    ///
    /// Every declared output becomes a node; phony targets are drawn as boxes
    /// and leaf prerequisites as plain nodes. Edges point from a prerequisite
    /// to the target that consumes it.
    #[must_use]
    pub fn to_dot(&self) -> String {
        Dot(self).to_string()
    }
}
