//! Cycle detection over the target graph.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};

use super::BuildGraph;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Return the first cycle found, canonicalised, or `None`.
///
/// Nodes are visited in declaration order so the result is deterministic.
pub(crate) fn find_cycle(graph: &BuildGraph) -> Option<Vec<Utf8PathBuf>> {
    let mut detector = CycleDetector::new(graph);
    for node in graph.targets.keys() {
        if detector.is_visited(node) {
            continue;
        }
        if let Some(found) = detector.visit(node) {
            return Some(found);
        }
    }
    None
}

struct CycleDetector<'a> {
    graph: &'a BuildGraph,
    stack: Vec<&'a Utf8Path>,
    states: HashMap<&'a Utf8Path, VisitState>,
}

impl<'a> CycleDetector<'a> {
    fn new(graph: &'a BuildGraph) -> Self {
        Self {
            graph,
            stack: Vec::new(),
            states: HashMap::new(),
        }
    }

    fn is_visited(&self, node: &Utf8Path) -> bool {
        matches!(self.states.get(node), Some(VisitState::Visited))
    }

    fn visit(&mut self, node: &'a Utf8Path) -> Option<Vec<Utf8PathBuf>> {
        match self.states.get(node) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self.stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<Utf8PathBuf> = self
                    .stack
                    .iter()
                    .skip(idx)
                    .map(|n| n.to_path_buf())
                    .collect();
                cycle.push(node.to_path_buf());
                return Some(canonicalize_cycle(cycle));
            }
            None => {
                self.states.insert(node, VisitState::Visiting);
            }
        }

        self.stack.push(node);

        let graph = self.graph;
        if let Some((_, edge)) = graph.edge_for(node) {
            for dep in &edge.inputs {
                if !graph.targets.contains_key(dep) {
                    continue;
                }
                if let Some(cycle) = self.visit(dep) {
                    return Some(cycle);
                }
            }
        }

        self.stack.pop();
        self.states.insert(node, VisitState::Visited);
        None
    }
}

fn canonicalize_cycle(mut cycle: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}
