//! Cycle removal
//!
//! Makes the hierarchy acyclic by inverting every edge that closes a cycle
//! during a depth-first traversal. Self-loops never reach this stage.

use tracing::{debug, span, trace, Level};

use super::model::{EdgeIndex, HierarchyModel, Mark, NodeIndex};

/// Nodes the traversal starts from, in insertion order
///
/// Every component contributes its sources (nodes without incoming edges).
/// A component without sources contributes the node with the largest
/// difference between outgoing and incoming edges, first one on ties.
pub fn find_roots(model: &HierarchyModel) -> Vec<NodeIndex> {
    let mut roots = Vec::new();
    for component in model.components() {
        let sources: Vec<NodeIndex> = component
            .iter()
            .copied()
            .filter(|&n| model.nodes[n].connects_as_target.is_empty())
            .collect();
        if !sources.is_empty() {
            roots.extend(sources);
            continue;
        }
        let mut best: Option<(NodeIndex, isize)> = None;
        for &node in &component {
            let n = &model.nodes[node];
            let diff = n.connects_as_source.len() as isize - n.connects_as_target.len() as isize;
            if best.map_or(true, |(_, d)| diff > d) {
                best = Some((node, diff));
            }
        }
        roots.extend(best.map(|(node, _)| node));
    }
    roots.sort_unstable();
    roots
}

/// Invert back edges until the hierarchy is acyclic
///
/// Returns the number of inverted edges.
pub fn remove_cycles(model: &mut HierarchyModel) -> usize {
    let cycle_span = span!(Level::DEBUG, "remove_cycles", nodes = model.nodes.len());
    let _enter = cycle_span.enter();

    model.reset_marks();
    let roots = find_roots(model);
    trace!(root_count = roots.len(), "Found traversal roots");

    let mut inverted = 0;
    for root in roots {
        inverted += visit(model, root);
    }
    // Anything unreachable from the roots
    for node in 0..model.nodes.len() {
        inverted += visit(model, node);
    }

    debug!(inverted, "Cycle removal completed");
    inverted
}

fn visit(model: &mut HierarchyModel, start: NodeIndex) -> usize {
    if model.nodes[start].mark != Mark::Unvisited {
        return 0;
    }

    let mut inverted = 0;
    let mut stack: Vec<(NodeIndex, Vec<EdgeIndex>, usize)> = Vec::new();
    model.nodes[start].mark = Mark::OnStack;
    stack.push((start, model.nodes[start].connects_as_source.clone(), 0));

    while let Some(frame) = stack.last_mut() {
        let node = frame.0;
        let next_edge = frame.1.get(frame.2).copied();
        frame.2 += 1;
        let Some(edge) = next_edge else {
            model.nodes[node].mark = Mark::Done;
            stack.pop();
            continue;
        };

        let target = model.edges[edge].target;
        match model.nodes[target].mark {
            Mark::OnStack => {
                trace!(edge, source = node, target, "Inverting back edge");
                model.invert(edge);
                inverted += 1;
            }
            Mark::Unvisited => {
                model.nodes[target].mark = Mark::OnStack;
                let next = model.nodes[target].connects_as_source.clone();
                stack.push((target, next, 0));
            }
            Mark::Done => {}
        }
    }
    inverted
}

/// True if the hierarchy has no directed cycle
pub fn is_acyclic(model: &HierarchyModel) -> bool {
    let mut indegree: Vec<usize> = model
        .nodes
        .iter()
        .map(|n| n.connects_as_target.len())
        .collect();
    let mut ready: Vec<NodeIndex> = (0..model.nodes.len())
        .filter(|&n| indegree[n] == 0)
        .collect();
    let mut seen = 0;
    while let Some(node) = ready.pop() {
        seen += 1;
        for next in model.successors(node) {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(next);
            }
        }
    }
    seen == model.nodes.len()
}
