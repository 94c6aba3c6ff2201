//! Layer assignment
//!
//! Longest-path ranking from the sources followed by a tightening pass that
//! pulls sources down next to their nearest successor.

use std::collections::VecDeque;
use tracing::{debug, span, trace, Level};

use super::model::{HierarchyModel, NodeIndex};

/// Assign a rank to every node of an acyclic hierarchy
///
/// Sources get rank 0 and every other node one more than its deepest
/// predecessor. Returns the largest rank.
pub fn assign_ranks(model: &mut HierarchyModel) -> usize {
    let rank_span = span!(Level::DEBUG, "assign_ranks", nodes = model.nodes.len());
    let _enter = rank_span.enter();

    let mut indegree: Vec<usize> = model
        .nodes
        .iter()
        .map(|n| n.connects_as_target.len())
        .collect();
    let mut queue: VecDeque<NodeIndex> = (0..model.nodes.len())
        .filter(|&n| indegree[n] == 0)
        .collect();
    for node in &mut model.nodes {
        node.rank = 0;
    }

    let mut ranked = 0;
    while let Some(node) = queue.pop_front() {
        ranked += 1;
        let rank = model.nodes[node].rank;
        let successors: Vec<NodeIndex> = model.successors(node).collect();
        for next in successors {
            if model.nodes[next].rank < rank + 1 {
                model.nodes[next].rank = rank + 1;
            }
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    if ranked < model.nodes.len() {
        debug!(
            unranked = model.nodes.len() - ranked,
            "Nodes left on a cycle; ranks will fail validation"
        );
    }

    tighten_sources(model);

    let max_rank = model.nodes.iter().map(|n| n.rank).max().unwrap_or(0);
    debug!(max_rank, "Rank assignment completed");
    max_rank
}

/// Move every source down to one rank above its nearest successor
fn tighten_sources(model: &mut HierarchyModel) {
    for node in 0..model.nodes.len() {
        if !model.nodes[node].connects_as_target.is_empty() {
            continue;
        }
        let Some(nearest) = model.successors(node).map(|s| model.nodes[s].rank).min() else {
            continue;
        };
        let rank = nearest.saturating_sub(1);
        if rank > model.nodes[node].rank {
            trace!(node, from = model.nodes[node].rank, to = rank, "Tightening source");
            model.nodes[node].rank = rank;
        }
    }
}

/// True if every edge goes from a lower to a higher rank
pub fn ranks_are_monotone(model: &HierarchyModel) -> bool {
    model
        .edges
        .iter()
        .all(|e| model.nodes[e.target].rank > model.nodes[e.source].rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellId;

    fn graph(vertices: usize, edges: &[(usize, usize)]) -> HierarchyModel {
        let mut model = HierarchyModel::new();
        for v in 0..vertices {
            model.add_vertex(CellId(v), 10.0, 10.0);
        }
        for (i, &(s, t)) in edges.iter().enumerate() {
            model.add_edge(CellId(100 + i), CellId(s), CellId(t));
        }
        model
    }

    #[test]
    fn test_longest_path() {
        // 0 -> 1 -> 2 and a shortcut 0 -> 2
        let mut model = graph(3, &[(0, 1), (1, 2), (0, 2)]);
        assert_eq!(assign_ranks(&mut model), 2);
        let ranks: Vec<usize> = model.nodes.iter().map(|n| n.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(ranks_are_monotone(&model));
    }

    #[test]
    fn test_sources_are_tightened() {
        // 0 -> 1 -> 2 -> 3 and a late source 4 -> 3
        let mut model = graph(5, &[(0, 1), (1, 2), (2, 3), (4, 3)]);
        assign_ranks(&mut model);
        assert_eq!(model.nodes[3].rank, 3);
        assert_eq!(model.nodes[4].rank, 2);
        assert!(ranks_are_monotone(&model));
    }

    #[test]
    fn test_isolated_vertices_stay_on_top() {
        let mut model = graph(2, &[]);
        assert_eq!(assign_ranks(&mut model), 0);
        assert!(model.nodes.iter().all(|n| n.rank == 0));
    }
}
