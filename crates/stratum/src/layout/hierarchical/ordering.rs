//! Median ordering for edge crossing minimization
//!
//! Implements the crossing reduction phase of the layered layout: weighted
//! median sweeps alternating downward and upward, each followed by a
//! transpose pass of adjacent swaps. The best ordering seen is kept.

use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, span, trace, Level};

use super::model::{HierarchyModel, NodeIndex};

/// Neighbours of every node in the rank above and the rank below
#[derive(Debug, Clone)]
pub struct Adjacency {
    pub above: Vec<Vec<NodeIndex>>,
    pub below: Vec<Vec<NodeIndex>>,
}

impl Adjacency {
    pub fn new(model: &HierarchyModel) -> Self {
        let (above, below) = model.rank_neighbours();
        Self { above, below }
    }

    fn neighbours(&self, node: NodeIndex, direction: SweepDirection) -> &[NodeIndex] {
        match direction {
            SweepDirection::Downward => &self.above[node],
            SweepDirection::Upward => &self.below[node],
        }
    }
}

/// Count edge crossings between all adjacent layers.
///
/// Two segments (n1 → s1) and (n2 → s2) between layers L and L+1 cross if
/// n1 is left of n2 and s1 is right of s2, or vice versa.
pub fn cross_count(layers: &[Vec<NodeIndex>], adjacency: &Adjacency) -> usize {
    let mut total = 0;
    for i in 0..layers.len().saturating_sub(1) {
        total += two_layer_cross_count(&layers[i], &layers[i + 1], adjacency);
    }
    total
}

/// Count crossings between two adjacent layers.
fn two_layer_cross_count(north: &[NodeIndex], south: &[NodeIndex], adjacency: &Adjacency) -> usize {
    let south_pos = positions(south);

    let mut segments: Vec<(usize, usize)> = Vec::new();
    for (np, &n) in north.iter().enumerate() {
        for succ in &adjacency.below[n] {
            if let Some(&sp) = south_pos.get(succ) {
                segments.push((np, sp));
            }
        }
    }

    let mut crossings = 0;
    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            let (n1, s1) = segments[i];
            let (n2, s2) = segments[j];
            if (n1 < n2 && s1 > s2) || (n1 > n2 && s1 < s2) {
                crossings += 1;
            }
        }
    }
    crossings
}

fn positions(layer: &[NodeIndex]) -> HashMap<NodeIndex, usize> {
    layer.iter().enumerate().map(|(i, &n)| (n, i)).collect()
}

/// Which neighbouring layer a sweep looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    /// Look at predecessors (nodes in the layer above)
    Downward,
    /// Look at successors (nodes in the layer below)
    Upward,
}

/// Weighted median of sorted neighbour positions
///
/// For an even number of neighbours the two middle positions are
/// interpolated towards the side where neighbours are packed more tightly.
pub fn weighted_median(sorted: &[f64]) -> Option<f64> {
    let len = sorted.len();
    let m = len / 2;
    match len {
        0 => None,
        _ if len % 2 == 1 => Some(sorted[m]),
        2 => Some((sorted[0] + sorted[1]) / 2.0),
        _ => {
            let left = sorted[m - 1] - sorted[0];
            let right = sorted[len - 1] - sorted[m];
            if left + right == 0.0 {
                Some((sorted[m - 1] + sorted[m]) / 2.0)
            } else {
                Some((sorted[m - 1] * right + sorted[m] * left) / (left + right))
            }
        }
    }
}

/// Compute median values for nodes in a layer.
///
/// Returns None for nodes without neighbours in the reference layer.
pub fn compute_medians(
    layer: &[NodeIndex],
    ref_layer: &[NodeIndex],
    adjacency: &Adjacency,
    direction: SweepDirection,
) -> Vec<Option<f64>> {
    let ref_pos = positions(ref_layer);

    layer
        .iter()
        .map(|&node| {
            let mut found: Vec<f64> = adjacency
                .neighbours(node, direction)
                .iter()
                .filter_map(|n| ref_pos.get(n).map(|&p| p as f64))
                .collect();
            found.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            weighted_median(&found)
        })
        .collect()
}

/// Order nodes in a layer by their median values.
///
/// Nodes with a median are sorted among the slots they occupy, ties keeping
/// their previous order. Nodes without one stay where they are.
pub fn order_layer_by_median(layer: &mut [NodeIndex], medians: &[Option<f64>]) {
    let mut movable: Vec<(NodeIndex, f64, usize)> = layer
        .iter()
        .enumerate()
        .filter_map(|(i, &node)| medians.get(i).copied().flatten().map(|m| (node, m, i)))
        .collect();
    let slots: Vec<usize> = movable.iter().map(|&(_, _, i)| i).collect();

    movable.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.2.cmp(&b.2))
    });

    for (slot, (node, _, _)) in slots.into_iter().zip(movable) {
        layer[slot] = node;
    }
}

/// Crossings among the segments of `left` and `right` only, with `left`
/// placed before `right`
fn pair_crossings(
    left: NodeIndex,
    right: NodeIndex,
    neighbour_pos: &HashMap<NodeIndex, usize>,
    neighbours: &[Vec<NodeIndex>],
) -> usize {
    let mut crossings = 0;
    for a in &neighbours[left] {
        for b in &neighbours[right] {
            if let (Some(pa), Some(pb)) = (neighbour_pos.get(a), neighbour_pos.get(b)) {
                if pa > pb {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}

/// Swap adjacent nodes while that strictly reduces crossings
///
/// Returns true if any swap was made.
pub fn transpose(layers: &mut [Vec<NodeIndex>], adjacency: &Adjacency) -> bool {
    let mut any = false;
    let mut improved = true;
    let mut passes = 0;
    while improved && passes < layers.len().max(1) * 2 {
        improved = false;
        passes += 1;
        for r in 0..layers.len() {
            let above_pos = if r > 0 {
                positions(&layers[r - 1])
            } else {
                HashMap::new()
            };
            let below_pos = if r + 1 < layers.len() {
                positions(&layers[r + 1])
            } else {
                HashMap::new()
            };
            for i in 0..layers[r].len().saturating_sub(1) {
                let (v, w) = (layers[r][i], layers[r][i + 1]);
                let current = pair_crossings(v, w, &above_pos, &adjacency.above)
                    + pair_crossings(v, w, &below_pos, &adjacency.below);
                let swapped = pair_crossings(w, v, &above_pos, &adjacency.above)
                    + pair_crossings(w, v, &below_pos, &adjacency.below);
                if swapped < current {
                    layers[r].swap(i, i + 1);
                    improved = true;
                    any = true;
                }
            }
        }
    }
    any
}

/// Crossing reduction limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingLimits {
    pub max_iterations: usize,
    pub max_no_improvement: usize,
}

impl Default for OrderingLimits {
    fn default() -> Self {
        Self {
            max_iterations: 24,
            max_no_improvement: 2,
        }
    }
}

/// Apply median ordering to minimize edge crossings.
///
/// Performs alternating sweeps, keeps the best ordering found and stops
/// early after `max_no_improvement` iterations without progress or once no
/// crossing is left. Returns the crossing count of the best ordering, which
/// is never worse than the input's.
pub fn reduce_crossings(
    layers: &mut Vec<Vec<NodeIndex>>,
    adjacency: &Adjacency,
    limits: OrderingLimits,
) -> usize {
    let order_span = span!(Level::DEBUG, "reduce_crossings", layers = layers.len());
    let _enter = order_span.enter();

    if layers.len() < 2 {
        return 0;
    }

    let mut best_layers = layers.clone();
    let mut best_cc = cross_count(layers, adjacency);
    let initial_cc = best_cc;
    let mut without_improvement = 0;

    for i in 0..limits.max_iterations {
        if best_cc == 0 || without_improvement >= limits.max_no_improvement {
            break;
        }
        let downward = i % 2 == 0;

        let layer_indices: Vec<usize> = if downward {
            (1..layers.len()).collect()
        } else {
            (0..layers.len() - 1).rev().collect()
        };

        for layer_idx in layer_indices {
            let (ref_idx, direction) = if downward {
                (layer_idx - 1, SweepDirection::Downward)
            } else {
                (layer_idx + 1, SweepDirection::Upward)
            };

            let medians = compute_medians(&layers[layer_idx], &layers[ref_idx], adjacency, direction);
            order_layer_by_median(&mut layers[layer_idx], &medians);
        }
        transpose(layers, adjacency);

        let cc = cross_count(layers, adjacency);
        trace!(iteration = i, crossings = cc, "Sweep completed");
        if cc < best_cc {
            best_layers = layers.clone();
            best_cc = cc;
            without_improvement = 0;
        } else {
            without_improvement += 1;
        }
    }

    *layers = best_layers;
    debug!(initial = initial_cc, crossings = best_cc, "Crossing reduction completed");
    best_cc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellId;

    /// Two-or-more layer graph; vertex `i` has rank `ranks[i]`
    fn layered(ranks: &[usize], edges: &[(usize, usize)]) -> (HierarchyModel, Adjacency) {
        let mut model = HierarchyModel::new();
        for (i, &rank) in ranks.iter().enumerate() {
            let node = model.add_vertex(CellId(i), 10.0, 10.0);
            model.nodes[node].rank = rank;
        }
        for (i, &(s, t)) in edges.iter().enumerate() {
            model.add_edge(CellId(100 + i), CellId(s), CellId(t));
        }
        let adjacency = Adjacency::new(&model);
        (model, adjacency)
    }

    // =========================================================================
    // Cross count
    // =========================================================================

    #[test]
    fn test_cross_count_no_crossings() {
        let (_, adj) = layered(&[0, 0, 1, 1], &[(0, 2), (1, 3)]);
        let layers = vec![vec![0, 1], vec![2, 3]];
        assert_eq!(cross_count(&layers, &adj), 0);
    }

    #[test]
    fn test_cross_count_one_crossing() {
        let (_, adj) = layered(&[0, 0, 1, 1], &[(0, 3), (1, 2)]);
        let layers = vec![vec![0, 1], vec![2, 3]];
        assert_eq!(cross_count(&layers, &adj), 1);
    }

    #[test]
    fn test_cross_count_multi_layer() {
        let (_, adj) = layered(&[0, 0, 1, 1, 2, 2], &[(0, 3), (1, 2), (2, 5), (3, 4)]);
        let layers = vec![vec![0, 1], vec![2, 3], vec![4, 5]];
        assert_eq!(cross_count(&layers, &adj), 2);
    }

    #[test]
    fn test_cross_count_empty_layers() {
        let (_, adj) = layered(&[], &[]);
        let layers: Vec<Vec<NodeIndex>> = vec![];
        assert_eq!(cross_count(&layers, &adj), 0);
    }

    // =========================================================================
    // Medians
    // =========================================================================

    #[test]
    fn test_weighted_median() {
        assert_eq!(weighted_median(&[]), None);
        assert_eq!(weighted_median(&[3.0]), Some(3.0));
        assert_eq!(weighted_median(&[0.0, 4.0, 5.0]), Some(4.0));
        assert_eq!(weighted_median(&[1.0, 2.0]), Some(1.5));
        // left spread 1, right spread 5: pulled towards the tight left side
        let m = weighted_median(&[0.0, 1.0, 2.0, 7.0]).unwrap();
        assert!((m - (1.0 * 5.0 + 2.0 * 1.0) / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_median_no_predecessors() {
        let (_, adj) = layered(&[0, 1], &[]);
        let medians = compute_medians(&[1], &[0], &adj, SweepDirection::Downward);
        assert_eq!(medians, vec![None]);
    }

    #[test]
    fn test_median_multiple_predecessors() {
        let (_, adj) = layered(&[0, 0, 0, 1], &[(0, 3), (1, 3), (2, 3)]);
        let medians = compute_medians(&[3], &[0, 1, 2], &adj, SweepDirection::Downward);
        assert_eq!(medians, vec![Some(1.0)]);
    }

    #[test]
    fn test_median_upward_direction() {
        let (_, adj) = layered(&[0, 1, 1], &[(0, 2)]);
        let medians = compute_medians(&[0], &[1, 2], &adj, SweepDirection::Upward);
        assert_eq!(medians, vec![Some(1.0)]);
    }

    // =========================================================================
    // Layer ordering
    // =========================================================================

    #[test]
    fn test_order_by_median_simple() {
        let mut layer = vec![10, 11, 12];
        order_layer_by_median(&mut layer, &[Some(2.0), Some(0.5), Some(1.0)]);
        assert_eq!(layer, vec![11, 12, 10]);
    }

    #[test]
    fn test_order_by_median_tie_breaking() {
        let mut layer = vec![10, 11];
        order_layer_by_median(&mut layer, &[Some(1.0), Some(1.0)]);
        assert_eq!(layer, vec![10, 11]);
    }

    #[test]
    fn test_order_by_median_keeps_unconnected_in_place() {
        let mut layer = vec![10, 11, 12, 13];
        order_layer_by_median(&mut layer, &[Some(1.0), None, Some(0.0), None]);
        assert_eq!(layer, vec![12, 11, 10, 13]);
    }

    #[test]
    fn test_order_by_median_empty() {
        let mut layer: Vec<NodeIndex> = vec![];
        order_layer_by_median(&mut layer, &[]);
        assert!(layer.is_empty());
    }

    // =========================================================================
    // Full crossing reduction
    // =========================================================================

    #[test]
    fn test_reduce_fixes_crossing() {
        let (_, adj) = layered(&[0, 0, 1, 1], &[(0, 2), (1, 3)]);
        let mut layers = vec![vec![0, 1], vec![3, 2]];
        assert_eq!(cross_count(&layers, &adj), 1);

        let cc = reduce_crossings(&mut layers, &adj, OrderingLimits::default());

        assert_eq!(cc, 0);
        assert_eq!(layers[1], vec![2, 3]);
    }

    #[test]
    fn test_reduce_already_optimal_is_unchanged() {
        let (_, adj) = layered(&[0, 0, 1, 1], &[(0, 2), (1, 3)]);
        let mut layers = vec![vec![0, 1], vec![2, 3]];
        let cc = reduce_crossings(&mut layers, &adj, OrderingLimits::default());
        assert_eq!(cc, 0);
        assert_eq!(layers, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_reduce_deterministic() {
        let (_, adj) = layered(&[0, 0, 1, 1], &[(0, 3), (1, 2)]);
        let mut first = vec![vec![0, 1], vec![2, 3]];
        let mut second = first.clone();

        let cc1 = reduce_crossings(&mut first, &adj, OrderingLimits::default());
        let cc2 = reduce_crossings(&mut second, &adj, OrderingLimits::default());

        assert_eq!(cc1, cc2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_reduce_never_worse_than_input() {
        let (_, adj) = layered(&[0, 0, 1, 1], &[(0, 2), (0, 3), (1, 2), (1, 3)]);
        let mut layers = vec![vec![0, 1], vec![3, 2]];
        let initial = cross_count(&layers, &adj);
        let cc = reduce_crossings(&mut layers, &adj, OrderingLimits::default());
        assert!(cc <= initial);
    }

    #[test]
    fn test_reduce_diamond() {
        let (_, adj) = layered(&[0, 1, 1, 2], &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let mut layers = vec![vec![0], vec![2, 1], vec![3]];
        assert_eq!(reduce_crossings(&mut layers, &adj, OrderingLimits::default()), 0);
    }

    #[test]
    fn test_transpose_swaps_crossing_pair() {
        let (_, adj) = layered(&[0, 0, 1, 1], &[(0, 3), (1, 2)]);
        let mut layers = vec![vec![0, 1], vec![2, 3]];
        assert!(transpose(&mut layers, &adj));
        assert_eq!(cross_count(&layers, &adj), 0);
    }
}
