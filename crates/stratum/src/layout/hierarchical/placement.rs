//! Coordinate assignment
//!
//! Works on two abstract axes: the rank axis (down the flow) and the in-rank
//! axis (across it). Ranks become bands as deep as their deepest member;
//! inside a rank nodes are packed, then pulled toward the median of their
//! neighbours for a few passes without ever overlapping. The result is mapped
//! onto x/y according to the flow direction.

use std::cmp::Ordering;
use tracing::{debug, span, trace, Level};

use super::model::{HierarchyModel, NodeIndex};
use super::ordering::{weighted_median, Adjacency};
use super::HierarchicalConfig;
use crate::core::{Direction, Rect};

/// Size of a node across the flow
fn extent_across(model: &HierarchyModel, node: NodeIndex, direction: Direction) -> f64 {
    let n = &model.nodes[node];
    if direction.is_vertical() {
        n.width
    } else {
        n.height
    }
}

/// Size of a node along the flow
fn extent_along(model: &HierarchyModel, node: NodeIndex, direction: Direction) -> f64 {
    let n = &model.nodes[node];
    if direction.is_vertical() {
        n.height
    } else {
        n.width
    }
}

/// Assign `x`/`y` (top-left, relative to the layout origin) to every node of
/// every component
///
/// `components` holds the ordered rank lists of each component. Returns the
/// bounds of the whole drawing.
pub fn assign_coordinates(
    model: &mut HierarchyModel,
    components: &[Vec<Vec<NodeIndex>>],
    adjacency: &Adjacency,
    config: &HierarchicalConfig,
) -> Rect {
    let place_span = span!(
        Level::DEBUG,
        "assign_coordinates",
        components = components.len(),
        direction = %config.direction
    );
    let _enter = place_span.enter();

    let direction = config.direction;

    // Rank axis: shared by all components
    let rank_count = components.iter().map(Vec::len).max().unwrap_or(0);
    let mut bands = vec![0.0_f64; rank_count];
    for ranks in components {
        for (r, rank) in ranks.iter().enumerate() {
            for &node in rank {
                bands[r] = bands[r].max(extent_along(model, node, direction));
            }
        }
    }
    let mut offsets = Vec::with_capacity(rank_count);
    let mut cursor = 0.0;
    for band in &bands {
        offsets.push(cursor);
        cursor += band + config.inter_rank_spacing;
    }
    let depth = if rank_count == 0 {
        0.0
    } else {
        cursor - config.inter_rank_spacing
    };

    // In-rank axis: component by component
    let mut centers = vec![0.0_f64; model.nodes.len()];
    let mut component_offset = 0.0;
    for ranks in components {
        pack(model, ranks, &mut centers, config);
        for iteration in 0..config.placement_iterations {
            align(model, ranks, adjacency, &mut centers, iteration % 2 == 0, config);
        }

        let (min, max) = span_of(model, ranks, &centers, direction);
        for rank in ranks {
            for &node in rank {
                centers[node] += component_offset - min;
            }
        }
        trace!(width = max - min, offset = component_offset, "Component placed");
        component_offset += (max - min) + config.inter_hierarchy_spacing;
    }
    let breadth = if components.is_empty() {
        0.0
    } else {
        component_offset - config.inter_hierarchy_spacing
    };

    for (r, band) in bands.iter().enumerate() {
        for ranks in components {
            let Some(rank) = ranks.get(r) else {
                continue;
            };
            for &node in rank {
                let across = centers[node] - extent_across(model, node, direction) / 2.0;
                let along_size = extent_along(model, node, direction);
                let mut along = offsets[r] + (band - along_size) / 2.0;
                if direction.is_reversed() {
                    along = depth - along - along_size;
                }
                let n = &mut model.nodes[node];
                if direction.is_vertical() {
                    n.x = across;
                    n.y = along;
                } else {
                    n.x = along;
                    n.y = across;
                }
            }
        }
    }

    let bounds = if direction.is_vertical() {
        Rect::new(0.0, 0.0, breadth, depth)
    } else {
        Rect::new(0.0, 0.0, depth, breadth)
    };
    debug!(width = bounds.width, height = bounds.height, "Coordinate assignment completed");
    bounds
}

/// Initial placement: each rank packed left to right and centred on the
/// widest rank
fn pack(
    model: &HierarchyModel,
    ranks: &[Vec<NodeIndex>],
    centers: &mut [f64],
    config: &HierarchicalConfig,
) {
    let direction = config.direction;
    let widths: Vec<f64> = ranks
        .iter()
        .map(|rank| {
            let total: f64 = rank.iter().map(|&n| extent_across(model, n, direction)).sum();
            total + rank.len().saturating_sub(1) as f64 * config.intra_cell_spacing
        })
        .collect();
    let widest = widths.iter().copied().fold(0.0, f64::max);

    for (rank, width) in ranks.iter().zip(widths) {
        let mut cursor = (widest - width) / 2.0;
        for &node in rank {
            let extent = extent_across(model, node, direction);
            centers[node] = cursor + extent / 2.0;
            cursor += extent + config.intra_cell_spacing;
        }
    }
}

/// One median alignment pass, downward (towards the rank above) or upward
fn align(
    model: &HierarchyModel,
    ranks: &[Vec<NodeIndex>],
    adjacency: &Adjacency,
    centers: &mut [f64],
    downward: bool,
    config: &HierarchicalConfig,
) {
    let direction = config.direction;
    let order: Vec<usize> = if downward {
        (1..ranks.len()).collect()
    } else {
        (0..ranks.len().saturating_sub(1)).rev().collect()
    };

    let neighbours: &[Vec<NodeIndex>] = if downward {
        &adjacency.above
    } else {
        &adjacency.below
    };

    for r in order {
        let rank = &ranks[r];

        // Virtual nodes first to keep long edges straight, then by
        // connectivity; position breaks ties
        let mut priority: Vec<usize> = (0..rank.len()).collect();
        priority.sort_by(|&a, &b| {
            let (na, nb) = (rank[a], rank[b]);
            let key = |n: NodeIndex| (model.nodes[n].is_virtual(), neighbours[n].len());
            key(nb).cmp(&key(na)).then_with(|| a.cmp(&b))
        });

        for position in priority {
            let node = rank[position];
            let mut wanted: Vec<f64> = neighbours[node].iter().map(|&n| centers[n]).collect();
            if wanted.is_empty() {
                continue;
            }
            wanted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let Some(target) = weighted_median(&wanted) else {
                continue;
            };

            let half = extent_across(model, node, direction) / 2.0;
            let mut low = f64::NEG_INFINITY;
            let mut high = f64::INFINITY;
            if position > 0 {
                let left = rank[position - 1];
                low = centers[left]
                    + extent_across(model, left, direction) / 2.0
                    + config.intra_cell_spacing
                    + half;
            }
            if position + 1 < rank.len() {
                let right = rank[position + 1];
                high = centers[right]
                    - extent_across(model, right, direction) / 2.0
                    - config.intra_cell_spacing
                    - half;
            }
            centers[node] = target.max(low).min(high);
        }
    }
}

fn span_of(
    model: &HierarchyModel,
    ranks: &[Vec<NodeIndex>],
    centers: &[f64],
    direction: Direction,
) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for rank in ranks {
        for &node in rank {
            let half = extent_across(model, node, direction) / 2.0;
            min = min.min(centers[node] - half);
            max = max.max(centers[node] + half);
        }
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}
