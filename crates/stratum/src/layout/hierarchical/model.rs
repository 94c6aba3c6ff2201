//! Transient graph the hierarchical layout stages operate on
//!
//! One [`HierarchyModel`] is built per layout run from the vertices and edges
//! below a parent cell and dropped after write-back. Nodes and edges are
//! addressed by their index in the model's vectors.

use std::collections::{HashMap, VecDeque};

use crate::model::CellId;

/// Index of a node in [`HierarchyModel::nodes`]
pub type NodeIndex = usize;

/// Index of an edge in [`HierarchyModel::edges`]
pub type EdgeIndex = usize;

/// What a hierarchy node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A vertex cell
    Vertex(CellId),
    /// A routing point of a long edge, one per intermediate rank
    Virtual { edge: EdgeIndex },
}

/// Depth-first traversal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    #[default]
    Unvisited,
    OnStack,
    Done,
}

#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub kind: NodeKind,
    pub rank: usize,
    pub width: f64,
    pub height: f64,
    /// Edges leaving this node in the current (acyclic) orientation
    pub connects_as_source: Vec<EdgeIndex>,
    /// Edges entering this node in the current orientation
    pub connects_as_target: Vec<EdgeIndex>,
    /// Edge cells connecting this vertex to itself
    pub self_loops: Vec<CellId>,
    pub mark: Mark,
    /// Position inside the rank after crossing reduction
    pub order: usize,
    pub x: f64,
    pub y: f64,
}

impl HierarchyNode {
    fn new(kind: NodeKind, width: f64, height: f64) -> Self {
        Self {
            kind,
            rank: 0,
            width,
            height,
            connects_as_source: Vec::new(),
            connects_as_target: Vec::new(),
            self_loops: Vec::new(),
            mark: Mark::Unvisited,
            order: 0,
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn cell(&self) -> Option<CellId> {
        match self.kind {
            NodeKind::Vertex(cell) => Some(cell),
            NodeKind::Virtual { .. } => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, NodeKind::Virtual { .. })
    }

    pub fn degree(&self) -> usize {
        self.connects_as_source.len() + self.connects_as_target.len()
    }
}

/// All parallel cell edges between one ordered pair of nodes
#[derive(Debug, Clone)]
pub struct HierarchyEdge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub cells: Vec<CellId>,
    /// The edge points against the direction of its cells
    pub inverted: bool,
    /// Virtual nodes from source rank + 1 to target rank - 1
    pub chain: Vec<NodeIndex>,
}

/// The graph of one layout run
#[derive(Debug, Clone, Default)]
pub struct HierarchyModel {
    pub nodes: Vec<HierarchyNode>,
    pub edges: Vec<HierarchyEdge>,
    vertex_index: HashMap<CellId, NodeIndex>,
    pair_index: HashMap<(NodeIndex, NodeIndex), EdgeIndex>,
}

impl HierarchyModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex; adding the same cell twice returns the existing node
    pub fn add_vertex(&mut self, cell: CellId, width: f64, height: f64) -> NodeIndex {
        if let Some(&index) = self.vertex_index.get(&cell) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes
            .push(HierarchyNode::new(NodeKind::Vertex(cell), width, height));
        self.vertex_index.insert(cell, index);
        index
    }

    /// Add an edge cell between two vertices already in the model
    ///
    /// Parallel cells between the same ordered pair share one hierarchy edge.
    /// A cell connecting a vertex to itself is recorded as a self-loop and
    /// gets no hierarchy edge. Returns `None` when a terminal is unknown or
    /// for self-loops.
    pub fn add_edge(&mut self, cell: CellId, source: CellId, target: CellId) -> Option<EdgeIndex> {
        let s = *self.vertex_index.get(&source)?;
        let t = *self.vertex_index.get(&target)?;
        if s == t {
            if !self.nodes[s].self_loops.contains(&cell) {
                self.nodes[s].self_loops.push(cell);
            }
            return None;
        }
        if let Some(&index) = self.pair_index.get(&(s, t)) {
            if !self.edges[index].cells.contains(&cell) {
                self.edges[index].cells.push(cell);
            }
            return Some(index);
        }
        let index = self.edges.len();
        self.edges.push(HierarchyEdge {
            source: s,
            target: t,
            cells: vec![cell],
            inverted: false,
            chain: Vec::new(),
        });
        self.nodes[s].connects_as_source.push(index);
        self.nodes[t].connects_as_target.push(index);
        self.pair_index.insert((s, t), index);
        Some(index)
    }

    pub fn node_of(&self, cell: CellId) -> Option<NodeIndex> {
        self.vertex_index.get(&cell).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_index.len()
    }

    /// Reverse the orientation of an edge
    pub fn invert(&mut self, edge: EdgeIndex) {
        let (source, target) = (self.edges[edge].source, self.edges[edge].target);
        self.nodes[source].connects_as_source.retain(|&e| e != edge);
        self.nodes[target].connects_as_target.retain(|&e| e != edge);
        self.nodes[target].connects_as_source.push(edge);
        self.nodes[source].connects_as_target.push(edge);

        let record = &mut self.edges[edge];
        record.source = target;
        record.target = source;
        record.inverted = !record.inverted;
    }

    /// Targets of the edges leaving `node`
    pub fn successors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes[node]
            .connects_as_source
            .iter()
            .map(move |&e| self.edges[e].target)
    }

    /// Sources of the edges entering `node`
    pub fn predecessors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes[node]
            .connects_as_target
            .iter()
            .map(move |&e| self.edges[e].source)
    }

    pub fn reset_marks(&mut self) {
        for node in &mut self.nodes {
            node.mark = Mark::Unvisited;
        }
    }

    /// Weakly connected components of the vertex nodes, in insertion order
    pub fn components(&self) -> Vec<Vec<NodeIndex>> {
        let mut seen = vec![false; self.nodes.len()];
        let mut components = Vec::new();

        for start in 0..self.nodes.len() {
            if seen[start] || self.nodes[start].is_virtual() {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            seen[start] = true;
            while let Some(node) = queue.pop_front() {
                component.push(node);
                for next in self.successors(node).chain(self.predecessors(node)) {
                    if !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Break every edge spanning more than one rank into a chain of virtual
    /// nodes. Ranks must be assigned and every edge must point downwards.
    pub fn insert_virtual_nodes(&mut self, spacing: f64) {
        for edge in 0..self.edges.len() {
            let (source, target) = (self.edges[edge].source, self.edges[edge].target);
            let (top, bottom) = (self.nodes[source].rank, self.nodes[target].rank);
            if bottom <= top + 1 || !self.edges[edge].chain.is_empty() {
                continue;
            }
            let extent = spacing * (self.edges[edge].cells.len() as f64 - 1.0);
            let mut chain = Vec::with_capacity(bottom - top - 1);
            for rank in top + 1..bottom {
                let index = self.nodes.len();
                let mut node = HierarchyNode::new(NodeKind::Virtual { edge }, extent, extent);
                node.rank = rank;
                self.nodes.push(node);
                chain.push(index);
            }
            self.edges[edge].chain = chain;
        }
    }

    /// Consecutive node pairs an edge passes through, top to bottom
    pub fn segments(&self, edge: EdgeIndex) -> Vec<(NodeIndex, NodeIndex)> {
        let record = &self.edges[edge];
        let mut path = Vec::with_capacity(record.chain.len() + 2);
        path.push(record.source);
        path.extend(record.chain.iter().copied());
        path.push(record.target);
        path.windows(2).map(|w| (w[0], w[1])).collect()
    }

    /// Neighbours of every node one rank above and one rank below
    pub fn rank_neighbours(&self) -> (Vec<Vec<NodeIndex>>, Vec<Vec<NodeIndex>>) {
        let mut above = vec![Vec::new(); self.nodes.len()];
        let mut below = vec![Vec::new(); self.nodes.len()];
        for edge in 0..self.edges.len() {
            for (upper, lower) in self.segments(edge) {
                below[upper].push(lower);
                above[lower].push(upper);
            }
        }
        (above, below)
    }

    /// Group the given vertex nodes and the virtual nodes of their edges by
    /// rank, in node index order
    pub fn rank_lists(&self, component: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
        let mut members: Vec<NodeIndex> = component.to_vec();
        for &node in component {
            for &edge in &self.nodes[node].connects_as_source {
                members.extend(self.edges[edge].chain.iter().copied());
            }
        }
        members.sort_unstable();
        members.dedup();

        let max_rank = members.iter().map(|&n| self.nodes[n].rank).max().unwrap_or(0);
        let mut ranks = vec![Vec::new(); if members.is_empty() { 0 } else { max_rank + 1 }];
        for node in members {
            ranks[self.nodes[node].rank].push(node);
        }
        ranks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(n: usize) -> CellId {
        CellId(n)
    }

    #[test]
    fn test_parallel_edges_bundle() {
        let mut model = HierarchyModel::new();
        model.add_vertex(cell(1), 10.0, 10.0);
        model.add_vertex(cell(2), 10.0, 10.0);
        let first = model.add_edge(cell(10), cell(1), cell(2));
        let second = model.add_edge(cell(11), cell(1), cell(2));
        let reverse = model.add_edge(cell(12), cell(2), cell(1));

        assert_eq!(first, second);
        assert_ne!(first, reverse);
        assert_eq!(model.edges.len(), 2);
        assert_eq!(model.edges[0].cells, vec![cell(10), cell(11)]);
    }

    #[test]
    fn test_self_loop_is_kept_out_of_edges() {
        let mut model = HierarchyModel::new();
        let a = model.add_vertex(cell(1), 10.0, 10.0);
        assert_eq!(model.add_edge(cell(5), cell(1), cell(1)), None);
        assert!(model.edges.is_empty());
        assert_eq!(model.nodes[a].self_loops, vec![cell(5)]);
        assert_eq!(model.nodes[a].degree(), 0);
    }

    #[test]
    fn test_invert_moves_connection_lists() {
        let mut model = HierarchyModel::new();
        let a = model.add_vertex(cell(1), 10.0, 10.0);
        let b = model.add_vertex(cell(2), 10.0, 10.0);
        let e = model.add_edge(cell(3), cell(1), cell(2)).unwrap();

        model.invert(e);

        assert!(model.edges[e].inverted);
        assert_eq!(model.edges[e].source, b);
        assert_eq!(model.nodes[b].connects_as_source, vec![e]);
        assert_eq!(model.nodes[a].connects_as_target, vec![e]);
        assert!(model.nodes[a].connects_as_source.is_empty());
        assert_eq!(model.successors(b).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_components_and_virtual_nodes() {
        let mut model = HierarchyModel::new();
        let a = model.add_vertex(cell(1), 10.0, 10.0);
        let b = model.add_vertex(cell(2), 10.0, 10.0);
        let c = model.add_vertex(cell(3), 10.0, 10.0);
        let d = model.add_vertex(cell(4), 10.0, 10.0);
        let e = model.add_edge(cell(5), cell(1), cell(2)).unwrap();
        model.add_vertex(cell(6), 10.0, 10.0);
        model.add_edge(cell(7), cell(3), cell(4));

        assert_eq!(model.components(), vec![vec![a, b], vec![c, d], vec![4]]);

        model.nodes[b].rank = 3;
        model.insert_virtual_nodes(10.0);
        assert_eq!(model.edges[e].chain.len(), 2);
        assert_eq!(model.segments(e).len(), 3);

        let ranks = model.rank_lists(&[a, b]);
        assert_eq!(ranks.len(), 4);
        assert_eq!(ranks[0], vec![a]);
        assert_eq!(ranks[3], vec![b]);
        assert!(model.nodes[ranks[1][0]].is_virtual());
    }
}
