//! Hierarchical (layered) layout
//!
//! Arranges the vertex children of a cell in ranks so that edges flow in one
//! direction. The run goes through four stages, each in its own module:
//!
//! 1. [`cycle`]: invert back edges until the graph is acyclic
//! 2. [`ranking`]: longest-path ranks, then tightened sources
//! 3. [`ordering`]: median sweeps and transposition to reduce crossings
//! 4. [`placement`]: rank bands and median alignment inside ranks
//!
//! The computed positions are written back through the model inside a nested
//! transaction, so they join whatever edit triggered the layout.

pub mod cycle;
pub mod model;
pub mod ordering;
pub mod placement;
pub mod ranking;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, span, trace, Level};

use self::model::HierarchyModel;
use self::ordering::{Adjacency, OrderingLimits};
use super::Layout;
use crate::core::{DiagramError, Direction, Point, Rect};
use crate::model::{CellId, Geometry, Model};

/// Hierarchical layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    pub direction: Direction,
    /// Gap between neighbours in the same rank
    pub intra_cell_spacing: f64,
    /// Gap between consecutive ranks
    pub inter_rank_spacing: f64,
    /// Gap between disconnected components
    pub inter_hierarchy_spacing: f64,
    /// Offset between parallel edges sharing a route
    pub parallel_edge_spacing: f64,
    pub max_iterations: usize,
    pub max_no_improvement: usize,
    pub placement_iterations: usize,
    /// Fit the parent around its children afterwards
    pub resize_parent: bool,
    /// Put the children at the parent's origin instead of where they were
    pub move_parent: bool,
    pub parent_border: f64,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TopDown,
            intra_cell_spacing: 30.0,
            inter_rank_spacing: 100.0,
            inter_hierarchy_spacing: 60.0,
            parallel_edge_spacing: 10.0,
            max_iterations: 24,
            max_no_improvement: 2,
            placement_iterations: 8,
            resize_parent: false,
            move_parent: false,
            parent_border: 0.0,
        }
    }
}

/// Positions computed by one run, before write-back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    pub vertices: Vec<(CellId, Rect)>,
    /// Waypoints per edge cell, from its source to its target
    pub edges: Vec<(CellId, Vec<Point>)>,
    /// Edge cells that were left alone (self-loops)
    pub skipped: Vec<CellId>,
    pub bounds: Rect,
    pub crossings: usize,
    pub inverted: usize,
}

/// Sugiyama-style layered layout
#[derive(Debug, Clone, Default)]
pub struct HierarchicalLayout {
    config: HierarchicalConfig,
}

impl HierarchicalLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HierarchicalConfig) -> Self {
        Self { config }
    }

    pub fn with_direction(direction: Direction) -> Self {
        Self::with_config(HierarchicalConfig {
            direction,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &HierarchicalConfig {
        &self.config
    }

    /// Build the hierarchy of the vertex children of `parent`
    ///
    /// Only visible vertices take part. An edge takes part when both of its
    /// terminals (or ancestors of them) are among those vertices.
    pub fn build_hierarchy(&self, model: &Model, parent: CellId) -> HierarchyModel {
        let mut hierarchy = HierarchyModel::new();
        let vertices: Vec<CellId> = model
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| model.is_vertex(c) && model.is_visible(c))
            .collect();

        for &vertex in &vertices {
            let (width, height) = model
                .geometry(vertex)
                .map(|g| (g.width(), g.height()))
                .unwrap_or((0.0, 0.0));
            hierarchy.add_vertex(vertex, width, height);
        }

        let mut seen = HashSet::new();
        for &vertex in &vertices {
            let mut subtree = vec![vertex];
            subtree.extend(model.descendants(vertex));
            for cell in subtree {
                for edge in model.connected_edges(cell) {
                    if !seen.insert(edge) || !model.is_visible(edge) {
                        continue;
                    }
                    let source = model
                        .terminal(edge, true)
                        .and_then(|t| self.child_of(model, parent, t));
                    let target = model
                        .terminal(edge, false)
                        .and_then(|t| self.child_of(model, parent, t));
                    if let (Some(source), Some(target)) = (source, target) {
                        hierarchy.add_edge(edge, source, target);
                    }
                }
            }
        }
        hierarchy
    }

    /// The direct child of `parent` that is `cell` or contains it
    fn child_of(&self, model: &Model, parent: CellId, cell: CellId) -> Option<CellId> {
        let mut current = cell;
        loop {
            let up = model.parent(current)?;
            if up == parent {
                return Some(current);
            }
            current = up;
        }
    }

    /// Compute the layout of the children of `parent` without touching the model
    pub fn run(&self, model: &Model, parent: CellId) -> Result<LayoutResult> {
        let mut hierarchy = self.build_hierarchy(model, parent);
        let run_span = span!(
            Level::INFO,
            "hierarchical_layout",
            parent = %parent,
            vertices = hierarchy.vertex_count(),
            edges = hierarchy.edges.len(),
            direction = %self.config.direction
        );
        let _enter = run_span.enter();

        if hierarchy.nodes.is_empty() {
            debug!("No vertices to lay out");
            return Ok(LayoutResult::default());
        }

        let inverted = cycle::remove_cycles(&mut hierarchy);
        ranking::assign_ranks(&mut hierarchy);
        self.validate(&hierarchy, parent)?;
        hierarchy.insert_virtual_nodes(self.config.parallel_edge_spacing);

        let adjacency = Adjacency::new(&hierarchy);
        let limits = OrderingLimits {
            max_iterations: self.config.max_iterations,
            max_no_improvement: self.config.max_no_improvement,
        };
        let mut components = Vec::new();
        let mut crossings = 0;
        for component in hierarchy.components() {
            let mut ranks = hierarchy.rank_lists(&component);
            crossings += ordering::reduce_crossings(&mut ranks, &adjacency, limits);
            for rank in &ranks {
                for (order, &node) in rank.iter().enumerate() {
                    hierarchy.nodes[node].order = order;
                }
            }
            components.push(ranks);
        }

        let bounds =
            placement::assign_coordinates(&mut hierarchy, &components, &adjacency, &self.config);

        let result = self.collect(&hierarchy, bounds, crossings, inverted);
        info!(
            vertices = result.vertices.len(),
            edges = result.edges.len(),
            crossings,
            inverted,
            "Layout completed"
        );
        Ok(result)
    }

    fn validate(&self, hierarchy: &HierarchyModel, parent: CellId) -> Result<()> {
        let count = hierarchy.nodes.len();
        let broken = |message: &str| -> anyhow::Error {
            DiagramError::structural(parent, message).into()
        };
        if hierarchy
            .edges
            .iter()
            .any(|e| e.source >= count || e.target >= count)
        {
            return Err(broken("edge without a source or target node"));
        }
        if !cycle::is_acyclic(hierarchy) {
            return Err(broken("cycle left after cycle removal"));
        }
        if !ranking::ranks_are_monotone(hierarchy) {
            return Err(broken("edge does not point to a lower rank"));
        }
        Ok(())
    }

    fn collect(
        &self,
        hierarchy: &HierarchyModel,
        bounds: Rect,
        crossings: usize,
        inverted: usize,
    ) -> LayoutResult {
        let mut result = LayoutResult {
            bounds,
            crossings,
            inverted,
            ..Default::default()
        };

        for node in &hierarchy.nodes {
            if let Some(cell) = node.cell() {
                result
                    .vertices
                    .push((cell, Rect::new(node.x, node.y, node.width, node.height)));
                result.skipped.extend(node.self_loops.iter().copied());
            }
        }

        let vertical = self.config.direction.is_vertical();
        for edge in &hierarchy.edges {
            let count = edge.cells.len();
            for (i, &cell) in edge.cells.iter().enumerate() {
                let shift =
                    (i as f64 - (count as f64 - 1.0) / 2.0) * self.config.parallel_edge_spacing;
                let mut points: Vec<Point> = edge
                    .chain
                    .iter()
                    .map(|&v| {
                        let node = &hierarchy.nodes[v];
                        let (cx, cy) = (node.x + node.width / 2.0, node.y + node.height / 2.0);
                        if vertical {
                            Point::new(cx + shift, cy)
                        } else {
                            Point::new(cx, cy + shift)
                        }
                    })
                    .collect();
                if edge.inverted {
                    points.reverse();
                }
                trace!(edge = %cell, points = points.len(), "Routed edge");
                result.edges.push((cell, points));
            }
        }
        result
    }

    /// Where the drawing starts inside `parent`
    fn origin(&self, model: &Model, parent: CellId, result: &LayoutResult) -> Point {
        let (header_w, header_h) = model
            .style(parent)
            .map(|s| s.start_size())
            .unwrap_or((0.0, 0.0));
        let border = self.config.parent_border;
        let home = Point::new(border + header_w, border + header_h);
        if self.config.move_parent {
            return home;
        }

        // Keep the vertices' union where it is now
        let current = result
            .vertices
            .iter()
            .filter_map(|(cell, _)| model.geometry(*cell))
            .map(|g| g.bounds)
            .reduce(|a, b| a.union(&b));
        let computed = result
            .vertices
            .iter()
            .map(|(_, bounds)| *bounds)
            .reduce(|a, b| a.union(&b));
        match (current, computed) {
            (Some(current), Some(computed)) => {
                Point::new(current.x - computed.x, current.y - computed.y)
            }
            _ => home,
        }
    }

    /// Write a computed result back into the model
    pub fn apply(&self, model: &mut Model, parent: CellId, result: &LayoutResult) -> Result<()> {
        let origin = self.origin(model, parent, result);
        let translate = |p: Point| Point::new(p.x + origin.x, p.y + origin.y);

        model.batch_update(|model| {
            for &(cell, bounds) in &result.vertices {
                let mut geometry = model.geometry(cell).cloned().unwrap_or_default();
                geometry.bounds = Rect::new(
                    bounds.x + origin.x,
                    bounds.y + origin.y,
                    bounds.width,
                    bounds.height,
                );
                model.set_geometry(cell, geometry)?;
            }
            for (cell, points) in &result.edges {
                let mut geometry = model.geometry(*cell).cloned().unwrap_or_else(Geometry::edge);
                geometry.points = points.iter().copied().map(translate).collect();
                model.set_geometry(*cell, geometry)?;
            }
            if self.config.resize_parent && model.is_vertex(parent) {
                self.fit_parent(model, parent, result, origin)?;
            }
            Ok(())
        })
    }

    fn fit_parent(
        &self,
        model: &mut Model,
        parent: CellId,
        result: &LayoutResult,
        origin: Point,
    ) -> Result<()> {
        let Some(mut geometry) = model.geometry(parent).cloned() else {
            return Ok(());
        };
        let border = self.config.parent_border;
        let mut right = origin.x;
        let mut bottom = origin.y;
        for &(_, bounds) in &result.vertices {
            right = right.max(bounds.right() + origin.x);
            bottom = bottom.max(bounds.bottom() + origin.y);
        }
        for (_, points) in &result.edges {
            for p in points {
                right = right.max(p.x + origin.x);
                bottom = bottom.max(p.y + origin.y);
            }
        }
        geometry.bounds.width = right + border;
        geometry.bounds.height = bottom + border;
        trace!(
            parent = %parent,
            width = geometry.bounds.width,
            height = geometry.bounds.height,
            "Fitting parent"
        );
        model.set_geometry(parent, geometry)
    }
}

impl Layout for HierarchicalLayout {
    fn execute(&self, model: &mut Model, parent: CellId) -> Result<()> {
        let result = self.run(model, parent)?;
        if result.vertices.is_empty() {
            return Ok(());
        }
        self.apply(model, parent, &result)
    }

    fn name(&self) -> &'static str {
        "hierarchical"
    }
}
