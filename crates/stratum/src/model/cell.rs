//! Cells, geometries and styles
//!
//! A [`Cell`] is one node of the document tree: the root, a layer, a vertex
//! or an edge. Cells live in the model's arena and are addressed by
//! [`CellId`]; the model is the only place that mutates them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{Point, Rect};

/// Identity of a cell inside one [`Model`](super::Model)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) usize);

impl CellId {
    /// Position of the cell in the model's arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a cell represents in the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// The single top of the tree
    Root,
    /// A direct child of the root holding the visible content
    Layer,
    /// A node; may contain other cells (groups, pools, lanes)
    Vertex,
    /// A connection between two terminals
    Edge,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Root => write!(f, "root"),
            CellKind::Layer => write!(f, "layer"),
            CellKind::Vertex => write!(f, "vertex"),
            CellKind::Edge => write!(f, "edge"),
        }
    }
}

/// Position and size of a vertex, or the waypoints of an edge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub bounds: Rect,
    /// Intermediate points of an edge route, source to target
    pub points: Vec<Point>,
    /// Bounds are relative to the parent (edge labels)
    pub relative: bool,
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            bounds: Rect::new(x, y, width, height),
            points: Vec::new(),
            relative: false,
        }
    }

    /// An edge geometry with no waypoints
    pub fn edge() -> Self {
        Self {
            relative: true,
            ..Default::default()
        }
    }

    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    pub fn width(&self) -> f64 {
        self.bounds.width
    }

    pub fn height(&self) -> f64 {
        self.bounds.height
    }
}

/// Per-cell configuration
///
/// Styles are plain values owned by their cell; there is no process-wide
/// stylesheet. Layout resolution and the swimlane manager read the typed
/// fields, hosts can stash anything else in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Role name used by [`LayoutRegistry`](crate::layout::LayoutRegistry)
    pub role: Option<String>,
    /// Name of the layout governing this cell's children
    pub layout: Option<String>,
    /// The cell is a swimlane
    pub lane: bool,
    /// Swimlane header runs along the top (true) or the left side (false)
    pub horizontal: bool,
    /// Size of the swimlane header
    pub start_size: f64,
    pub extra: BTreeMap<String, String>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            role: None,
            layout: None,
            lane: false,
            horizontal: true,
            start_size: 0.0,
            extra: BTreeMap::new(),
        }
    }
}

impl Style {
    /// Style of a swimlane with the given header orientation and size
    pub fn lane(horizontal: bool, start_size: f64) -> Self {
        Self {
            lane: true,
            horizontal,
            start_size,
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Header size as (width, height); zero for non-lanes
    pub fn start_size(&self) -> (f64, f64) {
        if !self.lane {
            (0.0, 0.0)
        } else if self.horizontal {
            (0.0, self.start_size)
        } else {
            (self.start_size, 0.0)
        }
    }
}

/// One node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: CellId,
    pub kind: CellKind,
    pub parent: Option<CellId>,
    pub children: Vec<CellId>,
    pub source: Option<CellId>,
    pub target: Option<CellId>,
    pub geometry: Option<Geometry>,
    pub style: Style,
    pub value: Option<String>,
    pub visible: bool,
    pub collapsed: bool,
    pub connectable: bool,
    /// Edges naming this cell as a terminal, attached to the tree or not
    pub(crate) edges: Vec<CellId>,
}

impl Cell {
    pub(crate) fn new(id: CellId, kind: CellKind) -> Self {
        Self {
            id,
            kind,
            parent: None,
            children: Vec::new(),
            source: None,
            target: None,
            geometry: None,
            style: Style::default(),
            value: None,
            visible: true,
            collapsed: false,
            connectable: matches!(kind, CellKind::Vertex),
            edges: Vec::new(),
        }
    }

    pub fn is_vertex(&self) -> bool {
        self.kind == CellKind::Vertex
    }

    pub fn is_edge(&self) -> bool {
        self.kind == CellKind::Edge
    }

    /// The source (`true`) or target (`false`) terminal of an edge
    pub fn terminal(&self, source: bool) -> Option<CellId> {
        if source {
            self.source
        } else {
            self.target
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_start_size_follows_orientation() {
        assert_eq!(Style::lane(true, 40.0).start_size(), (0.0, 40.0));
        assert_eq!(Style::lane(false, 40.0).start_size(), (40.0, 0.0));
        assert_eq!(Style::default().start_size(), (0.0, 0.0));
    }

    #[test]
    fn test_style_deserializes_with_defaults() {
        let style: Style = serde_json::from_str(r#"{"lane": true, "start_size": 24}"#).unwrap();
        assert!(style.lane);
        assert!(style.horizontal);
        assert_eq!(style.start_size, 24.0);
        assert!(style.role.is_none());
    }

    #[test]
    fn test_new_cell_flags() {
        let vertex = Cell::new(CellId(1), CellKind::Vertex);
        assert!(vertex.connectable);
        assert!(vertex.visible);
        let edge = Cell::new(CellId(2), CellKind::Edge);
        assert!(!edge.connectable);
        assert_eq!(edge.terminal(true), None);
    }
}
