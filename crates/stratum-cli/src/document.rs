//! JSON graph documents
//!
//! A document is a flat list of cells. Vertices may nest inside other
//! vertices (declared earlier); edges connect any two vertices.
//!
//! ```json
//! {
//!   "direction": "LR",
//!   "cells": [
//!     { "id": "a", "kind": "vertex", "label": "Start" },
//!     { "id": "b", "kind": "vertex", "label": "End", "width": 120 },
//!     { "id": "e", "kind": "edge", "source": "a", "target": "b" }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, span, Level};
use unicode_width::UnicodeWidthStr;

use stratum::core::{Direction, Point, Rect};
use stratum::layout::{HierarchicalConfig, HierarchicalLayout, Layout, LayoutEvent};
use stratum::manager::{LayoutManager, SwimlaneManager};
use stratum::model::{CellId, Model, Style};

/// Width of one terminal column when sizing vertices from labels
const CHAR_WIDTH: f64 = 8.0;
const LINE_HEIGHT: f64 = 16.0;
const LABEL_PADDING: f64 = 12.0;
const MIN_WIDTH: f64 = 40.0;
const MIN_HEIGHT: f64 = 30.0;
/// Size of an unlabeled vertex without an explicit size
const DEFAULT_SIZE: (f64, f64) = (80.0, 40.0);
/// Border kept around the children of a nested group
const GROUP_BORDER: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKindSpec {
    Vertex,
    Edge,
}

/// One cell of a graph document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSpec {
    pub id: String,
    pub kind: CellKindSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Cell style, e.g. `{ "lane": true, "start_size": 30 }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
}

/// A graph document as read from disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub cells: Vec<CellSpec>,
}

/// A document loaded into a model
pub struct LoadedDocument {
    pub model: Model,
    /// Document ids with their cells, vertices first
    pub cells: Vec<(String, CellId)>,
}

impl LoadedDocument {
    pub fn vertex_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|(_, cell)| self.model.is_vertex(*cell))
            .count()
    }

    pub fn edge_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|(_, cell)| self.model.is_edge(*cell))
            .count()
    }
}

/// Size of a vertex showing `label`
///
/// Each line is measured in terminal columns, so wide glyphs count double.
pub fn label_size(label: &str) -> (f64, f64) {
    let lines: Vec<&str> = label.lines().collect();
    if lines.is_empty() {
        return DEFAULT_SIZE;
    }
    let columns = lines.iter().map(|line| line.width()).max().unwrap_or(0);
    let width = (columns as f64 * CHAR_WIDTH + 2.0 * LABEL_PADDING).max(MIN_WIDTH);
    let height = (lines.len() as f64 * LINE_HEIGHT + 2.0 * LABEL_PADDING).max(MIN_HEIGHT);
    (width, height)
}

impl GraphDocument {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse graph document")
    }

    /// Create every cell in a fresh model
    ///
    /// A vertex's parent must be declared before it. Edges may refer to any
    /// vertex in the document.
    pub fn load(&self) -> Result<LoadedDocument> {
        let mut model = Model::new();
        let cells = self.insert_into(&mut model)?;
        Ok(LoadedDocument { model, cells })
    }

    /// Lay the document out with `config` and return the loaded model
    ///
    /// Groups (vertices with vertex children) are arranged first and fitted
    /// around their children, then the top level is arranged with `config`.
    /// Lanes are sized by a swimlane manager. Everything happens in the one
    /// transaction that creates the cells.
    pub fn layout(&self, config: HierarchicalConfig) -> Result<LoadedDocument> {
        let span = span!(Level::INFO, "document_layout", cells = self.cells.len());
        let _enter = span.enter();

        let mut model = Model::new();
        let layer = model.default_parent();
        let group = GroupLayout::new(&config);
        let top: Arc<dyn Layout> = Arc::new(HierarchicalLayout::with_config(config));
        let group: Arc<dyn Layout> = Arc::new(group);

        let _swimlanes = SwimlaneManager::install(&mut model);
        let _layouts = LayoutManager::install(
            &mut model,
            move |model: &Model, cell: CellId, event: LayoutEvent| {
                if event == LayoutEvent::EndUpdate {
                    None
                } else if cell == layer {
                    Some(top.clone())
                } else if model.children(cell).iter().any(|&c| model.is_vertex(c)) {
                    Some(group.clone())
                } else {
                    None
                }
            },
        );

        let cells = self.insert_into(&mut model)?;
        debug!(cells = cells.len(), "Document laid out");
        Ok(LoadedDocument { model, cells })
    }

    fn insert_into(&self, model: &mut Model) -> Result<Vec<(String, CellId)>> {
        let layer = model.default_parent();
        model.batch_update(|model| {
            let mut ids: HashMap<&str, CellId> = HashMap::new();
            let mut order = Vec::with_capacity(self.cells.len());

            for spec in self.cells.iter().filter(|c| c.kind == CellKindSpec::Vertex) {
                if ids.contains_key(spec.id.as_str()) {
                    bail!("Duplicate cell id '{}'", spec.id);
                }
                let parent = match &spec.parent {
                    Some(parent) => *ids.get(parent.as_str()).ok_or_else(|| {
                        anyhow!(
                            "Parent '{}' of '{}' must be a vertex declared before it",
                            parent,
                            spec.id
                        )
                    })?,
                    None => layer,
                };
                let (default_width, default_height) = match &spec.label {
                    Some(label) => label_size(label),
                    None => DEFAULT_SIZE,
                };
                let bounds = Rect::new(
                    spec.x.unwrap_or(0.0),
                    spec.y.unwrap_or(0.0),
                    spec.width.unwrap_or(default_width),
                    spec.height.unwrap_or(default_height),
                );
                let style = spec.style.clone().unwrap_or_default();
                let cell = model
                    .insert_vertex(parent, spec.label.as_deref(), bounds, style)
                    .with_context(|| format!("Failed to insert vertex '{}'", spec.id))?;
                ids.insert(spec.id.as_str(), cell);
                order.push((spec.id.clone(), cell));
            }

            for spec in self.cells.iter().filter(|c| c.kind == CellKindSpec::Edge) {
                if ids.contains_key(spec.id.as_str()) {
                    bail!("Duplicate cell id '{}'", spec.id);
                }
                let terminal = |name: &Option<String>, end: &str| -> Result<CellId> {
                    let name = name
                        .as_deref()
                        .ok_or_else(|| anyhow!("Edge '{}' has no {}", spec.id, end))?;
                    ids.get(name).copied().ok_or_else(|| {
                        anyhow!("Edge '{}' refers to unknown {} '{}'", spec.id, end, name)
                    })
                };
                let source = terminal(&spec.source, "source")?;
                let target = terminal(&spec.target, "target")?;
                let parent = match &spec.parent {
                    Some(parent) => *ids.get(parent.as_str()).ok_or_else(|| {
                        anyhow!("Parent '{}' of edge '{}' is unknown", parent, spec.id)
                    })?,
                    None => layer,
                };
                if !model.is_vertex(parent) && parent != layer {
                    bail!("Parent of edge '{}' must be a vertex", spec.id);
                }
                let style = spec.style.clone().unwrap_or_default();
                let cell = model
                    .insert_edge(parent, spec.label.as_deref(), source, target, style)
                    .with_context(|| format!("Failed to insert edge '{}'", spec.id))?;
                ids.insert(spec.id.as_str(), cell);
                order.push((spec.id.clone(), cell));
            }

            Ok(order)
        })
    }
}

/// Hierarchical layout for nested groups
///
/// Keeps the top-level flow direction and spacing but fits the group around
/// its children, leaving room for a lane header.
#[derive(Debug, Clone)]
struct GroupLayout {
    config: HierarchicalConfig,
}

impl GroupLayout {
    fn new(top: &HierarchicalConfig) -> Self {
        Self {
            config: HierarchicalConfig {
                resize_parent: true,
                move_parent: true,
                parent_border: GROUP_BORDER,
                ..top.clone()
            },
        }
    }
}

impl Layout for GroupLayout {
    fn execute(&self, model: &mut Model, parent: CellId) -> Result<()> {
        HierarchicalLayout::with_config(self.config.clone()).execute(model, parent)
    }

    fn name(&self) -> &'static str {
        "group"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexOutput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeOutput {
    pub id: String,
    pub source: String,
    pub target: String,
    pub points: Vec<Point>,
}

/// Positions written back by a layout, ready to serialize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutOutput {
    pub direction: Direction,
    /// Union of the top-level vertex bounds
    pub bounds: Rect,
    pub vertices: Vec<VertexOutput>,
    pub edges: Vec<EdgeOutput>,
}

impl LayoutOutput {
    pub fn collect(document: &LoadedDocument, direction: Direction) -> Self {
        let model = &document.model;
        let layer = model.default_parent();
        let names: HashMap<CellId, &str> = document
            .cells
            .iter()
            .map(|(name, cell)| (*cell, name.as_str()))
            .collect();
        let name_of = |cell: Option<CellId>| -> Option<String> {
            cell.and_then(|c| names.get(&c)).map(|name| name.to_string())
        };

        let mut bounds: Option<Rect> = None;
        let mut vertices = Vec::new();
        let mut edges = Vec::new();
        for (id, cell) in &document.cells {
            let Some(geometry) = model.geometry(*cell) else {
                continue;
            };
            if model.is_vertex(*cell) {
                let rect = geometry.bounds;
                let parent = model.parent(*cell).filter(|&p| p != layer);
                if parent.is_none() {
                    bounds = Some(bounds.map_or(rect, |b| b.union(&rect)));
                }
                vertices.push(VertexOutput {
                    id: id.clone(),
                    parent: name_of(parent),
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                });
            } else {
                edges.push(EdgeOutput {
                    id: id.clone(),
                    source: name_of(model.terminal(*cell, true)).unwrap_or_default(),
                    target: name_of(model.terminal(*cell, false)).unwrap_or_default(),
                    points: geometry.points.clone(),
                });
            }
        }

        Self {
            direction,
            bounds: bounds.unwrap_or_default(),
            vertices,
            edges,
        }
    }

    #[cfg(test)]
    pub fn vertex(&self, id: &str) -> Option<&VertexOutput> {
        self.vertices.iter().find(|v| v.id == id)
    }
}
