//! Stack layout
//!
//! Lines the vertex children of a cell up one after another, top to bottom
//! or left to right. Pools of swimlanes use it to keep their lanes stacked.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, span, trace, Level};

use super::Layout;
use crate::model::{CellId, Model};

/// Stack layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Stack left to right instead of top to bottom
    pub horizontal: bool,
    /// Gap between consecutive children
    pub spacing: f64,
    /// Gap between the parent's edge (or header) and the children
    pub border: f64,
    /// Stretch children across the parent
    pub fill: bool,
    /// Fit the parent around the stack
    pub resize_parent: bool,
    /// Stretch the last child to the end of the parent
    pub resize_last: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            horizontal: false,
            spacing: 0.0,
            border: 0.0,
            fill: false,
            resize_parent: false,
            resize_last: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StackLayout {
    config: StackConfig,
}

impl StackLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    fn stacked_children(&self, model: &Model, parent: CellId) -> Vec<CellId> {
        model
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| model.is_vertex(c) && model.is_visible(c) && model.geometry(c).is_some())
            .collect()
    }
}

impl Layout for StackLayout {
    fn execute(&self, model: &mut Model, parent: CellId) -> Result<()> {
        let stack_span = span!(Level::DEBUG, "stack_layout", parent = %parent);
        let _enter = stack_span.enter();

        let children = self.stacked_children(model, parent);
        if children.is_empty() {
            return Ok(());
        }

        let config = &self.config;
        let (header_w, header_h) = model
            .style(parent)
            .map(|s| s.start_size())
            .unwrap_or((0.0, 0.0));
        let parent_bounds = model.geometry(parent).map(|g| g.bounds);
        let x0 = config.border + header_w;
        let y0 = config.border + header_h;

        model.batch_update(|model| {
            let mut cursor = if config.horizontal { x0 } else { y0 };
            let mut far = 0.0_f64;
            let last = children.len() - 1;

            for (i, &child) in children.iter().enumerate() {
                let Some(mut geometry) = model.geometry(child).cloned() else {
                    continue;
                };
                let bounds = &mut geometry.bounds;
                if config.horizontal {
                    bounds.x = cursor;
                    bounds.y = y0;
                    if let (true, Some(p)) = (config.fill, parent_bounds) {
                        bounds.height = (p.height - y0 - config.border).max(0.0);
                    }
                    if let (true, true, Some(p)) = (config.resize_last, i == last, parent_bounds) {
                        bounds.width = (p.width - config.border - cursor).max(0.0);
                    }
                    cursor += bounds.width + config.spacing;
                    far = far.max(bounds.bottom());
                } else {
                    bounds.x = x0;
                    bounds.y = cursor;
                    if let (true, Some(p)) = (config.fill, parent_bounds) {
                        bounds.width = (p.width - x0 - config.border).max(0.0);
                    }
                    if let (true, true, Some(p)) = (config.resize_last, i == last, parent_bounds) {
                        bounds.height = (p.height - config.border - cursor).max(0.0);
                    }
                    cursor += bounds.height + config.spacing;
                    far = far.max(bounds.right());
                }
                trace!(child = %child, x = bounds.x, y = bounds.y, "Stacked child");
                model.set_geometry(child, geometry)?;
            }

            if config.resize_parent && model.is_vertex(parent) {
                if let Some(mut geometry) = model.geometry(parent).cloned() {
                    let end = cursor - config.spacing + config.border;
                    if config.horizontal {
                        geometry.bounds.width = end;
                        if !config.fill {
                            geometry.bounds.height = far + config.border;
                        }
                    } else {
                        geometry.bounds.height = end;
                        if !config.fill {
                            geometry.bounds.width = far + config.border;
                        }
                    }
                    model.set_geometry(parent, geometry)?;
                }
            }
            debug!(children = children.len(), "Stack layout completed");
            Ok(())
        })
    }

    /// Reorder `cell` among its siblings according to the drop position
    fn move_cell(&self, model: &mut Model, cell: CellId, x: f64, y: f64) -> Result<()> {
        let Some(parent) = model.parent(cell) else {
            return Ok(());
        };
        let siblings = self.stacked_children(model, parent);
        let value = if self.config.horizontal { x } else { y };

        let mut index = model.children(parent).len();
        for &sibling in &siblings {
            if sibling == cell {
                continue;
            }
            let Some(center) = model.geometry(sibling).map(|g| g.bounds.center()) else {
                continue;
            };
            let sibling_value = if self.config.horizontal { center.x } else { center.y };
            if sibling_value > value {
                index = model.child_index(parent, sibling).unwrap_or(index);
                break;
            }
        }

        let current = model.child_index(parent, cell);
        if current == Some(index) || current.map(|c| c + 1) == Some(index) {
            return Ok(());
        }
        debug!(cell = %cell, index, "Moving cell in stack");
        model.add(parent, cell, index)
    }

    fn name(&self) -> &'static str {
        "stack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rect;
    use crate::model::Style;

    fn setup(style: Style) -> (Model, CellId, Vec<CellId>) {
        let mut model = Model::new();
        let layer = model.default_parent();
        let pool = model
            .insert_vertex(layer, Some("pool"), Rect::new(0.0, 0.0, 300.0, 400.0), style)
            .unwrap();
        let lanes = (0..3)
            .map(|i| {
                model
                    .insert_vertex(
                        pool,
                        None,
                        Rect::new(0.0, 0.0, 100.0 + i as f64 * 10.0, 50.0),
                        Style::default(),
                    )
                    .unwrap()
            })
            .collect();
        (model, pool, lanes)
    }

    #[test]
    fn test_vertical_stack_with_spacing() {
        let (mut model, pool, lanes) = setup(Style::default());
        let layout = StackLayout::with_config(StackConfig {
            spacing: 5.0,
            border: 10.0,
            ..Default::default()
        });

        layout.execute(&mut model, pool).unwrap();

        let ys: Vec<f64> = lanes.iter().map(|&l| model.geometry(l).unwrap().bounds.y).collect();
        assert_eq!(ys, vec![10.0, 65.0, 120.0]);
        assert!(lanes.iter().all(|&l| model.geometry(l).unwrap().bounds.x == 10.0));
    }

    #[test]
    fn test_fill_and_resize_parent_with_header() {
        let (mut model, pool, lanes) = setup(Style::lane(true, 30.0));
        let layout = StackLayout::with_config(StackConfig {
            fill: true,
            resize_parent: true,
            ..Default::default()
        });

        layout.execute(&mut model, pool).unwrap();

        let first = model.geometry(lanes[0]).unwrap().bounds;
        assert_eq!(first.y, 30.0);
        assert_eq!(first.width, 300.0);
        let pool_bounds = model.geometry(pool).unwrap().bounds;
        assert_eq!(pool_bounds.height, 30.0 + 150.0);
        assert_eq!(pool_bounds.width, 300.0);
    }

    #[test]
    fn test_resize_last() {
        let (mut model, pool, lanes) = setup(Style::default());
        let layout = StackLayout::with_config(StackConfig {
            resize_last: true,
            ..Default::default()
        });

        layout.execute(&mut model, pool).unwrap();

        let last = model.geometry(lanes[2]).unwrap().bounds;
        assert_eq!(last.y, 100.0);
        assert_eq!(last.height, 300.0);
    }

    #[test]
    fn test_horizontal_stack() {
        let (mut model, pool, lanes) = setup(Style::default());
        let layout = StackLayout::with_config(StackConfig {
            horizontal: true,
            ..Default::default()
        });

        layout.execute(&mut model, pool).unwrap();

        let xs: Vec<f64> = lanes.iter().map(|&l| model.geometry(l).unwrap().bounds.x).collect();
        assert_eq!(xs, vec![0.0, 100.0, 210.0]);
    }

    #[test]
    fn test_move_cell_reorders() {
        let (mut model, pool, lanes) = setup(Style::default());
        let layout = StackLayout::new();
        layout.execute(&mut model, pool).unwrap();

        // drop the first lane below the second one's centre
        layout.move_cell(&mut model, lanes[0], 0.0, 80.0).unwrap();
        assert_eq!(model.children(pool), &[lanes[1], lanes[0], lanes[2]]);

        // dropping where it already is changes nothing
        let before = model.history().len();
        layout.move_cell(&mut model, lanes[0], 0.0, 80.0).unwrap();
        assert_eq!(model.history().len(), before);
    }
}
