//! Stratum - Incremental hierarchical layout for diagram models
//!
//! A transactional cell model plus the layouts and managers that keep it
//! arranged while it is edited.
//!
//! # Quick Start
//!
//! ```rust
//! use stratum::prelude::*;
//!
//! let mut model = Model::new();
//! let parent = model.default_parent();
//! let a = model.insert_vertex(parent, Some("A"), Rect::new(0.0, 0.0, 80.0, 40.0), Style::default()).unwrap();
//! let b = model.insert_vertex(parent, Some("B"), Rect::new(0.0, 0.0, 80.0, 40.0), Style::default()).unwrap();
//! model.insert_edge(parent, None, a, b, Style::default()).unwrap();
//!
//! let result = stratum::layout(&mut model, parent, Direction::TopDown).unwrap();
//! assert_eq!(result.vertices.len(), 2);
//! assert!(model.geometry(b).unwrap().bounds.y > model.geometry(a).unwrap().bounds.y);
//! ```
//!
//! # Automatic Layout
//!
//! Install a [`LayoutManager`](manager::LayoutManager) and every committed
//! transaction re-runs the layouts of the containers it touched:
//!
//! ```rust
//! use std::sync::Arc;
//! use stratum::prelude::*;
//!
//! let mut model = Model::new();
//! let layer = model.default_parent();
//! let mut registry = LayoutRegistry::new();
//! registry.register("flow", Arc::new(HierarchicalLayout::new()));
//! let _manager = LayoutManager::install(&mut model, registry);
//!
//! let group = model
//!     .insert_vertex(layer, None, Rect::new(0.0, 0.0, 400.0, 300.0), Style::default().with_role("flow"))
//!     .unwrap();
//! let a = model.insert_vertex(group, None, Rect::new(0.0, 0.0, 40.0, 40.0), Style::default()).unwrap();
//! let b = model.insert_vertex(group, None, Rect::new(0.0, 0.0, 40.0, 40.0), Style::default()).unwrap();
//! model.insert_edge(group, None, a, b, Style::default()).unwrap();
//!
//! // the edge insertion committed and the group was laid out in the same edit
//! assert!(model.geometry(b).unwrap().bounds.y > model.geometry(a).unwrap().bounds.y);
//! ```

pub mod core;
pub mod layout;
pub mod manager;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{DiagramError, Direction, Point, Rect};
    pub use crate::layout::hierarchical::LayoutResult;
    pub use crate::layout::{
        HierarchicalConfig, HierarchicalLayout, Layout, LayoutEvent, LayoutRegistry,
        LayoutResolver, StackConfig, StackLayout,
    };
    pub use crate::manager::{LayoutCellsEvent, LayoutManager, SwimlaneManager};
    pub use crate::model::{CellId, Change, Geometry, Model, ModelListener, Style};
}

use crate::core::Direction;
use crate::layout::hierarchical::{HierarchicalLayout, LayoutResult};
use crate::model::{CellId, Model};

/// Lay out the children of `parent` hierarchically and write the result back
///
/// Uses the default spacing. The whole layout is one undoable edit.
///
/// # Example
/// ```rust
/// use stratum::prelude::*;
///
/// let mut model = Model::new();
/// let parent = model.default_parent();
/// let a = model.insert_vertex(parent, None, Rect::new(0.0, 0.0, 40.0, 40.0), Style::default()).unwrap();
/// let b = model.insert_vertex(parent, None, Rect::new(0.0, 0.0, 40.0, 40.0), Style::default()).unwrap();
/// model.insert_edge(parent, None, a, b, Style::default()).unwrap();
///
/// stratum::layout(&mut model, parent, Direction::LeftRight).unwrap();
/// assert!(model.geometry(b).unwrap().bounds.x > model.geometry(a).unwrap().bounds.x);
/// ```
pub fn layout(model: &mut Model, parent: CellId, direction: Direction) -> anyhow::Result<LayoutResult> {
    let layout = HierarchicalLayout::with_direction(direction);
    let result = layout.run(model, parent)?;
    layout.apply(model, parent, &result)?;
    Ok(result)
}
