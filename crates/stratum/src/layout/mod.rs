//! Layout algorithms and how they are looked up
//!
//! A [`Layout`] arranges the children of one cell by writing geometry back
//! through the [`Model`]. Which layout governs which cell is decided by a
//! [`LayoutResolver`]; the stock [`LayoutRegistry`] maps style names to shared
//! layout instances.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use stratum::layout::{HierarchicalLayout, LayoutEvent, LayoutRegistry, LayoutResolver};
//! use stratum::model::{Model, Style};
//! use stratum::core::Rect;
//!
//! let mut model = Model::new();
//! let parent = model.default_parent();
//! let pool = model
//!     .insert_vertex(parent, Some("pool"), Rect::new(0.0, 0.0, 400.0, 300.0),
//!         Style::default().with_role("pool"))
//!     .unwrap();
//!
//! let mut registry = LayoutRegistry::new();
//! registry.register("pool", Arc::new(HierarchicalLayout::new()));
//! assert!(registry.layout_for(&model, pool, LayoutEvent::LayoutCells).is_some());
//! assert!(registry.layout_for(&model, parent, LayoutEvent::LayoutCells).is_none());
//! ```

pub mod hierarchical;
pub mod stack;

pub use hierarchical::{HierarchicalConfig, HierarchicalLayout};
pub use stack::{StackConfig, StackLayout};

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::Rect;
use crate::model::{CellId, Model};

/// Core trait for layout algorithms
///
/// `execute` arranges the children of `parent`. Implementations must only
/// write through [`Model`] setters so every change is recorded in the open
/// transaction. Returning [`DiagramError::Structural`](crate::core::DiagramError)
/// tells the layout manager to skip this cell and keep going.
pub trait Layout: Send + Sync {
    /// Arrange the children of `parent`
    fn execute(&self, model: &mut Model, parent: CellId) -> Result<()>;

    /// React to `cell` being dragged to `(x, y)` inside the parent this
    /// layout governs
    fn move_cell(&self, _model: &mut Model, _cell: CellId, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    /// React to `cell` being resized interactively
    fn resize_cell(
        &self,
        _model: &mut Model,
        _cell: CellId,
        _bounds: Rect,
        _previous: Option<Rect>,
    ) -> Result<()> {
        Ok(())
    }

    /// Get the name of this layout algorithm
    fn name(&self) -> &'static str;
}

/// Why a layout is being looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutEvent {
    /// Plain "does this cell have a layout" query
    LayoutCells,
    /// First (bubbling) pass of the layout manager
    BeginUpdate,
    /// Second pass of the layout manager
    EndUpdate,
    /// Cells were dragged inside the parent
    MoveCells,
    /// Cells were resized inside the parent
    ResizeCells,
}

impl fmt::Display for LayoutEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutEvent::LayoutCells => "layoutCells",
            LayoutEvent::BeginUpdate => "beginUpdate",
            LayoutEvent::EndUpdate => "endUpdate",
            LayoutEvent::MoveCells => "moveCells",
            LayoutEvent::ResizeCells => "resizeCells",
        };
        write!(f, "{}", name)
    }
}

/// Decides which layout (if any) arranges the children of a cell
///
/// `None` means the cell has no layout for this event; it is never an error.
pub trait LayoutResolver {
    fn layout_for(&self, model: &Model, cell: CellId, event: LayoutEvent)
        -> Option<Arc<dyn Layout>>;
}

impl<F> LayoutResolver for F
where
    F: Fn(&Model, CellId, LayoutEvent) -> Option<Arc<dyn Layout>>,
{
    fn layout_for(
        &self,
        model: &Model,
        cell: CellId,
        event: LayoutEvent,
    ) -> Option<Arc<dyn Layout>> {
        self(model, cell, event)
    }
}

/// Events a layout answers when registered without an explicit list
///
/// Everything but [`LayoutEvent::EndUpdate`]: a registered layout runs once
/// per batch, in the descendant-first pass. Use
/// [`LayoutRegistry::register_for`] to also take part in the ancestor-first
/// pass.
pub const DEFAULT_EVENTS: [LayoutEvent; 4] = [
    LayoutEvent::LayoutCells,
    LayoutEvent::BeginUpdate,
    LayoutEvent::MoveCells,
    LayoutEvent::ResizeCells,
];

#[derive(Clone)]
struct Registration {
    layout: Arc<dyn Layout>,
    events: Vec<LayoutEvent>,
}

impl Registration {
    fn answer(&self, event: LayoutEvent) -> Option<Arc<dyn Layout>> {
        self.events
            .contains(&event)
            .then(|| Arc::clone(&self.layout))
    }
}

/// Style-driven layout lookup
///
/// A cell's layout is found by its `Style::layout` name first, then by its
/// `Style::role`. Specific cells can be pinned to a layout regardless of
/// style.
#[derive(Default, Clone)]
pub struct LayoutRegistry {
    by_name: HashMap<String, Registration>,
    by_cell: HashMap<CellId, Registration>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layout under a style name or role for [`DEFAULT_EVENTS`]
    pub fn register(&mut self, name: impl Into<String>, layout: Arc<dyn Layout>) {
        self.register_for(name, layout, &DEFAULT_EVENTS);
    }

    /// Register a layout under a style name or role for the given events
    pub fn register_for(
        &mut self,
        name: impl Into<String>,
        layout: Arc<dyn Layout>,
        events: &[LayoutEvent],
    ) {
        let events = events.to_vec();
        self.by_name
            .insert(name.into(), Registration { layout, events });
    }

    /// Pin `layout` to one cell for [`DEFAULT_EVENTS`]
    pub fn assign(&mut self, cell: CellId, layout: Arc<dyn Layout>) {
        let events = DEFAULT_EVENTS.to_vec();
        self.by_cell.insert(cell, Registration { layout, events });
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Layout>> {
        self.by_name.remove(name).map(|r| r.layout)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Layout>> {
        self.by_name.get(name).map(|r| Arc::clone(&r.layout))
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len() + self.by_cell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.by_cell.is_empty()
    }
}

impl LayoutResolver for LayoutRegistry {
    fn layout_for(
        &self,
        model: &Model,
        cell: CellId,
        event: LayoutEvent,
    ) -> Option<Arc<dyn Layout>> {
        if let Some(registration) = self.by_cell.get(&cell) {
            return registration.answer(event);
        }
        let style = model.style(cell)?;
        style
            .layout
            .as_deref()
            .and_then(|name| self.by_name.get(name))
            .or_else(|| style.role.as_deref().and_then(|role| self.by_name.get(role)))
            .and_then(|registration| registration.answer(event))
    }
}

impl fmt::Debug for LayoutRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutRegistry")
            .field("names", &self.names())
            .field("cells", &self.by_cell.len())
            .finish()
    }
}
