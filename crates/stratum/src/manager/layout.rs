//! Automatic layout on commit
//!
//! A [`LayoutManager`] listens to the model. When a transaction commits it
//! works out which cells' layouts are affected by the changes and runs them
//! inside the same edit, so the user's change and the re-layout it caused
//! undo together.

use anyhow::Result;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, span, trace, warn, Level};

use super::lock;
use crate::core::{is_structural, EventBus, Point, Rect, SubscriptionId};
use crate::layout::{Layout, LayoutEvent, LayoutResolver};
use crate::model::{CellId, Change, ListenerId, Model, ModelListener};

/// Published once per commit that ran layouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutCellsEvent {
    /// Cells whose layouts were considered, in document order
    pub cells: Vec<CellId>,
}

struct State {
    resolver: Box<dyn LayoutResolver + Send>,
    enabled: bool,
    bubbling: bool,
    events: EventBus<LayoutCellsEvent>,
}

/// Runs layouts for the cells touched by each committed transaction
///
/// The manager is a cheap handle; clones share the same settings and
/// subscribers. [`LayoutManager::install`] registers a clone as a
/// [`ModelListener`] and returns the handle used to configure it afterwards.
#[derive(Clone)]
pub struct LayoutManager {
    state: Arc<Mutex<State>>,
}

impl LayoutManager {
    pub fn new(resolver: impl LayoutResolver + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                resolver: Box::new(resolver),
                enabled: true,
                bubbling: true,
                events: EventBus::new(),
            })),
        }
    }

    /// Create a manager and register it as a listener of `model`
    pub fn install(model: &mut Model, resolver: impl LayoutResolver + Send + 'static) -> Self {
        let manager = Self::new(resolver);
        manager.attach(model);
        manager
    }

    /// Register this manager (one more clone of it) as a listener of `model`
    pub fn attach(&self, model: &mut Model) -> ListenerId {
        model.add_listener(self.clone())
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    /// A disabled manager ignores commits entirely
    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.state).enabled = enabled;
    }

    pub fn is_bubbling(&self) -> bool {
        lock(&self.state).bubbling
    }

    /// With bubbling, a change also re-lays every ancestor that has a layout,
    /// not only the nearest one
    pub fn set_bubbling(&self, bubbling: bool) {
        lock(&self.state).bubbling = bubbling;
    }

    /// Replace the resolver deciding which layout governs which cell
    pub fn set_resolver(&self, resolver: impl LayoutResolver + Send + 'static) {
        lock(&self.state).resolver = Box::new(resolver);
    }

    /// Subscribe to [`LayoutCellsEvent`]s
    pub fn on_layout_cells(
        &self,
        callback: impl FnMut(&LayoutCellsEvent) + Send + 'static,
    ) -> SubscriptionId {
        lock(&self.state).events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.state).events.unsubscribe(id)
    }

    /// The layout governing the children of `cell` for `event`
    pub fn layout_for(
        &self,
        model: &Model,
        cell: CellId,
        event: LayoutEvent,
    ) -> Option<Arc<dyn Layout>> {
        lock(&self.state).resolver.layout_for(model, cell, event)
    }

    pub fn has_layout(&self, model: &Model, cell: CellId) -> bool {
        self.layout_for(model, cell, LayoutEvent::LayoutCells).is_some()
    }

    /// Cells whose layouts must run because of `changes`
    ///
    /// For every cell a change touches (for moves, the old and the new
    /// parent too) this collects the descendants that have a layout, stopping
    /// below the first cell without one. With bubbling on, every ancestor that
    /// has a layout is collected as well. A root
    /// replacement clears the result. The result is deduplicated; cells no
    /// longer in the tree and the root itself are left out.
    pub fn cells_for_changes(&self, model: &Model, changes: &[Change]) -> Vec<CellId> {
        let state = lock(&self.state);
        let resolver = state.resolver.as_ref();
        let has_layout =
            |cell: CellId| resolver.layout_for(model, cell, LayoutEvent::LayoutCells).is_some();

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut push = |cell: CellId, result: &mut Vec<CellId>| {
            if cell != model.root() && model.is_attached(cell) && seen.insert(cell) {
                result.push(cell);
            }
        };

        for change in changes {
            let touched: Vec<CellId> = match change {
                Change::RootChanged { .. } => {
                    trace!("Root replaced, nothing to lay out");
                    return Vec::new();
                }
                Change::ChildAdded { parent, child, .. }
                | Change::ChildRemoved { parent, child, .. } => vec![*child, *parent],
                other => vec![other.cell()],
            };

            for cell in touched {
                let mut current = if state.bubbling { model.parent(cell) } else { None };
                while let Some(ancestor) = current {
                    if has_layout(ancestor) {
                        push(ancestor, &mut result);
                    }
                    current = model.parent(ancestor);
                }

                let mut stack = vec![cell];
                while let Some(c) = stack.pop() {
                    if !has_layout(c) {
                        continue;
                    }
                    push(c, &mut result);
                    stack.extend(model.children(c).iter().rev().copied());
                }
            }
        }
        result
    }

    /// Run the layouts of `cells` in two passes inside one transaction
    ///
    /// The first pass ([`LayoutEvent::BeginUpdate`]) goes descendant to
    /// ancestor so inner layouts settle before the outer ones read their
    /// size. The second ([`LayoutEvent::EndUpdate`]) goes ancestor to
    /// descendant. A structural error skips that cell; any other error aborts.
    /// Publishes one [`LayoutCellsEvent`] when there was anything to do.
    pub fn execute_layout_for_cells(&self, model: &mut Model, cells: &[CellId]) -> Result<()> {
        let mut sorted: Vec<CellId> = cells
            .iter()
            .copied()
            .filter(|&c| model.is_attached(c))
            .collect();
        if sorted.is_empty() {
            return Ok(());
        }
        sorted.sort_by_cached_key(|&c| model.path(c));
        sorted.dedup();

        let layout_span = span!(Level::DEBUG, "execute_layout_for_cells", cells = sorted.len());
        let _enter = layout_span.enter();

        model.batch_update(|model| {
            for &cell in sorted.iter().rev() {
                self.execute_layout(model, cell, LayoutEvent::BeginUpdate)?;
            }
            for &cell in &sorted {
                self.execute_layout(model, cell, LayoutEvent::EndUpdate)?;
            }
            Ok(())
        })?;

        debug!(cells = sorted.len(), "Layouts executed");
        self.publish(&LayoutCellsEvent { cells: sorted });
        Ok(())
    }

    fn execute_layout(&self, model: &mut Model, cell: CellId, event: LayoutEvent) -> Result<()> {
        if cell == model.root() {
            return Ok(());
        }
        let Some(layout) = self.layout_for(model, cell, event) else {
            return Ok(());
        };
        trace!(cell = %cell, layout = layout.name(), event = %event, "Executing layout");
        match layout.execute(model, cell) {
            Err(err) if is_structural(&err) => {
                warn!(cell = %cell, layout = layout.name(), error = %err, "Skipping layout");
                Ok(())
            }
            other => other,
        }
    }

    /// Let the layouts of the parents react to `cells` being dragged to `to`
    pub fn cells_moved(&self, model: &mut Model, cells: &[CellId], to: Point) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        model.batch_update(|model| {
            for &cell in cells {
                let Some(parent) = model.parent(cell) else {
                    continue;
                };
                if let Some(layout) = self.layout_for(model, parent, LayoutEvent::MoveCells) {
                    layout.move_cell(model, cell, to.x, to.y)?;
                }
            }
            Ok(())
        })
    }

    /// Let the layouts of the parents react to `cells` being resized
    ///
    /// `bounds` and `previous` are matched to `cells` by position.
    pub fn cells_resized(
        &self,
        model: &mut Model,
        cells: &[CellId],
        bounds: &[Rect],
        previous: &[Option<Rect>],
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        model.batch_update(|model| {
            for (i, (&cell, &rect)) in cells.iter().zip(bounds).enumerate() {
                let Some(parent) = model.parent(cell) else {
                    continue;
                };
                if let Some(layout) = self.layout_for(model, parent, LayoutEvent::ResizeCells) {
                    let before = previous.get(i).copied().flatten();
                    layout.resize_cell(model, cell, rect, before)?;
                }
            }
            Ok(())
        })
    }

    fn publish(&self, event: &LayoutCellsEvent) {
        // Subscribers run without the lock held so they may use the manager
        let mut events = lock(&self.state).events.detach();
        events.publish(event);
        lock(&self.state).events.restore(events);
    }
}

impl ModelListener for LayoutManager {
    fn before_commit(&mut self, model: &mut Model, changes: &[Change]) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let cells = self.cells_for_changes(model, changes);
        if cells.is_empty() {
            return Ok(());
        }
        self.execute_layout_for_cells(model, &cells)
    }

    fn name(&self) -> &'static str {
        "layout_manager"
    }
}

impl fmt::Debug for LayoutManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("LayoutManager")
            .field("enabled", &state.enabled)
            .field("bubbling", &state.bubbling)
            .field("subscribers", &state.events.len())
            .finish()
    }
}
