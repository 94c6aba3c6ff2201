//! Transactional cell model
//!
//! The [`Model`] owns the cell tree and is the only place it changes. Every
//! setter records a [`Change`]; changes are grouped by transactions opened
//! with [`Model::begin_update`] and closed with [`Model::end_update`]. The
//! transaction primitive is a plain depth counter: nested opens only move the
//! counter, and listeners are notified exactly once, when the outermost
//! transaction closes with a non-empty edit.
//!
//! While listeners run the model is *ending*: anything they change (they may
//! open and close their own nested transactions) lands in the same edit, so
//! the user's change and every layout it caused undo as one step. A listener
//! error rolls the whole edit back.

mod cell;
mod change;
mod history;

pub use cell::*;
pub use change::*;
pub use history::*;

use anyhow::Result;
use tracing::{debug, trace, warn};

use crate::core::{DiagramError, Rect};

/// Receives the change list of every committed transaction
///
/// Listeners are called in registration order, each with the changes
/// accumulated so far (including those made by earlier listeners of the same
/// commit). Returning an error rolls back the whole transaction.
pub trait ModelListener {
    fn before_commit(&mut self, model: &mut Model, changes: &[Change]) -> Result<()>;

    /// Name used in logs
    fn name(&self) -> &'static str {
        "listener"
    }
}

/// Handle returned by [`Model::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The document tree plus its transaction state
pub struct Model {
    cells: Vec<Cell>,
    root: CellId,
    update_level: usize,
    ending: bool,
    current_edit: Edit,
    history: History,
    listeners: Vec<(ListenerId, Box<dyn ModelListener>)>,
    next_listener: u64,
}

impl Model {
    /// Create a model holding a root and one default layer
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Like [`Model::new`], keeping at most `limit` edits for undo
    ///
    /// A limit of zero disables the history.
    pub fn with_history_limit(limit: usize) -> Self {
        let mut model = Self {
            cells: Vec::new(),
            root: CellId(0),
            update_level: 0,
            ending: false,
            current_edit: Edit::new(),
            history: History::new(limit),
            listeners: Vec::new(),
            next_listener: 0,
        };
        let root = model.create_cell(CellKind::Root);
        let layer = model.create_cell(CellKind::Layer);
        model.cells[layer.0].parent = Some(root);
        model.cells[root.0].children.push(layer);
        model.root = root;
        model
    }

    // ---------------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------------

    pub fn add_listener(&mut self, listener: impl ModelListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn ModelListener>> {
        let index = self.listeners.iter().position(|(l, _)| *l == id)?;
        Some(self.listeners.remove(index).1)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ---------------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------------

    /// Open a (possibly nested) transaction
    pub fn begin_update(&mut self) {
        self.update_level += 1;
    }

    /// Close a transaction; the outermost close notifies the listeners
    ///
    /// Fails with [`DiagramError::UnbalancedTransaction`] when no transaction
    /// is open, and with the listener's error (after rolling back the edit)
    /// when a listener fails.
    pub fn end_update(&mut self) -> Result<()> {
        if self.update_level == 0 {
            return Err(DiagramError::UnbalancedTransaction.into());
        }
        self.update_level -= 1;
        if self.update_level > 0 || self.ending {
            return Ok(());
        }
        if self.current_edit.is_empty() {
            return Ok(());
        }

        self.ending = true;
        let result = self.notify_listeners();
        self.ending = false;

        if result.is_ok() && self.update_level != 0 {
            warn!(
                update_level = self.update_level,
                "Listener left a transaction open"
            );
            self.update_level = 0;
            self.rollback();
            return Err(DiagramError::UnbalancedTransaction.into());
        }

        match result {
            Ok(()) => {
                let edit = std::mem::take(&mut self.current_edit);
                debug!(changes = edit.len(), "Transaction committed");
                self.history.record(edit);
                Ok(())
            }
            Err(err) => {
                self.update_level = 0;
                self.rollback();
                Err(err)
            }
        }
    }

    /// Run `f` inside a transaction
    ///
    /// If `f` fails in the outermost transaction the partial edit is rolled
    /// back without notifying anyone; nested failures just propagate to the
    /// enclosing boundary.
    pub fn batch_update<T>(&mut self, f: impl FnOnce(&mut Model) -> Result<T>) -> Result<T> {
        self.begin_update();
        match f(self) {
            Ok(value) => {
                self.end_update()?;
                Ok(value)
            }
            Err(err) => {
                self.abort_update();
                Err(err)
            }
        }
    }

    fn abort_update(&mut self) {
        self.update_level = self.update_level.saturating_sub(1);
        if self.update_level == 0 && !self.ending {
            self.rollback();
        }
    }

    /// Current nesting depth of open transactions
    pub fn update_level(&self) -> usize {
        self.update_level
    }

    /// True while listeners of a commit are running
    pub fn is_ending(&self) -> bool {
        self.ending
    }

    /// Changes recorded so far in the open transaction
    pub fn pending_changes(&self) -> &[Change] {
        self.current_edit.changes()
    }

    fn notify_listeners(&mut self) -> Result<()> {
        let mut listeners = std::mem::take(&mut self.listeners);
        let mut result = Ok(());
        for (_, listener) in listeners.iter_mut() {
            let changes = self.current_edit.changes().to_vec();
            trace!(listener = listener.name(), changes = changes.len(), "Notifying listener");
            if let Err(err) = listener.before_commit(self, &changes) {
                warn!(listener = listener.name(), error = %err, "Listener failed, rolling back");
                result = Err(err);
                break;
            }
        }
        // Listeners registered during notification go after the existing ones
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
        result
    }

    fn rollback(&mut self) {
        let edit = std::mem::take(&mut self.current_edit);
        debug!(changes = edit.len(), "Rolling back transaction");
        for change in edit.changes().iter().rev() {
            self.apply(&change.inverse());
        }
    }

    fn execute(&mut self, change: Change) -> Result<()> {
        self.begin_update();
        trace!(kind = change.kind(), cell = %change.cell(), "Executing change");
        self.apply(&change);
        self.current_edit.push(change);
        self.end_update()
    }

    // ---------------------------------------------------------------------
    // Undo history
    // ---------------------------------------------------------------------

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Revert the last committed edit. Listeners are not notified.
    pub fn undo(&mut self) -> bool {
        if self.update_level > 0 {
            return false;
        }
        let Some(edit) = self.history.pop_undo() else {
            return false;
        };
        for change in edit.changes().iter().rev() {
            self.apply(&change.inverse());
        }
        self.history.push_redo(edit);
        true
    }

    /// Re-apply the last undone edit. Listeners are not notified.
    pub fn redo(&mut self) -> bool {
        if self.update_level > 0 {
            return false;
        }
        let Some(edit) = self.history.pop_redo() else {
            return false;
        };
        for change in edit.changes() {
            self.apply(change);
        }
        self.history.push_undo(edit);
        true
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn root(&self) -> CellId {
        self.root
    }

    /// The first layer; where new top-level content goes by default
    pub fn default_parent(&self) -> CellId {
        self.children(self.root).first().copied().unwrap_or(self.root)
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0)
    }

    fn require(&self, id: CellId) -> Result<&Cell> {
        self.cells
            .get(id.0)
            .ok_or_else(|| DiagramError::UnknownCell { id }.into())
    }

    /// Number of cells ever created, attached or not
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn parent(&self, id: CellId) -> Option<CellId> {
        self.cell(id).and_then(|c| c.parent)
    }

    pub fn children(&self, id: CellId) -> &[CellId] {
        self.cell(id).map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_index(&self, parent: CellId, child: CellId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    pub fn kind(&self, id: CellId) -> Option<CellKind> {
        self.cell(id).map(|c| c.kind)
    }

    pub fn is_vertex(&self, id: CellId) -> bool {
        self.kind(id) == Some(CellKind::Vertex)
    }

    pub fn is_edge(&self, id: CellId) -> bool {
        self.kind(id) == Some(CellKind::Edge)
    }

    pub fn geometry(&self, id: CellId) -> Option<&Geometry> {
        self.cell(id).and_then(|c| c.geometry.as_ref())
    }

    pub fn style(&self, id: CellId) -> Option<&Style> {
        self.cell(id).map(|c| &c.style)
    }

    pub fn value(&self, id: CellId) -> Option<&str> {
        self.cell(id).and_then(|c| c.value.as_deref())
    }

    pub fn is_visible(&self, id: CellId) -> bool {
        self.cell(id).is_some_and(|c| c.visible)
    }

    pub fn is_collapsed(&self, id: CellId) -> bool {
        self.cell(id).is_some_and(|c| c.collapsed)
    }

    pub fn is_lane(&self, id: CellId) -> bool {
        self.cell(id).is_some_and(|c| c.style.lane)
    }

    /// The source (`true`) or target (`false`) terminal of an edge
    pub fn terminal(&self, edge: CellId, source: bool) -> Option<CellId> {
        self.cell(edge).and_then(|c| c.terminal(source))
    }

    /// Edges attached to the tree that name `id` as a terminal
    pub fn connected_edges(&self, id: CellId) -> Vec<CellId> {
        self.cell(id)
            .map(|c| {
                c.edges
                    .iter()
                    .copied()
                    .filter(|&e| self.is_attached(e))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if `ancestor` is `cell` or one of its ancestors
    pub fn is_ancestor(&self, ancestor: CellId, cell: CellId) -> bool {
        let mut current = Some(cell);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// True if `cell` is reachable from the root
    pub fn is_attached(&self, cell: CellId) -> bool {
        self.is_ancestor(self.root, cell)
    }

    /// Number of ancestors of `cell` (the root has depth 0)
    pub fn depth(&self, cell: CellId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(cell);
        while let Some(c) = current {
            depth += 1;
            current = self.parent(c);
        }
        depth
    }

    /// Child indices leading from the top ancestor to `cell`
    ///
    /// Comparing paths lexicographically orders cells in document order with
    /// every ancestor before its descendants.
    pub fn path(&self, cell: CellId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = cell;
        while let Some(parent) = self.parent(current) {
            path.push(self.child_index(parent, current).unwrap_or(0));
            current = parent;
        }
        path.reverse();
        path
    }

    /// Every cell below `cell`, depth first, not including `cell`
    pub fn descendants(&self, cell: CellId) -> Vec<CellId> {
        let mut result = Vec::new();
        let mut stack: Vec<CellId> = self.children(cell).iter().rev().copied().collect();
        while let Some(c) = stack.pop() {
            result.push(c);
            stack.extend(self.children(c).iter().rev().copied());
        }
        result
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    fn create_cell(&mut self, kind: CellKind) -> CellId {
        let id = CellId(self.cells.len());
        self.cells.push(Cell::new(id, kind));
        id
    }

    /// Create and attach a vertex under `parent`
    pub fn insert_vertex(
        &mut self,
        parent: CellId,
        value: Option<&str>,
        bounds: Rect,
        style: Style,
    ) -> Result<CellId> {
        self.require(parent)?;
        let id = self.create_cell(CellKind::Vertex);
        {
            let cell = &mut self.cells[id.0];
            cell.value = value.map(str::to_string);
            cell.geometry = Some(Geometry::new(bounds.x, bounds.y, bounds.width, bounds.height));
            cell.style = style;
        }
        let index = self.children(parent).len();
        self.add(parent, id, index)?;
        Ok(id)
    }

    /// Create and attach an edge under `parent` connecting `source` to `target`
    pub fn insert_edge(
        &mut self,
        parent: CellId,
        value: Option<&str>,
        source: CellId,
        target: CellId,
        style: Style,
    ) -> Result<CellId> {
        self.require(parent)?;
        self.require(source)?;
        self.require(target)?;
        let id = self.create_cell(CellKind::Edge);
        {
            let cell = &mut self.cells[id.0];
            cell.value = value.map(str::to_string);
            cell.geometry = Some(Geometry::edge());
            cell.style = style;
        }
        self.batch_update(|model| {
            let index = model.children(parent).len();
            model.add(parent, id, index)?;
            model.set_terminal(id, source, true)?;
            model.set_terminal(id, target, false)
        })?;
        Ok(id)
    }

    /// Attach (or move) `child` under `parent` at `index`
    pub fn add(&mut self, parent: CellId, child: CellId, index: usize) -> Result<()> {
        let parent_cell = self.require(parent)?;
        if parent_cell.kind == CellKind::Edge {
            return Err(DiagramError::invalid_hierarchy(format!(
                "edge {} cannot contain {}",
                parent, child
            ))
            .into());
        }
        let child_kind = self.require(child)?.kind;
        if child_kind == CellKind::Root || child == self.root {
            return Err(DiagramError::invalid_hierarchy("the root cannot be a child").into());
        }
        if self.is_ancestor(child, parent) {
            return Err(DiagramError::invalid_hierarchy(format!(
                "{} cannot be moved into its own descendant {}",
                child, parent
            ))
            .into());
        }

        self.batch_update(|model| {
            let mut index = index;
            if let Some(previous) = model.parent(child) {
                let previous_index = model.child_index(previous, child).unwrap_or(0);
                if previous == parent && previous_index < index {
                    index -= 1;
                }
                model.execute(Change::ChildRemoved {
                    parent: previous,
                    child,
                    index: previous_index,
                })?;
            }
            let index = index.min(model.children(parent).len());
            model.execute(Change::ChildAdded {
                parent,
                child,
                index,
            })
        })
    }

    /// Detach cells from the tree
    ///
    /// With `include_edges` the attached edges connected to the removed
    /// subtrees are removed as well; otherwise they are disconnected from the
    /// removed terminals. Either way no attached edge is left pointing at a
    /// detached cell.
    pub fn remove_cells(&mut self, cells: &[CellId], include_edges: bool) -> Result<()> {
        for &cell in cells {
            self.require(cell)?;
            if cell == self.root {
                return Err(DiagramError::invalid_hierarchy("the root cannot be removed").into());
            }
        }

        self.batch_update(|model| {
            for &cell in cells {
                if !model.is_attached(cell) {
                    continue;
                }
                let mut subtree = vec![cell];
                subtree.extend(model.descendants(cell));

                let mut dangling = Vec::new();
                for &member in &subtree {
                    for edge in model.connected_edges(member) {
                        if !model.is_ancestor(cell, edge) && !dangling.contains(&edge) {
                            dangling.push(edge);
                        }
                    }
                }

                for edge in dangling {
                    if include_edges {
                        model.remove_cells(&[edge], true)?;
                    } else {
                        for source in [true, false] {
                            if model.terminal(edge, source).is_some_and(|t| subtree.contains(&t)) {
                                model.set_terminal_unchecked(edge, None, source)?;
                            }
                        }
                    }
                }

                if let Some(parent) = model.parent(cell) {
                    let index = model.child_index(parent, cell).unwrap_or(0);
                    model.execute(Change::ChildRemoved {
                        parent,
                        child: cell,
                        index,
                    })?;
                }
            }
            Ok(())
        })
    }

    /// Connect one end of `edge` to `terminal`
    pub fn set_terminal(&mut self, edge: CellId, terminal: CellId, source: bool) -> Result<()> {
        if !self.is_edge(edge) {
            return Err(DiagramError::invalid_hierarchy(format!("{} is not an edge", edge)).into());
        }
        if !self.require(terminal)?.connectable {
            return Err(DiagramError::invalid_hierarchy(format!(
                "{} cannot be a terminal",
                terminal
            ))
            .into());
        }
        if self.is_attached(edge) && !self.is_attached(terminal) {
            return Err(DiagramError::invalid_hierarchy(format!(
                "terminal {} of {} is not in the model",
                terminal, edge
            ))
            .into());
        }
        self.set_terminal_unchecked(edge, Some(terminal), source)
    }

    /// Disconnect one end of `edge`
    pub fn clear_terminal(&mut self, edge: CellId, source: bool) -> Result<()> {
        self.require(edge)?;
        self.set_terminal_unchecked(edge, None, source)
    }

    fn set_terminal_unchecked(
        &mut self,
        edge: CellId,
        terminal: Option<CellId>,
        source: bool,
    ) -> Result<()> {
        let previous = self.terminal(edge, source);
        if previous == terminal {
            return Ok(());
        }
        self.execute(Change::TerminalChanged {
            edge,
            source,
            previous,
            terminal,
        })
    }

    /// Replace the geometry of `cell`; a no-op when it is unchanged
    pub fn set_geometry(&mut self, cell: CellId, geometry: Geometry) -> Result<()> {
        let previous = self.require(cell)?.geometry.clone();
        if previous.as_ref() == Some(&geometry) {
            return Ok(());
        }
        self.execute(Change::GeometryChanged {
            cell,
            previous,
            geometry: Some(geometry),
        })
    }

    pub fn set_style(&mut self, cell: CellId, style: Style) -> Result<()> {
        let previous = self.require(cell)?.style.clone();
        if previous == style {
            return Ok(());
        }
        self.execute(Change::StyleChanged {
            cell,
            previous,
            style,
        })
    }

    pub fn set_value(&mut self, cell: CellId, value: Option<&str>) -> Result<()> {
        let previous = self.require(cell)?.value.clone();
        let value = value.map(str::to_string);
        if previous == value {
            return Ok(());
        }
        self.execute(Change::ValueChanged {
            cell,
            previous,
            value,
        })
    }

    pub fn set_visible(&mut self, cell: CellId, visible: bool) -> Result<()> {
        if self.require(cell)?.visible == visible {
            return Ok(());
        }
        self.execute(Change::VisibilityChanged { cell, visible })
    }

    pub fn set_collapsed(&mut self, cell: CellId, collapsed: bool) -> Result<()> {
        if self.require(cell)?.collapsed == collapsed {
            return Ok(());
        }
        self.execute(Change::CollapsedChanged { cell, collapsed })
    }

    /// Allow or forbid `cell` as an edge terminal; existing connections stay
    pub fn set_connectable(&mut self, cell: CellId, connectable: bool) -> Result<()> {
        let kind = self.require(cell)?.kind;
        if connectable && kind != CellKind::Vertex {
            return Err(DiagramError::invalid_hierarchy(format!(
                "{} cannot be a terminal",
                cell
            ))
            .into());
        }
        if self.cells[cell.0].connectable == connectable {
            return Ok(());
        }
        self.execute(Change::ConnectableChanged { cell, connectable })
    }

    /// Replace the whole tree with a fresh root holding one empty layer
    pub fn clear(&mut self) -> Result<()> {
        let root = self.create_cell(CellKind::Root);
        let layer = self.create_cell(CellKind::Layer);
        self.cells[layer.0].parent = Some(root);
        self.cells[root.0].children.push(layer);
        let previous = self.root;
        self.execute(Change::RootChanged { previous, root })
    }

    fn apply(&mut self, change: &Change) {
        match change {
            Change::RootChanged { root, .. } => {
                self.root = *root;
            }
            Change::ChildAdded {
                parent,
                child,
                index,
            } => {
                let children = &mut self.cells[parent.0].children;
                let index = (*index).min(children.len());
                children.insert(index, *child);
                self.cells[child.0].parent = Some(*parent);
            }
            Change::ChildRemoved { parent, child, .. } => {
                self.cells[parent.0].children.retain(|c| c != child);
                self.cells[child.0].parent = None;
            }
            Change::TerminalChanged {
                edge,
                source,
                previous,
                terminal,
            } => {
                let other = self.terminal(*edge, !*source);
                if let Some(previous) = previous {
                    if other != Some(*previous) {
                        self.cells[previous.0].edges.retain(|e| e != edge);
                    }
                }
                if let Some(terminal) = terminal {
                    let edges = &mut self.cells[terminal.0].edges;
                    if !edges.contains(edge) {
                        edges.push(*edge);
                    }
                }
                let cell = &mut self.cells[edge.0];
                if *source {
                    cell.source = *terminal;
                } else {
                    cell.target = *terminal;
                }
            }
            Change::GeometryChanged { cell, geometry, .. } => {
                self.cells[cell.0].geometry = geometry.clone();
            }
            Change::VisibilityChanged { cell, visible } => {
                self.cells[cell.0].visible = *visible;
            }
            Change::StyleChanged { cell, style, .. } => {
                self.cells[cell.0].style = style.clone();
            }
            Change::ValueChanged { cell, value, .. } => {
                self.cells[cell.0].value = value.clone();
            }
            Change::CollapsedChanged { cell, collapsed } => {
                self.cells[cell.0].collapsed = *collapsed;
            }
            Change::ConnectableChanged { cell, connectable } => {
                self.cells[cell.0].connectable = *connectable;
            }
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("cells", &self.cells.len())
            .field("root", &self.root)
            .field("update_level", &self.update_level)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
