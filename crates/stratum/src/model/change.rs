//! Atomic change records
//!
//! Every mutation of the model is expressed as one [`Change`]. A transaction
//! collects them in order into an [`Edit`]; listeners receive that list when
//! the outermost transaction closes, and undo replays the inverses.

use super::{CellId, Geometry, Style};

/// One atomic, reversible mutation of the model
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    RootChanged {
        previous: CellId,
        root: CellId,
    },
    ChildAdded {
        parent: CellId,
        child: CellId,
        index: usize,
    },
    ChildRemoved {
        parent: CellId,
        child: CellId,
        index: usize,
    },
    TerminalChanged {
        edge: CellId,
        source: bool,
        previous: Option<CellId>,
        terminal: Option<CellId>,
    },
    GeometryChanged {
        cell: CellId,
        previous: Option<Geometry>,
        geometry: Option<Geometry>,
    },
    VisibilityChanged {
        cell: CellId,
        visible: bool,
    },
    StyleChanged {
        cell: CellId,
        previous: Style,
        style: Style,
    },
    ValueChanged {
        cell: CellId,
        previous: Option<String>,
        value: Option<String>,
    },
    CollapsedChanged {
        cell: CellId,
        collapsed: bool,
    },
    ConnectableChanged {
        cell: CellId,
        connectable: bool,
    },
}

impl Change {
    /// The change that undoes this one
    pub fn inverse(&self) -> Change {
        match self.clone() {
            Change::RootChanged { previous, root } => Change::RootChanged {
                previous: root,
                root: previous,
            },
            Change::ChildAdded {
                parent,
                child,
                index,
            } => Change::ChildRemoved {
                parent,
                child,
                index,
            },
            Change::ChildRemoved {
                parent,
                child,
                index,
            } => Change::ChildAdded {
                parent,
                child,
                index,
            },
            Change::TerminalChanged {
                edge,
                source,
                previous,
                terminal,
            } => Change::TerminalChanged {
                edge,
                source,
                previous: terminal,
                terminal: previous,
            },
            Change::GeometryChanged {
                cell,
                previous,
                geometry,
            } => Change::GeometryChanged {
                cell,
                previous: geometry,
                geometry: previous,
            },
            Change::VisibilityChanged { cell, visible } => Change::VisibilityChanged {
                cell,
                visible: !visible,
            },
            Change::StyleChanged {
                cell,
                previous,
                style,
            } => Change::StyleChanged {
                cell,
                previous: style,
                style: previous,
            },
            Change::ValueChanged {
                cell,
                previous,
                value,
            } => Change::ValueChanged {
                cell,
                previous: value,
                value: previous,
            },
            Change::CollapsedChanged { cell, collapsed } => Change::CollapsedChanged {
                cell,
                collapsed: !collapsed,
            },
            Change::ConnectableChanged { cell, connectable } => Change::ConnectableChanged {
                cell,
                connectable: !connectable,
            },
        }
    }

    /// The cell this change is about (the child for structural changes)
    pub fn cell(&self) -> CellId {
        match self {
            Change::RootChanged { root, .. } => *root,
            Change::ChildAdded { child, .. } | Change::ChildRemoved { child, .. } => *child,
            Change::TerminalChanged { edge, .. } => *edge,
            Change::GeometryChanged { cell, .. }
            | Change::VisibilityChanged { cell, .. }
            | Change::StyleChanged { cell, .. }
            | Change::ValueChanged { cell, .. }
            | Change::CollapsedChanged { cell, .. }
            | Change::ConnectableChanged { cell, .. } => *cell,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Change::RootChanged { .. } => "root",
            Change::ChildAdded { .. } => "child_added",
            Change::ChildRemoved { .. } => "child_removed",
            Change::TerminalChanged { .. } => "terminal",
            Change::GeometryChanged { .. } => "geometry",
            Change::VisibilityChanged { .. } => "visibility",
            Change::StyleChanged { .. } => "style",
            Change::ValueChanged { .. } => "value",
            Change::CollapsedChanged { .. } => "collapsed",
            Change::ConnectableChanged { .. } => "connectable",
        }
    }
}

/// The ordered changes of one committed transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edit {
    changes: Vec<Change>,
}

impl Edit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}
