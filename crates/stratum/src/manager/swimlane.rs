//! Keeps sibling swimlanes the same size
//!
//! Lanes sharing a parent are laid side by side (horizontal parent) or one
//! above the other (vertical parent), so they must agree on one dimension:
//! the height under a horizontal parent, the width under a vertical one. Lanes
//! without a lane parent use the manager's own orientation.

use anyhow::Result;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, span, trace, Level};

use super::lock;
use crate::model::{CellId, Change, ListenerId, Model, ModelListener};

#[derive(Debug, Clone, Copy)]
struct Settings {
    enabled: bool,
    horizontal: bool,
    add_enabled: bool,
    resize_enabled: bool,
    bubbling: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            horizontal: true,
            add_enabled: true,
            resize_enabled: true,
            bubbling: true,
        }
    }
}

/// Sizes new lanes like their siblings and carries lane resizes to the
/// siblings and the enclosing lanes
///
/// Like [`LayoutManager`](super::LayoutManager) this is a shared handle. Install
/// it before the layout manager so the layouts see the adjusted lane sizes.
#[derive(Clone, Default)]
pub struct SwimlaneManager {
    settings: Arc<Mutex<Settings>>,
}

impl SwimlaneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager and register it as a listener of `model`
    pub fn install(model: &mut Model) -> Self {
        let manager = Self::new();
        manager.attach(model);
        manager
    }

    pub fn attach(&self, model: &mut Model) -> ListenerId {
        model.add_listener(self.clone())
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.settings).enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.settings).enabled = enabled;
    }

    /// Orientation assumed for lanes that have no lane parent
    pub fn is_horizontal(&self) -> bool {
        lock(&self.settings).horizontal
    }

    pub fn set_horizontal(&self, horizontal: bool) {
        lock(&self.settings).horizontal = horizontal;
    }

    pub fn is_add_enabled(&self) -> bool {
        lock(&self.settings).add_enabled
    }

    /// Whether newly added lanes take the size of their siblings
    pub fn set_add_enabled(&self, enabled: bool) {
        lock(&self.settings).add_enabled = enabled;
    }

    pub fn is_resize_enabled(&self) -> bool {
        lock(&self.settings).resize_enabled
    }

    /// Whether resizing a lane resizes its siblings
    pub fn set_resize_enabled(&self, enabled: bool) {
        lock(&self.settings).resize_enabled = enabled;
    }

    pub fn is_bubbling(&self) -> bool {
        lock(&self.settings).bubbling
    }

    /// Whether a lane resize also grows or shrinks the enclosing lanes
    pub fn set_bubbling(&self, bubbling: bool) {
        lock(&self.settings).bubbling = bubbling;
    }

    /// Size `lane` like the first other lane among its siblings
    pub fn lane_added(&self, model: &mut Model, lane: CellId) -> Result<()> {
        let settings = *lock(&self.settings);
        let Some(parent) = model.parent(lane) else {
            return Ok(());
        };
        let reference = model
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| c != lane && model.is_lane(c))
            .find_map(|c| model.geometry(c).map(|g| g.bounds));
        let Some(reference) = reference else {
            trace!(lane = %lane, "No sibling lane to copy the size from");
            return Ok(());
        };

        let parent_horizontal = orientation(model, parent, settings.horizontal);
        debug!(
            lane = %lane,
            width = reference.width,
            height = reference.height,
            "Sizing added lane like its sibling"
        );
        let mut visited = HashSet::new();
        resize_lane(
            model,
            lane,
            reference.width,
            reference.height,
            parent_horizontal,
            settings.horizontal,
            &mut visited,
        )
    }

    /// Carry the size of `lane` to its siblings and, when bubbling, up to the
    /// topmost enclosing lane
    pub fn lane_resized(&self, model: &mut Model, lane: CellId) -> Result<()> {
        let settings = *lock(&self.settings);
        let mut visited = HashSet::new();
        self.resize_from(model, lane, settings, &mut visited)
    }

    fn resize_from(
        &self,
        model: &mut Model,
        lane: CellId,
        settings: Settings,
        visited: &mut HashSet<CellId>,
    ) -> Result<()> {
        let Some(bounds) = model.geometry(lane).map(|g| g.bounds) else {
            return Ok(());
        };
        let (mut width, mut height) = (bounds.width, bounds.height);

        if !settings.bubbling {
            let Some(parent) = model.parent(lane) else {
                return Ok(());
            };
            let parent_horizontal = orientation(model, parent, settings.horizontal);
            let siblings: Vec<CellId> = model.children(parent).to_vec();
            for sibling in siblings {
                if model.is_lane(sibling) {
                    resize_lane(
                        model,
                        sibling,
                        width,
                        height,
                        parent_horizontal,
                        settings.horizontal,
                        visited,
                    )?;
                }
            }
            return Ok(());
        }

        let mut top = lane;
        while let Some(parent) = model.parent(top).filter(|&p| model.is_lane(p)) {
            let (header_w, header_h) = header(model, parent);
            width += header_w;
            height += header_h;
            top = parent;
        }

        let parent_horizontal = match model.parent(top) {
            Some(parent) => orientation(model, parent, settings.horizontal),
            None => settings.horizontal,
        };
        trace!(lane = %lane, top = %top, width, height, "Propagating lane size");
        resize_lane(
            model,
            top,
            width,
            height,
            parent_horizontal,
            settings.horizontal,
            visited,
        )
    }
}

/// Orientation of `cell` as a lane container
fn orientation(model: &Model, cell: CellId, default: bool) -> bool {
    if model.is_lane(cell) {
        model.style(cell).map_or(default, |s| s.horizontal)
    } else {
        default
    }
}

fn header(model: &Model, cell: CellId) -> (f64, f64) {
    model.style(cell).map_or((0.0, 0.0), |s| s.start_size())
}

/// Set the shared dimension of `lane` and recurse into its child lanes
///
/// `width`/`height` is the outer size of `lane`; children get it minus the
/// lane's header. Each lane is written at most once per call chain.
fn resize_lane(
    model: &mut Model,
    lane: CellId,
    width: f64,
    height: f64,
    parent_horizontal: bool,
    default: bool,
    visited: &mut HashSet<CellId>,
) -> Result<()> {
    if !visited.insert(lane) {
        return Ok(());
    }

    if let Some(mut geometry) = model.geometry(lane).cloned() {
        let changed = if parent_horizontal {
            geometry.bounds.height != height
        } else {
            geometry.bounds.width != width
        };
        if changed {
            if parent_horizontal {
                geometry.bounds.height = height;
            } else {
                geometry.bounds.width = width;
            }
            trace!(
                lane = %lane,
                width = geometry.bounds.width,
                height = geometry.bounds.height,
                "Resized lane"
            );
            model.set_geometry(lane, geometry)?;
        }
    }

    let (header_w, header_h) = header(model, lane);
    let horizontal = orientation(model, lane, default);
    let children: Vec<CellId> = model.children(lane).to_vec();
    for child in children {
        if model.is_lane(child) {
            resize_lane(
                model,
                child,
                width - header_w,
                height - header_h,
                horizontal,
                default,
                visited,
            )?;
        }
    }
    Ok(())
}

fn size_changed(change: &Change) -> bool {
    match change {
        Change::GeometryChanged {
            previous: Some(previous),
            geometry: Some(geometry),
            ..
        } => previous.width() != geometry.width() || previous.height() != geometry.height(),
        Change::GeometryChanged { .. } => true,
        _ => false,
    }
}

impl ModelListener for SwimlaneManager {
    fn before_commit(&mut self, model: &mut Model, changes: &[Change]) -> Result<()> {
        let settings = *lock(&self.settings);
        if !settings.enabled {
            return Ok(());
        }

        let mut added = Vec::new();
        let mut resized = Vec::new();
        for change in changes {
            match change {
                Change::ChildAdded { child, .. }
                    if settings.add_enabled && model.is_lane(*child) && !added.contains(child) =>
                {
                    added.push(*child);
                }
                Change::GeometryChanged { cell, .. }
                    if settings.resize_enabled
                        && model.is_lane(*cell)
                        && size_changed(change)
                        && !resized.contains(cell) =>
                {
                    resized.push(*cell);
                }
                _ => {}
            }
        }
        added.retain(|&c| model.is_attached(c));
        resized.retain(|&c| model.is_attached(c) && !added.contains(&c));
        if added.is_empty() && resized.is_empty() {
            return Ok(());
        }

        let lane_span = span!(
            Level::DEBUG,
            "swimlanes",
            added = added.len(),
            resized = resized.len()
        );
        let _enter = lane_span.enter();

        model.batch_update(|model| {
            for &lane in &added {
                self.lane_added(model, lane)?;
            }
            let mut visited = HashSet::new();
            for &lane in &resized {
                self.resize_from(model, lane, settings, &mut visited)?;
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "swimlane_manager"
    }
}

impl fmt::Debug for SwimlaneManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwimlaneManager")
            .field("settings", &*lock(&self.settings))
            .finish()
    }
}
