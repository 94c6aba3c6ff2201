//! Layout and swimlane managers driven through real transactions

use anyhow::Result;
use std::sync::{Arc, Mutex};

use stratum::core::{DiagramError, Rect};
use stratum::layout::{
    HierarchicalConfig, HierarchicalLayout, Layout, LayoutEvent, LayoutRegistry, StackConfig,
    StackLayout,
};
use stratum::manager::{LayoutManager, SwimlaneManager};
use stratum::model::{CellId, Change, Geometry, Model, ModelListener, Style};

/// Counts executions per cell and optionally fails
struct Recorder {
    runs: Arc<Mutex<Vec<CellId>>>,
    fail: Option<fn(CellId) -> DiagramError>,
}

impl Layout for Recorder {
    fn execute(&self, model: &mut Model, parent: CellId) -> Result<()> {
        self.runs.lock().unwrap().push(parent);
        if let Some(fail) = self.fail {
            return Err(fail(parent).into());
        }
        // touch something so a failure has something to roll back
        let children = model.children(parent).to_vec();
        for child in children {
            if let Some(mut geometry) = model.geometry(child).cloned() {
                geometry.bounds.x = 5.0;
                model.set_geometry(child, geometry)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn rect(w: f64, h: f64) -> Rect {
    Rect::new(0.0, 0.0, w, h)
}

fn recorder(runs: &Arc<Mutex<Vec<CellId>>>) -> Arc<dyn Layout> {
    Arc::new(Recorder {
        runs: Arc::clone(runs),
        fail: None,
    })
}

#[test]
fn test_no_op_batch_runs_nothing() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let group = model
        .insert_vertex(layer, None, rect(200.0, 200.0), Style::default().with_role("group"))
        .unwrap();
    model
        .insert_vertex(group, None, rect(20.0, 20.0), Style::default())
        .unwrap();
    let loose = model
        .insert_vertex(layer, None, rect(20.0, 20.0), Style::default())
        .unwrap();

    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut registry = LayoutRegistry::new();
    registry.register("group", recorder(&runs));
    let manager = LayoutManager::install(&mut model, registry);
    let events = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&events);
    manager.on_layout_cells(move |_| *counter.lock().unwrap() += 1);

    // empty transaction
    model.batch_update(|_| Ok(())).unwrap();
    // a change nowhere near a layout
    model.set_value(loose, Some("moved")).unwrap();
    // a change that is a no-op and records nothing
    model.set_value(loose, Some("moved")).unwrap();

    assert!(runs.lock().unwrap().is_empty());
    assert_eq!(*events.lock().unwrap(), 0);
}

#[test]
fn test_ancestor_layout_runs_once_per_batch() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let group = model
        .insert_vertex(layer, None, rect(200.0, 200.0), Style::default().with_role("group"))
        .unwrap();
    let children: Vec<CellId> = (0..3)
        .map(|_| {
            model
                .insert_vertex(group, None, rect(20.0, 20.0), Style::default())
                .unwrap()
        })
        .collect();

    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut registry = LayoutRegistry::new();
    registry.register("group", recorder(&runs));
    let manager = LayoutManager::install(&mut model, registry);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    manager.on_layout_cells(move |event| sink.lock().unwrap().push(event.cells.clone()));

    model
        .batch_update(|model| {
            model.set_value(children[0], Some("a"))?;
            model.set_visible(children[1], false)?;
            model.set_geometry(children[2], Geometry::new(0.0, 0.0, 30.0, 30.0))
        })
        .unwrap();

    assert_eq!(*runs.lock().unwrap(), vec![group]);
    assert_eq!(*events.lock().unwrap(), vec![vec![group]]);
}

#[test]
fn test_child_change_without_bubbling_leaves_parent_layout_alone() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let group = model
        .insert_vertex(layer, None, rect(200.0, 200.0), Style::default().with_role("group"))
        .unwrap();
    let leaf = model
        .insert_vertex(group, None, rect(20.0, 20.0), Style::default())
        .unwrap();

    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut registry = LayoutRegistry::new();
    registry.register("group", recorder(&runs));
    let manager = LayoutManager::install(&mut model, registry);
    manager.set_bubbling(false);

    model
        .set_geometry(leaf, Geometry::new(10.0, 10.0, 30.0, 30.0))
        .unwrap();
    assert!(runs.lock().unwrap().is_empty());

    // adding a child still names the group itself
    model
        .insert_vertex(group, None, rect(20.0, 20.0), Style::default())
        .unwrap();
    assert_eq!(*runs.lock().unwrap(), vec![group]);

    manager.set_bubbling(true);
    runs.lock().unwrap().clear();
    model
        .set_geometry(leaf, Geometry::new(20.0, 20.0, 30.0, 30.0))
        .unwrap();
    assert_eq!(*runs.lock().unwrap(), vec![group]);
}

#[test]
fn test_second_pass_runs_ancestor_first_when_registered() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let outer = model
        .insert_vertex(layer, None, rect(200.0, 200.0), Style::default().with_role("group"))
        .unwrap();
    let inner = model
        .insert_vertex(outer, None, rect(100.0, 100.0), Style::default().with_role("group"))
        .unwrap();
    let leaf = model
        .insert_vertex(inner, None, rect(20.0, 20.0), Style::default())
        .unwrap();

    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut registry = LayoutRegistry::new();
    registry.register_for(
        "group",
        recorder(&runs),
        &[
            LayoutEvent::LayoutCells,
            LayoutEvent::BeginUpdate,
            LayoutEvent::EndUpdate,
        ],
    );
    LayoutManager::install(&mut model, registry);

    model.set_value(leaf, Some("x")).unwrap();

    assert_eq!(*runs.lock().unwrap(), vec![inner, outer, outer, inner]);
}

#[test]
fn test_swimlane_settles_before_outer_stack() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let pool = model
        .insert_vertex(layer, Some("pool"), rect(300.0, 400.0), Style::default().with_role("stack"))
        .unwrap();
    let lane = model
        .insert_vertex(pool, Some("lane"), rect(200.0, 100.0), Style::lane(true, 30.0).with_role("flow"))
        .unwrap();
    let after = model
        .insert_vertex(pool, Some("after"), Rect::new(0.0, 100.0, 200.0, 50.0), Style::default())
        .unwrap();
    let a = model
        .insert_vertex(lane, Some("a"), rect(40.0, 40.0), Style::default())
        .unwrap();
    let b = model
        .insert_vertex(lane, Some("b"), rect(40.0, 40.0), Style::default())
        .unwrap();
    model
        .insert_edge(lane, None, a, b, Style::default())
        .unwrap();

    let mut registry = LayoutRegistry::new();
    registry.register("stack", Arc::new(StackLayout::new()));
    registry.register(
        "flow",
        Arc::new(HierarchicalLayout::with_config(HierarchicalConfig {
            resize_parent: true,
            move_parent: true,
            parent_border: 10.0,
            ..Default::default()
        })),
    );
    LayoutManager::install(&mut model, registry);

    // grow a child of the lane; the lane grows, then the stack reflows
    model
        .set_geometry(a, Geometry::new(0.0, 0.0, 40.0, 200.0))
        .unwrap();

    let lane_bounds = model.geometry(lane).unwrap().bounds;
    let after_bounds = model.geometry(after).unwrap().bounds;
    assert!(lane_bounds.height > 200.0);
    assert_eq!(lane_bounds.y, 0.0);
    assert_eq!(after_bounds.y, lane_bounds.bottom());
}

#[test]
fn test_new_lane_adopts_sibling_height_in_horizontal_pool() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let pool = model
        .insert_vertex(layer, Some("pool"), rect(400.0, 330.0), Style::lane(true, 30.0).with_role("pool"))
        .unwrap();
    for _ in 0..2 {
        model
            .insert_vertex(pool, None, rect(200.0, 300.0), Style::lane(true, 30.0))
            .unwrap();
    }

    let mut registry = LayoutRegistry::new();
    registry.register(
        "pool",
        Arc::new(StackLayout::with_config(StackConfig {
            horizontal: true,
            ..Default::default()
        })),
    );
    SwimlaneManager::install(&mut model);
    LayoutManager::install(&mut model, registry);

    let added = model
        .insert_vertex(pool, None, rect(120.0, 75.5), Style::lane(true, 30.0))
        .unwrap();

    let bounds = model.geometry(added).unwrap().bounds;
    assert_eq!(bounds.height, 300.0);
    assert_eq!(bounds.width, 120.0);
    assert_eq!(bounds.x, 400.0);
    assert_eq!(bounds.y, 30.0);
}

#[test]
fn test_new_lane_adopts_sibling_width_in_vertical_pool() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let pool = model
        .insert_vertex(layer, Some("pool"), rect(530.0, 200.0), Style::lane(false, 30.0))
        .unwrap();
    for _ in 0..2 {
        model
            .insert_vertex(pool, None, rect(500.0, 100.0), Style::lane(false, 30.0))
            .unwrap();
    }
    SwimlaneManager::install(&mut model);

    let added = model
        .insert_vertex(pool, None, rect(123.4, 60.0), Style::lane(false, 30.0))
        .unwrap();

    let bounds = model.geometry(added).unwrap().bounds;
    assert_eq!(bounds.width, 500.0);
    assert_eq!(bounds.height, 60.0);
}

#[test]
fn test_failing_layout_rolls_back_everything() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let group = model
        .insert_vertex(layer, None, rect(200.0, 200.0), Style::default().with_role("good"))
        .unwrap();
    let child = model
        .insert_vertex(group, None, rect(20.0, 20.0), Style::default())
        .unwrap();
    let nested = model
        .insert_vertex(child, None, rect(10.0, 10.0), Style::default())
        .unwrap();
    model
        .set_style(child, Style::default().with_role("bad"))
        .unwrap();

    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut registry = LayoutRegistry::new();
    registry.register("good", recorder(&runs));
    registry.register(
        "bad",
        Arc::new(Recorder {
            runs: Arc::clone(&runs),
            fail: Some(|_| DiagramError::layout_error("boom")),
        }),
    );
    LayoutManager::install(&mut model, registry);
    let history = model.history().len();

    let err = model
        .set_geometry(nested, Geometry::new(3.0, 3.0, 10.0, 10.0))
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DiagramError>(),
        Some(DiagramError::LayoutError { .. })
    ));
    assert_eq!(model.geometry(nested).unwrap().bounds, Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(model.geometry(child).unwrap().bounds.x, 0.0);
    assert_eq!(model.history().len(), history);
    assert_eq!(model.update_level(), 0);
}

#[test]
fn test_structural_error_skips_only_that_cell() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let group = model
        .insert_vertex(layer, None, rect(200.0, 200.0), Style::default().with_role("good"))
        .unwrap();
    let child = model
        .insert_vertex(group, None, rect(20.0, 20.0), Style::default().with_role("broken"))
        .unwrap();
    let nested = model
        .insert_vertex(child, None, rect(10.0, 10.0), Style::default())
        .unwrap();

    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut registry = LayoutRegistry::new();
    registry.register("good", recorder(&runs));
    registry.register(
        "broken",
        Arc::new(Recorder {
            runs: Arc::clone(&runs),
            fail: Some(|cell| DiagramError::structural(cell, "dangling edge")),
        }),
    );
    LayoutManager::install(&mut model, registry);

    model.set_value(nested, Some("x")).unwrap();

    assert_eq!(*runs.lock().unwrap(), vec![child, group]);
    // the good layout still wrote its geometry
    assert_eq!(model.geometry(child).unwrap().bounds.x, 5.0);
}

#[test]
fn test_layout_writes_share_the_undo_step() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let group = model
        .insert_vertex(layer, None, rect(400.0, 400.0), Style::default().with_role("flow"))
        .unwrap();
    let a = model
        .insert_vertex(group, None, rect(40.0, 40.0), Style::default())
        .unwrap();
    let b = model
        .insert_vertex(group, None, rect(40.0, 40.0), Style::default())
        .unwrap();

    let mut registry = LayoutRegistry::new();
    registry.register("flow", Arc::new(HierarchicalLayout::new()));
    LayoutManager::install(&mut model, registry);

    let before_a = model.geometry(a).unwrap().clone();
    let before_b = model.geometry(b).unwrap().clone();
    let history = model.history().len();

    let edge = model
        .insert_edge(group, None, a, b, Style::default())
        .unwrap();
    assert_eq!(model.history().len(), history + 1);
    assert!(model.geometry(b).unwrap().bounds.y > model.geometry(a).unwrap().bounds.y);

    assert!(model.undo());
    assert!(!model.is_attached(edge));
    assert_eq!(model.geometry(a), Some(&before_a));
    assert_eq!(model.geometry(b), Some(&before_b));

    assert!(model.redo());
    assert!(model.is_attached(edge));
    assert!(model.geometry(b).unwrap().bounds.y > model.geometry(a).unwrap().bounds.y);
}

#[test]
fn test_unbalanced_end_update_is_reported() {
    let mut model = Model::new();
    let layer = model.default_parent();

    let err = model.end_update().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DiagramError>(),
        Some(DiagramError::UnbalancedTransaction)
    ));
    assert_eq!(model.update_level(), 0);

    // the model is still usable
    let cell = model
        .insert_vertex(layer, None, rect(10.0, 10.0), Style::default())
        .unwrap();
    assert!(model.is_attached(cell));
}

#[test]
fn test_listener_leaving_transaction_open_rolls_back() {
    struct Leaky;

    impl ModelListener for Leaky {
        fn before_commit(&mut self, model: &mut Model, _changes: &[Change]) -> Result<()> {
            model.begin_update();
            Ok(())
        }
    }

    let mut model = Model::new();
    let layer = model.default_parent();
    let cell = model
        .insert_vertex(layer, None, rect(10.0, 10.0), Style::default())
        .unwrap();
    model.add_listener(Leaky);

    let err = model.set_value(cell, Some("x")).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DiagramError>(),
        Some(DiagramError::UnbalancedTransaction)
    ));
    assert_eq!(model.value(cell), None);
    assert_eq!(model.update_level(), 0);
}

#[test]
fn test_swimlane_changes_are_visible_to_layouts() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let pool = model
        .insert_vertex(layer, Some("pool"), rect(400.0, 230.0), Style::lane(true, 30.0).with_role("pool"))
        .unwrap();
    let first = model
        .insert_vertex(pool, None, Rect::new(0.0, 30.0, 200.0, 200.0), Style::lane(true, 30.0))
        .unwrap();
    let second = model
        .insert_vertex(pool, None, Rect::new(200.0, 30.0, 200.0, 200.0), Style::lane(true, 30.0))
        .unwrap();

    let mut registry = LayoutRegistry::new();
    registry.register(
        "pool",
        Arc::new(StackLayout::with_config(StackConfig {
            horizontal: true,
            ..Default::default()
        })),
    );
    SwimlaneManager::install(&mut model);
    LayoutManager::install(&mut model, registry);

    // widen and heighten the first lane in one step
    model
        .set_geometry(first, Geometry::new(0.0, 30.0, 250.0, 260.0))
        .unwrap();

    let second_bounds = model.geometry(second).unwrap().bounds;
    assert_eq!(second_bounds.height, 260.0);
    assert_eq!(second_bounds.x, 250.0);
    assert_eq!(model.geometry(pool).unwrap().bounds.height, 290.0);
}
