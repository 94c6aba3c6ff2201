//! End-to-end tests for the hierarchical layout pipeline

use stratum::core::{Direction, Rect};
use stratum::layout::hierarchical::{cycle, ranking, HierarchicalConfig, HierarchicalLayout};
use stratum::model::{CellId, Model, Style};

fn vertex(model: &mut Model, parent: CellId, label: &str) -> CellId {
    model
        .insert_vertex(
            parent,
            Some(label),
            Rect::new(0.0, 0.0, 80.0, 40.0),
            Style::default(),
        )
        .unwrap()
}

fn edge(model: &mut Model, parent: CellId, source: CellId, target: CellId) -> CellId {
    model
        .insert_edge(parent, None, source, target, Style::default())
        .unwrap()
}

fn bounds(model: &Model, cell: CellId) -> Rect {
    model.geometry(cell).unwrap().bounds
}

#[test]
fn test_three_cycle_inverts_one_edge() {
    let mut model = Model::new();
    let parent = model.default_parent();
    let a = vertex(&mut model, parent, "A");
    let b = vertex(&mut model, parent, "B");
    let c = vertex(&mut model, parent, "C");
    edge(&mut model, parent, a, b);
    edge(&mut model, parent, b, c);
    edge(&mut model, parent, c, a);

    let layout = HierarchicalLayout::new();
    let mut hierarchy = layout.build_hierarchy(&model, parent);
    assert!(!cycle::is_acyclic(&hierarchy));

    let inverted = cycle::remove_cycles(&mut hierarchy);
    assert_eq!(inverted, 1);
    assert_eq!(hierarchy.edges.iter().filter(|e| e.inverted).count(), 1);
    assert!(cycle::is_acyclic(&hierarchy));

    let max_rank = ranking::assign_ranks(&mut hierarchy);
    assert_eq!(max_rank, 2);
    assert!(ranking::ranks_are_monotone(&hierarchy));

    let mut ranks: Vec<usize> = [a, b, c]
        .iter()
        .map(|&cell| hierarchy.nodes[hierarchy.node_of(cell).unwrap()].rank)
        .collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![0, 1, 2]);
}

#[test]
fn test_three_cycle_layout_places_three_ranks() {
    let mut model = Model::new();
    let parent = model.default_parent();
    let a = vertex(&mut model, parent, "A");
    let b = vertex(&mut model, parent, "B");
    let c = vertex(&mut model, parent, "C");
    edge(&mut model, parent, a, b);
    edge(&mut model, parent, b, c);
    let back = edge(&mut model, parent, c, a);

    let result = stratum::layout(&mut model, parent, Direction::TopDown).unwrap();

    assert_eq!(result.inverted, 1);
    let mut ys: Vec<f64> = [a, b, c].iter().map(|&v| bounds(&model, v).y).collect();
    ys.sort_by(|x, y| x.partial_cmp(y).unwrap());
    assert!(ys[0] < ys[1] && ys[1] < ys[2]);

    // the back edge spans two ranks, so it bends once
    let points = &model.geometry(back).unwrap().points;
    assert_eq!(points.len(), 1);
}

#[test]
fn test_layout_is_deterministic() {
    fn build() -> (Model, Vec<CellId>) {
        let mut model = Model::new();
        let parent = model.default_parent();
        let cells: Vec<CellId> = (0..6)
            .map(|i| vertex(&mut model, parent, &format!("N{}", i)))
            .collect();
        for &(s, t) in &[(0, 2), (0, 3), (1, 2), (1, 4), (2, 5), (3, 5), (4, 5), (5, 0)] {
            edge(&mut model, parent, cells[s], cells[t]);
        }
        (model, cells)
    }

    let (mut first, cells) = build();
    let (mut second, _) = build();
    let parent = first.default_parent();
    stratum::layout(&mut first, parent, Direction::TopDown).unwrap();
    stratum::layout(&mut second, parent, Direction::TopDown).unwrap();

    for &cell in &cells {
        assert_eq!(bounds(&first, cell), bounds(&second, cell));
    }
}

#[test]
fn test_relayout_changes_nothing() {
    let mut model = Model::new();
    let parent = model.default_parent();
    let a = vertex(&mut model, parent, "A");
    let b = vertex(&mut model, parent, "B");
    let c = vertex(&mut model, parent, "C");
    edge(&mut model, parent, a, b);
    edge(&mut model, parent, a, c);

    stratum::layout(&mut model, parent, Direction::TopDown).unwrap();
    let history = model.history().len();
    stratum::layout(&mut model, parent, Direction::TopDown).unwrap();

    // every setter call was a no-op, so nothing was recorded
    assert_eq!(model.history().len(), history);
}

#[test]
fn test_self_loop_is_left_alone() {
    let mut model = Model::new();
    let parent = model.default_parent();
    let a = vertex(&mut model, parent, "A");
    let b = vertex(&mut model, parent, "B");
    edge(&mut model, parent, a, b);
    let looped = edge(&mut model, parent, a, a);

    let result = stratum::layout(&mut model, parent, Direction::TopDown).unwrap();

    assert_eq!(result.inverted, 0);
    assert_eq!(result.skipped, vec![looped]);
    assert!(model.geometry(looped).unwrap().points.is_empty());
    assert!(bounds(&model, b).y > bounds(&model, a).y);
}

#[test]
fn test_directions() {
    for direction in [
        Direction::TopDown,
        Direction::BottomUp,
        Direction::LeftRight,
        Direction::RightLeft,
    ] {
        let mut model = Model::new();
        let parent = model.default_parent();
        let a = vertex(&mut model, parent, "A");
        let b = vertex(&mut model, parent, "B");
        edge(&mut model, parent, a, b);

        stratum::layout(&mut model, parent, direction).unwrap();

        let (a, b) = (bounds(&model, a), bounds(&model, b));
        match direction {
            Direction::TopDown => assert!(b.y > a.bottom(), "{}", direction),
            Direction::BottomUp => assert!(a.y > b.bottom(), "{}", direction),
            Direction::LeftRight => assert!(b.x > a.right(), "{}", direction),
            Direction::RightLeft => assert!(a.x > b.right(), "{}", direction),
        }
    }
}

#[test]
fn test_edges_to_nested_cells_use_their_ancestor() {
    let mut model = Model::new();
    let parent = model.default_parent();
    let group = model
        .insert_vertex(
            parent,
            None,
            Rect::new(0.0, 0.0, 200.0, 100.0),
            Style::default(),
        )
        .unwrap();
    let inner = vertex(&mut model, group, "inner");
    let outside = vertex(&mut model, parent, "outside");
    edge(&mut model, parent, inner, outside);

    let layout = HierarchicalLayout::new();
    let hierarchy = layout.build_hierarchy(&model, parent);

    assert_eq!(hierarchy.vertex_count(), 2);
    assert_eq!(hierarchy.edges.len(), 1);
    assert_eq!(
        hierarchy.edges[0].source,
        hierarchy.node_of(group).unwrap()
    );
}

#[test]
fn test_config_from_json() {
    let config: HierarchicalConfig =
        serde_json::from_str(r#"{ "direction": "LeftRight", "inter_rank_spacing": 40.0 }"#)
            .unwrap();

    assert_eq!(config.direction, Direction::LeftRight);
    assert_eq!(config.inter_rank_spacing, 40.0);
    assert_eq!(config.intra_cell_spacing, 30.0);
}
