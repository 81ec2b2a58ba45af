//! Node drag workflows driven through the engine: threshold, selection,
//! group extents, drag parents, auto-pan and aborts.

use crate::helpers::{TestFlowBuilder, absolute_of, drag_node, event_names, pointer, position_of, positions};
use flowboard::{CoordinateExtent, EngineEvent, NodeChange, Viewport, XYPosition};
use proptest::prelude::*;
use std::time::Instant;

// ============================================================================
// Threshold
// ============================================================================

#[test]
fn test_threshold_measured_from_pointer_down() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.node_drag_threshold = 5.0)
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(10.0, 10.0), "a").unwrap();
    engine.pointer_move(&pointer(13.0, 10.0));
    assert!(engine.take_node_changes().is_empty());
    assert!(engine.take_events().is_empty());

    // 7px from pointer-down: the drag starts but nothing moves yet.
    engine.pointer_move(&pointer(17.0, 10.0));
    assert!(positions(&engine.take_node_changes()).is_empty());
    assert_eq!(event_names(&engine.take_events()), vec!["nodeDragStart"]);

    engine.pointer_move(&pointer(20.0, 12.0));
    assert_eq!(
        positions(&engine.take_node_changes()),
        vec![("a".to_string(), XYPosition::new(3.0, 2.0))]
    );
}

#[test]
fn test_zero_threshold_starts_on_pointer_down() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.node_drag_threshold = 0.0)
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(10.0, 10.0), "a").unwrap();
    assert!(engine.gesture(0).is_some_and(|g| g.is_dragging()));
    assert_eq!(event_names(&engine.take_events()), vec!["nodeDragStart"]);
}

#[test]
fn test_drag_respects_zoom() {
    let mut engine = TestFlowBuilder::new()
        .with_viewport(Viewport::new(0.0, 0.0, 2.0))
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();

    drag_node(&mut engine, "a", (20.0, 20.0), &[(24.0, 20.0), (64.0, 40.0)]);
    // 40 screen pixels at zoom 2 is 20 flow units.
    assert_eq!(position_of(&engine, "a"), XYPosition::new(20.0, 10.0));
}

#[test]
fn test_snap_to_grid() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.snap_to_grid = true)
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();

    drag_node(&mut engine, "a", (10.0, 10.0), &[(40.0, 12.0), (70.0, 12.0)]);
    assert_eq!(position_of(&engine, "a"), XYPosition::new(30.0, 0.0));
}

#[test]
fn test_unknown_node_is_an_error() {
    let mut engine = TestFlowBuilder::new().build();
    assert!(engine.begin_node_drag(&pointer(0.0, 0.0), "ghost").is_err());
    assert!(engine.gesture(0).is_none());
}

#[test]
fn test_not_draggable_node_does_not_move() {
    let mut engine = TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();
    let mut nodes: Vec<_> = engine.nodes().iter().map(|n| (**n).clone()).collect();
    nodes[0].draggable = Some(false);
    engine.set_nodes(nodes);

    drag_node(&mut engine, "a", (10.0, 10.0), &[(20.0, 10.0), (60.0, 60.0)]);
    assert_eq!(position_of(&engine, "a"), XYPosition::new(0.0, 0.0));
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_dragging_unselected_node_replaces_selection() {
    let mut engine = TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .with_node("b", 200.0, 0.0, 100.0, 50.0)
        .selected("a")
        .build();

    engine.begin_node_drag(&pointer(210.0, 10.0), "b").unwrap();
    engine.pointer_move(&pointer(215.0, 10.0));
    engine.pointer_move(&pointer(225.0, 10.0));
    engine.pointer_up(&pointer(225.0, 10.0));
    let changes = engine.apply_pending_changes();

    assert!(changes.contains(&NodeChange::Select {
        id: "a".into(),
        selected: false
    }));
    assert!(changes.contains(&NodeChange::Select {
        id: "b".into(),
        selected: true
    }));
    assert_eq!(position_of(&engine, "a"), XYPosition::new(0.0, 0.0));
    assert_eq!(position_of(&engine, "b"), XYPosition::new(210.0, 0.0));
}

#[test]
fn test_selected_nodes_move_together() {
    let mut engine = TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .with_node("b", 200.0, 100.0, 100.0, 50.0)
        .with_node("c", 400.0, 0.0, 100.0, 50.0)
        .selected("a")
        .selected("b")
        .build();

    drag_node(&mut engine, "a", (10.0, 10.0), &[(12.0, 10.0), (42.0, 30.0)]);
    assert_eq!(position_of(&engine, "a"), XYPosition::new(30.0, 20.0));
    assert_eq!(position_of(&engine, "b"), XYPosition::new(230.0, 120.0));
    assert_eq!(position_of(&engine, "c"), XYPosition::new(400.0, 0.0));
}

#[test]
fn test_group_drag_keeps_selection_box_inside_node_extent() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.node_extent = Some(CoordinateExtent::new(0.0, 0.0, 500.0, 500.0)))
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .with_node("b", 200.0, 100.0, 100.0, 50.0)
        .selected("a")
        .selected("b")
        .build();

    drag_node(&mut engine, "a", (10.0, 10.0), &[(12.0, 10.0), (1000.0, 10.0)]);
    // The pair keeps its spacing; the right edge of the box hits 500.
    assert_eq!(position_of(&engine, "a"), XYPosition::new(200.0, 0.0));
    assert_eq!(position_of(&engine, "b"), XYPosition::new(400.0, 100.0));

    drag_node(&mut engine, "a", (210.0, 10.0), &[(212.0, 10.0), (-900.0, 10.0)]);
    assert_eq!(position_of(&engine, "a"), XYPosition::new(0.0, 0.0));
    assert_eq!(position_of(&engine, "b"), XYPosition::new(200.0, 100.0));
}

#[test]
fn test_drag_parent_moves_ancestor() {
    let mut handle = crate::helpers::measured_node("h", 10.0, 10.0, 20.0, 20.0);
    handle.parent_id = Some("p".into());
    handle.drag_parent = true;
    let mut engine = TestFlowBuilder::new()
        .with_node("p", 0.0, 0.0, 200.0, 200.0)
        .with(handle)
        .build();

    engine.begin_node_drag(&pointer(20.0, 20.0), "h").unwrap();
    engine.pointer_move(&pointer(22.0, 20.0));
    engine.pointer_move(&pointer(72.0, 70.0));
    let moved = positions(&engine.take_node_changes());

    assert_eq!(moved, vec![("p".to_string(), XYPosition::new(50.0, 50.0))]);
}

#[test]
fn test_child_drag_clamped_to_parent() {
    let mut engine = TestFlowBuilder::new()
        .with_node("p", 100.0, 100.0, 200.0, 200.0)
        .with_child("c", "p", 10.0, 10.0, 50.0, 50.0)
        .build();

    drag_node(&mut engine, "c", (120.0, 120.0), &[(122.0, 120.0), (900.0, 900.0)]);
    assert_eq!(position_of(&engine, "c"), XYPosition::new(150.0, 150.0));
    assert_eq!(absolute_of(&mut engine, "c"), XYPosition::new(250.0, 250.0));
}

// ============================================================================
// Events and aborts
// ============================================================================

#[test]
fn test_drag_stop_reports_final_positions() {
    let mut engine = TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();

    drag_node(&mut engine, "a", (10.0, 10.0), &[(12.0, 10.0), (50.0, 30.0)]);
    let events = engine.take_events();
    assert_eq!(event_names(&events), vec!["nodeDragStart", "nodeDrag", "nodeDragStop"]);
    match events.last() {
        Some(EngineEvent::NodeDragStop { node: Some(node), nodes }) => {
            assert_eq!(node.position, XYPosition::new(38.0, 20.0));
            assert!(!node.dragging);
            assert_eq!(nodes.len(), 1);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_cancel_resets_dragging_without_stop_event() {
    let mut engine = TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(10.0, 10.0), "a").unwrap();
    engine.pointer_move(&pointer(30.0, 10.0));
    engine.apply_pending_changes();
    engine.take_events();

    engine.cancel(0);
    assert_eq!(
        engine.take_node_changes(),
        vec![NodeChange::position("a", None, Some(false))]
    );
    assert!(engine.take_events().is_empty());
    assert!(engine.gesture(0).is_none());
}

#[test]
fn test_cancel_before_threshold_is_silent() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.node_drag_threshold = 10.0)
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(10.0, 10.0), "a").unwrap();
    engine.pointer_move(&pointer(12.0, 10.0));
    engine.cancel(0);
    assert!(engine.take_node_changes().is_empty());
    assert!(engine.take_events().is_empty());
}

#[test]
fn test_independent_pointers_drag_independent_nodes() {
    let mut engine = TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .with_node("b", 300.0, 0.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(10.0, 10.0), "a").unwrap();
    engine
        .begin_node_drag(&pointer(310.0, 10.0).with_pointer(7), "b")
        .unwrap();
    engine.pointer_move(&pointer(12.0, 10.0));
    engine.pointer_move(&pointer(312.0, 10.0).with_pointer(7));
    engine.pointer_move(&pointer(12.0, 40.0));
    engine.pointer_move(&pointer(352.0, 10.0).with_pointer(7));
    engine.pointer_up(&pointer(12.0, 40.0));
    engine.pointer_up(&pointer(352.0, 10.0).with_pointer(7));
    engine.apply_pending_changes();

    assert_eq!(position_of(&engine, "a"), XYPosition::new(0.0, 30.0));
    assert_eq!(position_of(&engine, "b"), XYPosition::new(340.0, 0.0));
}

// ============================================================================
// Auto-pan
// ============================================================================

#[test]
fn test_auto_pan_scrolls_and_carries_node() {
    let mut engine = TestFlowBuilder::new()
        .with_node("a", 300.0, 300.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(310.0, 310.0), "a").unwrap();
    engine.pointer_move(&pointer(320.0, 310.0));
    engine.pointer_move(&pointer(5.0, 310.0));
    engine.take_node_changes();
    engine.take_events();
    assert!(engine.needs_frame());

    engine.frame(Instant::now());
    // (40 - 5) / 40 of the 15px speed.
    assert_eq!(engine.viewport().x, 13.125);
    let moved = positions(&engine.take_node_changes());
    assert_eq!(moved, vec![("a".to_string(), XYPosition::new(-28.125, 300.0))]);
    assert_eq!(event_names(&engine.take_events()), vec!["viewportChange", "nodeDrag"]);
}

#[test]
fn test_auto_pan_at_translate_extent_does_not_creep() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.translate_extent = Some(CoordinateExtent::new(0.0, 0.0, 800.0, 600.0)))
        .with_node("a", 300.0, 300.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(310.0, 310.0), "a").unwrap();
    engine.pointer_move(&pointer(320.0, 310.0));
    engine.pointer_move(&pointer(5.0, 310.0));
    engine.take_node_changes();

    engine.frame(Instant::now());
    assert_eq!(engine.viewport(), Viewport::default());
    assert!(engine.take_node_changes().is_empty());
}

#[test]
fn test_auto_pan_with_sub_pixel_margin() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.auto_pan_margin = 0.5)
        .with_node("a", 300.0, 300.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(310.0, 310.0), "a").unwrap();
    engine.pointer_move(&pointer(320.0, 310.0));
    engine.pointer_move(&pointer(0.2, 310.0));
    engine.take_node_changes();

    engine.frame(Instant::now());
    assert_eq!(engine.viewport().x, 15.0);
    assert_eq!(positions(&engine.take_node_changes()).len(), 1);
}

#[test]
fn test_auto_pan_disabled() {
    let mut engine = TestFlowBuilder::new()
        .configure(|c| c.auto_pan_on_node_drag = false)
        .with_node("a", 300.0, 300.0, 100.0, 50.0)
        .build();

    engine.begin_node_drag(&pointer(310.0, 310.0), "a").unwrap();
    engine.pointer_move(&pointer(5.0, 310.0));
    assert!(!engine.needs_frame());
    engine.frame(Instant::now());
    assert_eq!(engine.viewport(), Viewport::default());
}

// ============================================================================
// Properties
// ============================================================================

const NODE_EXTENT: CoordinateExtent = CoordinateExtent::new(-200.0, -200.0, 1000.0, 800.0);
const TARGETS: [(&str, (f64, f64)); 3] = [("p", (150.0, 150.0)), ("c", (70.0, 70.0)), ("f", (430.0, 130.0))];

fn inside(rect: flowboard::Rect, extent: &CoordinateExtent) -> bool {
    const EPS: f64 = 1e-6;
    rect.x >= extent.min.x - EPS
        && rect.y >= extent.min.y - EPS
        && rect.right() <= extent.max.x + EPS
        && rect.bottom() <= extent.max.y + EPS
}

proptest! {
    #[test]
    fn drag_keeps_participants_inside_extent(
        target in 0usize..3,
        select_free in any::<bool>(),
        snap in any::<bool>(),
        path in prop::collection::vec((-1500.0..1500.0f64, -1500.0..1500.0f64), 1..12),
    ) {
        let mut builder = TestFlowBuilder::new()
            .configure(|c| {
                c.node_extent = Some(NODE_EXTENT);
                c.snap_to_grid = snap;
                c.auto_pan_on_node_drag = false;
            })
            .with_node("p", 0.0, 0.0, 300.0, 300.0)
            .with_child("c", "p", 50.0, 50.0, 40.0, 40.0)
            .with_node("f", 400.0, 100.0, 60.0, 60.0);
        if select_free {
            builder = builder.selected("f");
        }
        let mut engine = builder.build();

        let (id, (x, y)) = TARGETS[target];
        engine.begin_node_drag(&pointer(x, y), id).unwrap();
        for (px, py) in path {
            engine.pointer_move(&pointer(px, py));
            engine.apply_pending_changes();

            let parent = engine.internal_node("p").unwrap().rect();
            let child = engine.internal_node("c").unwrap().rect();
            let free = engine.internal_node("f").unwrap().rect();
            prop_assert!(inside(child, &CoordinateExtent::from_rect(&parent)), "child {:?} outside {:?}", child, parent);
            prop_assert!(inside(parent, &NODE_EXTENT), "parent {:?}", parent);
            prop_assert!(inside(free, &NODE_EXTENT), "free {:?}", free);
        }
        engine.pointer_up(&pointer(0.0, 0.0));
    }
}
