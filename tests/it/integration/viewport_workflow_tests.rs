//! Viewport behaviour driven through the engine: fitting, panning, pinch and
//! wheel input, and configuration changes.

use crate::helpers::{TestFlowBuilder, event_names, pointer, touch};
use flowboard::config::Padding;
use flowboard::engine::FitViewOptions;
use flowboard::input::PinchEvent;
use flowboard::viewport::WheelEvent;
use flowboard::{CoordinateExtent, EngineConfig, EngineEvent, Viewport, XYPosition};
use std::time::{Duration, Instant};

fn assert_viewport_near(actual: Viewport, expected: Viewport) {
    let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
    assert!(
        close(actual.x, expected.x) && close(actual.y, expected.y) && close(actual.zoom, expected.zoom),
        "expected {expected:?}, got {actual:?}"
    );
}

/// `a` at the origin and `b` at (300,200), both 100x100: bounds 400x300.
fn two_nodes() -> TestFlowBuilder {
    TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 100.0)
        .with_node("b", 300.0, 200.0, 100.0, 100.0)
}

fn no_padding() -> FitViewOptions {
    FitViewOptions {
        padding: Padding::from(0.0),
        ..FitViewOptions::default()
    }
}

// ============================================================================
// Fit view
// ============================================================================

#[test]
fn test_fit_view_fills_container() {
    let mut engine = two_nodes().build();
    assert!(engine.fit_view(&no_padding()));
    assert_eq!(engine.viewport(), Viewport::new(0.0, 0.0, 2.0));
    assert_eq!(event_names(&engine.take_events()), vec!["viewportChange"]);
}

#[test]
fn test_fit_view_with_fraction_padding() {
    let mut engine = two_nodes().build();
    let options = FitViewOptions {
        padding: Padding::from(0.1),
        ..FitViewOptions::default()
    };
    engine.fit_view(&options);
    // 36px left/right and 27px top/bottom leave 728x546 for 400x300.
    assert_viewport_near(engine.viewport(), Viewport::new(36.0, 27.0, 1.82));
}

#[test]
fn test_fit_view_subset_of_nodes() {
    let mut engine = two_nodes().build();
    let options = FitViewOptions {
        nodes: Some(vec!["b".into()]),
        ..no_padding()
    };
    engine.fit_view(&options);
    assert_eq!(engine.viewport(), Viewport::new(-300.0, -200.0, 2.0));
}

#[test]
fn test_fit_view_zoom_override() {
    let mut engine = two_nodes().build();
    let options = FitViewOptions {
        max_zoom: Some(1.0),
        ..no_padding()
    };
    engine.fit_view(&options);
    assert_eq!(engine.viewport(), Viewport::new(200.0, 150.0, 1.0));
}

#[test]
fn test_fit_view_without_nodes_or_container() {
    let mut empty = TestFlowBuilder::new().build();
    assert!(!empty.fit_view(&FitViewOptions::default()));

    let mut r#unsized = two_nodes().with_container(0.0, 0.0).build();
    assert!(!r#unsized.fit_view(&FitViewOptions::default()));
    assert_eq!(r#unsized.viewport(), Viewport::default());
}

#[test]
fn test_animated_fit_view_runs_on_frames() {
    let mut engine = two_nodes().build();
    let options = FitViewOptions {
        duration: Some(200),
        ..no_padding()
    };
    assert!(!engine.fit_view(&options));
    assert!(engine.needs_frame());
    assert_eq!(engine.viewport(), Viewport::default());

    let start = Instant::now();
    engine.frame(start);
    engine.frame(start + Duration::from_millis(100));
    let mid = engine.viewport();
    assert!(mid.zoom > 1.0 && mid.zoom < 2.0);

    engine.frame(start + Duration::from_millis(200));
    assert_eq!(engine.viewport(), Viewport::new(0.0, 0.0, 2.0));
    assert!(!engine.needs_frame());
    assert_eq!(event_names(&engine.take_events()), vec!["viewportChange"]);
}

// ============================================================================
// Pane panning
// ============================================================================

#[test]
fn test_pan_gesture_moves_viewport() {
    let mut engine = two_nodes().build();
    assert!(engine.begin_pan(&pointer(100.0, 100.0)));
    engine.pointer_move(&pointer(130.0, 110.0));
    engine.pointer_move(&pointer(150.0, 130.0));
    engine.pointer_up(&pointer(150.0, 130.0));

    assert_eq!(engine.viewport(), Viewport::new(50.0, 30.0, 1.0));
    assert_eq!(
        event_names(&engine.take_events()),
        vec!["panZoomStart", "viewportChange", "panZoomEnd"]
    );
}

#[test]
fn test_short_pan_is_a_pane_click() {
    let mut engine = two_nodes()
        .configure(|c| c.pane_click_distance = 5.0)
        .with_viewport(Viewport::new(10.0, 0.0, 1.0))
        .build();
    engine.begin_pan(&pointer(100.0, 100.0));
    engine.pointer_move(&pointer(103.0, 100.0));
    engine.pointer_up(&pointer(103.0, 100.0));

    assert_eq!(engine.viewport(), Viewport::new(10.0, 0.0, 1.0));
    assert_eq!(
        engine.take_events(),
        vec![EngineEvent::PaneClick {
            position: XYPosition::new(93.0, 100.0)
        }]
    );
}

#[test]
fn test_pan_on_drag_disabled() {
    let mut engine = two_nodes().configure(|c| c.pan_on_drag = false).build();
    assert!(!engine.begin_pan(&pointer(100.0, 100.0)));
    assert!(engine.gesture(0).is_none());
}

#[test]
fn test_second_touch_aborts_pan() {
    let mut engine = two_nodes().build();
    engine.begin_pan(&touch(0, 100.0, 100.0, 1));
    engine.pointer_move(&touch(0, 150.0, 100.0, 1));
    engine.take_events();

    engine.pointer_move(&touch(1, 300.0, 300.0, 2));
    assert!(engine.gesture(0).is_none());
    assert_eq!(event_names(&engine.take_events()), vec!["panZoomEnd"]);
    // The pan that already happened stays.
    assert_eq!(engine.viewport(), Viewport::new(50.0, 0.0, 1.0));
}

#[test]
fn test_pan_respects_translate_extent() {
    let mut engine = two_nodes()
        .configure(|c| c.translate_extent = Some(CoordinateExtent::new(0.0, 0.0, 1000.0, 1000.0)))
        .build();
    engine.begin_pan(&pointer(400.0, 300.0));
    engine.pointer_move(&pointer(900.0, 300.0));
    // The left edge of the extent stops the pan.
    assert_eq!(engine.viewport(), Viewport::new(0.0, 0.0, 1.0));
    engine.pointer_move(&pointer(0.0, 300.0));
    assert_eq!(engine.viewport(), Viewport::new(-200.0, 0.0, 1.0));
}

// ============================================================================
// Pinch and wheel
// ============================================================================

#[test]
fn test_pinch_zooms_around_centre() {
    let mut engine = two_nodes().build();
    let center = XYPosition::new(200.0, 100.0);
    assert!(engine.pinch(&PinchEvent { center, scale: 1.5 }));
    assert_eq!(engine.viewport().zoom, 1.5);
    assert_eq!(engine.transform().invert(center), center);
    assert_eq!(event_names(&engine.take_events()), vec!["viewportChange"]);
}

#[test]
fn test_pinch_disabled() {
    let mut engine = two_nodes().configure(|c| c.zoom_on_pinch = false).build();
    let event = PinchEvent {
        center: XYPosition::new(200.0, 100.0),
        scale: 1.5,
    };
    assert!(!engine.pinch(&event));
    assert!(engine.take_events().is_empty());
}

#[test]
fn test_wheel_emits_viewport_change_only() {
    let mut engine = two_nodes().build();
    let event = WheelEvent {
        position: XYPosition::new(400.0, 300.0),
        delta_y: -100.0,
        ..WheelEvent::default()
    };
    assert!(engine.wheel(&event));
    assert!(engine.viewport().zoom > 1.0);
    assert_eq!(event_names(&engine.take_events()), vec!["viewportChange"]);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_new_config_reconstrains_viewport() {
    let mut engine = two_nodes().with_viewport(Viewport::new(0.0, 0.0, 2.0)).build();
    engine.set_config(EngineConfig {
        max_zoom: 1.5,
        ..EngineConfig::default()
    });
    assert_eq!(engine.viewport().zoom, 1.5);
    assert_eq!(event_names(&engine.take_events()), vec!["viewportChange"]);
}

#[test]
fn test_zoom_buttons() {
    let mut engine = two_nodes().build();
    engine.zoom_in(None);
    let zoomed_in = engine.viewport().zoom;
    assert!(zoomed_in > 1.0);
    engine.zoom_out(None);
    assert!((engine.viewport().zoom - 1.0).abs() < 1e-9);
    engine.zoom_to(4.0, None);
    assert_eq!(engine.viewport().zoom, 2.0);
}

#[test]
fn test_screen_flow_conversion() {
    let engine = two_nodes()
        .configure(|c| {
            c.snap_to_grid = true;
            c.snap_grid = [10.0, 10.0];
        })
        .with_viewport(Viewport::new(100.0, 50.0, 2.0))
        .build();
    assert_eq!(
        engine.screen_to_flow(XYPosition::new(300.0, 250.0), false),
        XYPosition::new(100.0, 100.0)
    );
    assert_eq!(
        engine.screen_to_flow(XYPosition::new(312.0, 250.0), true),
        XYPosition::new(110.0, 100.0)
    );
    assert_eq!(
        engine.flow_to_screen(XYPosition::new(100.0, 100.0)),
        XYPosition::new(300.0, 250.0)
    );
}
