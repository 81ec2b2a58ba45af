//! Connection gestures driven through the engine: targeting, validity,
//! reconnecting edges and click-to-connect.

use crate::helpers::{TestFlowBuilder, event_names, pointer};
use flowboard::config::ConnectionMode;
use flowboard::input::{ConnectionStatus, FinalConnectionState};
use flowboard::{Connection, Engine, EngineError, EngineEvent, HandleType, XYPosition};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

/// `a` at (0,0) and `b` at (300,0), both 100x50 with side handles.
///
/// Handle centres: a target (0,25), a source (100,25), b target (300,25),
/// b source (400,25).
fn two_nodes() -> TestFlowBuilder {
    TestFlowBuilder::new()
        .with_node("a", 0.0, 0.0, 100.0, 50.0)
        .with_handles("a")
        .with_node("b", 300.0, 0.0, 100.0, 50.0)
        .with_handles("b")
}

fn connect(source: &str, target: &str) -> Connection {
    Connection {
        source: source.into(),
        source_handle: None,
        target: target.into(),
        target_handle: None,
    }
}

fn connect_end(events: &[EngineEvent]) -> FinalConnectionState {
    events
        .iter()
        .find_map(|e| match e {
            EngineEvent::ConnectEnd { state } => Some(state.clone()),
            _ => None,
        })
        .expect("connect end emitted")
}

fn connections_made(events: &[EngineEvent]) -> Vec<Connection> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Connect { connection } => Some(connection.clone()),
            _ => None,
        })
        .collect()
}

/// Drag from the source handle of `a` and release at `to`.
fn drag_from_a(engine: &mut Engine, to: (f64, f64)) -> Vec<EngineEvent> {
    engine
        .begin_connection(&pointer(100.0, 25.0), "a", HandleType::Source, None)
        .expect("handle exists");
    engine.pointer_move(&pointer(to.0, to.1));
    engine.pointer_up(&pointer(to.0, to.1));
    engine.take_events()
}

// ============================================================================
// Targeting
// ============================================================================

#[test]
fn test_release_near_target_handle_connects() {
    let mut engine = two_nodes().build();
    engine
        .begin_connection(&pointer(100.0, 25.0), "a", HandleType::Source, None)
        .unwrap();
    engine.pointer_move(&pointer(298.0, 26.0));

    let state = engine.connection_state(0).expect("connection in progress");
    assert_eq!(state.status(), ConnectionStatus::Valid);
    // The line snaps onto the handle centre.
    assert_eq!(state.to, XYPosition::new(300.0, 25.0));
    assert_eq!(state.to_node.as_deref(), Some("b"));

    engine.pointer_up(&pointer(298.0, 26.0));
    let events = engine.take_events();
    assert_eq!(
        event_names(&events),
        vec!["connectStart", "connectionUpdate", "connect", "connectEnd"]
    );
    assert_eq!(connections_made(&events), vec![connect("a", "b")]);
    assert_eq!(connect_end(&events).is_valid, Some(true));
    assert!(engine.connection_state(0).is_none());
}

#[test]
fn test_release_outside_radius_ends_without_connection() {
    let mut engine = two_nodes().build();
    let events = drag_from_a(&mut engine, (500.0, 300.0));

    assert!(connections_made(&events).is_empty());
    let state = connect_end(&events);
    assert_eq!(state.is_valid, None);
    assert_eq!(state.to_handle, None);
    assert_eq!(state.to_position, None);
    assert_eq!(state.to, XYPosition::new(500.0, 300.0));
    assert_eq!(state.from, XYPosition::new(100.0, 25.0));
}

#[test]
fn test_strict_mode_rejects_same_role() {
    let mut engine = two_nodes().build();
    engine
        .begin_connection(&pointer(100.0, 25.0), "a", HandleType::Source, None)
        .unwrap();
    engine.pointer_move(&pointer(400.0, 25.0));
    let state = engine.connection_state(0).expect("connection in progress");
    assert_eq!(state.status(), ConnectionStatus::Invalid);
    // An invalid target leaves the line at the pointer.
    assert_eq!(state.to, XYPosition::new(400.0, 25.0));

    engine.pointer_up(&pointer(400.0, 25.0));
    let events = engine.take_events();
    assert!(connections_made(&events).is_empty());
    assert_eq!(connect_end(&events).is_valid, Some(false));
}

#[test]
fn test_loose_mode_accepts_same_role() {
    let mut engine = two_nodes()
        .configure(|c| c.connection_mode = ConnectionMode::Loose)
        .build();
    let events = drag_from_a(&mut engine, (400.0, 25.0));
    assert_eq!(connections_made(&events), vec![connect("a", "b")]);
}

#[test]
fn test_validator_sees_normalised_connection() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut engine = two_nodes().build();
    let log = seen.clone();
    engine.set_connection_validator(move |c| {
        log.borrow_mut().push(c.clone());
        false
    });

    // Start on the target handle of b and end on the source handle of a.
    engine
        .begin_connection(&pointer(300.0, 25.0), "b", HandleType::Target, None)
        .unwrap();
    engine.pointer_move(&pointer(101.0, 25.0));
    engine.pointer_up(&pointer(101.0, 25.0));
    let events = engine.take_events();

    assert!(seen.borrow().iter().all(|c| *c == connect("a", "b")));
    assert!(!seen.borrow().is_empty());
    assert!(connections_made(&events).is_empty());
    assert_eq!(connect_end(&events).is_valid, Some(false));
}

#[test]
fn test_connection_errors() {
    let mut engine = two_nodes().with_node("bare", 0.0, 200.0, 50.0, 50.0).build();

    let missing = engine.begin_connection(&pointer(0.0, 0.0), "ghost", HandleType::Source, None);
    assert!(matches!(missing, Err(EngineError::UnknownNode { .. })));

    let no_handle = engine.begin_connection(&pointer(50.0, 225.0), "bare", HandleType::Source, None);
    assert!(matches!(no_handle, Err(EngineError::MissingHandle { .. })));

    let wrong_id = engine.begin_connection(&pointer(100.0, 25.0), "a", HandleType::Source, Some("out"));
    assert!(matches!(wrong_id, Err(EngineError::MissingHandle { .. })));

    assert!(engine.take_events().is_empty());
    assert!(engine.connection_state(0).is_none());
}

#[test]
fn test_cancel_connection_is_silent() {
    let mut engine = two_nodes().build();
    engine
        .begin_connection(&pointer(100.0, 25.0), "a", HandleType::Source, None)
        .unwrap();
    engine.pointer_move(&pointer(298.0, 26.0));
    engine.take_events();

    engine.cancel(0);
    assert!(engine.take_events().is_empty());
    assert!(engine.take_node_changes().is_empty());
}

// ============================================================================
// Reconnect
// ============================================================================

#[test]
fn test_reconnect_moves_edge_target() {
    let mut engine = two_nodes()
        .with_node("c", 300.0, 200.0, 100.0, 50.0)
        .with_handles("c")
        .with_edge("e1", "a", "b")
        .build();

    // Grab the target end; the line starts at the source of a.
    engine
        .begin_reconnect(&pointer(300.0, 25.0), "e1", HandleType::Target)
        .unwrap();
    let from = engine.connection_state(0).map(|s| s.from);
    assert_eq!(from, Some(XYPosition::new(100.0, 25.0)));

    engine.pointer_move(&pointer(300.0, 225.0));
    engine.pointer_up(&pointer(300.0, 225.0));
    let events = engine.take_events();
    assert_eq!(
        event_names(&events),
        vec!["connectStart", "connectionUpdate", "reconnect", "connectEnd", "reconnectEnd"]
    );

    let connection = events
        .iter()
        .find_map(|e| match e {
            EngineEvent::Reconnect { edge_id, connection } if edge_id == "e1" => Some(connection.clone()),
            _ => None,
        })
        .expect("reconnect emitted");
    assert_eq!(connection, connect("a", "c"));

    engine.reconnect_edge("e1", &connection, false).unwrap();
    assert!(engine.connections("b", None, None).is_none_or(|m| m.is_empty()));
    let at_c = engine
        .connections("c", Some(HandleType::Target), None)
        .expect("edge indexed at c");
    assert!(at_c.contains_key("e1"));
}

#[test]
fn test_reconnect_unknown_edge() {
    let mut engine = two_nodes().build();
    let result = engine.begin_reconnect(&pointer(0.0, 0.0), "nope", HandleType::Source);
    assert!(matches!(result, Err(EngineError::UnknownEdge { .. })));
}

// ============================================================================
// Click to connect
// ============================================================================

#[test]
fn test_click_connect_then_add_edge() {
    let mut engine = two_nodes().build();

    assert_eq!(engine.click_connect("a", HandleType::Source, None).unwrap(), None);
    assert_eq!(engine.click_connect_start().map(|h| h.node_id.as_str()), Some("a"));

    let connection = engine
        .click_connect("b", HandleType::Target, None)
        .unwrap()
        .expect("valid pair");
    assert_eq!(connection, connect("a", "b"));
    assert!(engine.click_connect_start().is_none());
    assert_eq!(
        event_names(&engine.take_events()),
        vec!["connectStart", "connect", "connectEnd"]
    );

    engine.add_edge(&connection).unwrap();
    assert_eq!(engine.edges().len(), 1);
    assert_eq!(engine.edges()[0].id, "xy-edge__a-b");
    assert!(
        engine
            .connections("a", Some(HandleType::Source), None)
            .is_some_and(|m| m.contains_key("xy-edge__a-b"))
    );

    // The same connection again is a no-op.
    engine.add_edge(&connection).unwrap();
    assert_eq!(engine.edges().len(), 1);
}

#[test]
fn test_click_connect_rejects_same_role() {
    let mut engine = two_nodes().build();
    engine.click_connect("a", HandleType::Source, None).unwrap();
    assert_eq!(engine.click_connect("b", HandleType::Source, None).unwrap(), None);
    assert_eq!(connect_end(&engine.take_events()).is_valid, Some(false));
}

// ============================================================================
// Auto-pan
// ============================================================================

#[test]
fn test_connection_auto_pans_near_edge() {
    let mut engine = two_nodes().build();
    engine
        .begin_connection(&pointer(100.0, 25.0), "a", HandleType::Source, None)
        .unwrap();
    engine.pointer_move(&pointer(795.0, 300.0));
    assert!(engine.needs_frame());
    engine.take_events();

    engine.frame(Instant::now());
    // (40 - 5) / 40 * 15 toward the left.
    assert_eq!(engine.viewport().x, -13.125);
    let state = engine.connection_state(0).expect("connection in progress");
    assert_eq!(state.to, XYPosition::new(808.125, 300.0));
    assert_eq!(
        event_names(&engine.take_events()),
        vec!["viewportChange", "connectionUpdate"]
    );
}

#[test]
fn test_connection_auto_pan_disabled() {
    let mut engine = two_nodes()
        .configure(|c| c.auto_pan_on_connect = false)
        .build();
    engine
        .begin_connection(&pointer(100.0, 25.0), "a", HandleType::Source, None)
        .unwrap();
    engine.pointer_move(&pointer(795.0, 300.0));
    assert!(!engine.needs_frame());
}
