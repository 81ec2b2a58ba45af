//! Tests for the edge lookup by node, role and handle.

use flowboard::connection_index::ConnectionIndex;
use flowboard::error::ErrorReporter;
use flowboard::{Edge, HandleType};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn index(edges: &[Edge]) -> ConnectionIndex {
    let edges: Vec<Arc<Edge>> = edges.iter().cloned().map(Arc::new).collect();
    ConnectionIndex::from_edges(&edges, &mut ErrorReporter::new())
}

fn ids(map: Option<&flowboard::connection_index::ConnectionMap>) -> Vec<&str> {
    map.map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[test]
fn test_scopes() {
    let index = index(&[
        Edge::new("e1", "a", "b").with_handles(Some("out"), Some("in")),
        Edge::new("e2", "a", "c"),
        Edge::new("e3", "c", "a").with_handles(None, Some("in")),
    ]);

    assert_eq!(ids(index.by_node("a")), vec!["e1", "e2", "e3"]);
    assert_eq!(ids(index.by_role("a", HandleType::Source)), vec!["e1", "e2"]);
    assert_eq!(ids(index.by_role("a", HandleType::Target)), vec!["e3"]);
    assert_eq!(ids(index.by_handle("a", HandleType::Source, "out")), vec!["e1"]);
    assert_eq!(ids(index.by_handle("a", HandleType::Target, "in")), vec!["e3"]);
    assert!(index.by_node("missing").is_none());
}

#[test]
fn test_query_picks_scope_from_arguments() {
    let index = index(&[Edge::new("e1", "a", "b").with_handles(Some("out"), None)]);
    assert_eq!(ids(index.query("a", None, None)), vec!["e1"]);
    assert_eq!(ids(index.query("b", Some(HandleType::Target), None)), vec!["e1"]);
    assert_eq!(ids(index.query("a", Some(HandleType::Source), Some("out"))), vec!["e1"]);
    assert!(index.query("a", Some(HandleType::Source), Some("other")).is_none());
}

#[test]
fn test_self_loop_listed_once_per_scope() {
    let index = index(&[Edge::new("loop", "a", "a")]);
    assert_eq!(ids(index.by_node("a")), vec!["loop"]);
    assert_eq!(ids(index.by_role("a", HandleType::Source)), vec!["loop"]);
    assert_eq!(ids(index.by_role("a", HandleType::Target)), vec!["loop"]);
}

#[test]
fn test_incomplete_edges_are_skipped() {
    let reported = std::rc::Rc::new(std::cell::RefCell::new(0));
    let count = reported.clone();
    let mut reporter = ErrorReporter::with_sink(move |_| *count.borrow_mut() += 1);
    let edges = vec![Arc::new(Edge::new("bad", "a", "")), Arc::new(Edge::new("ok", "a", "b"))];
    let index = ConnectionIndex::from_edges(&edges, &mut reporter);

    assert_eq!(index.edge_count(), 1);
    assert!(index.edge("bad").is_none());
    assert_eq!(*reported.borrow(), 1);
}

#[test]
fn test_rebuild_drops_old_edges() {
    let mut index = index(&[Edge::new("e1", "a", "b")]);
    index.rebuild(&[Arc::new(Edge::new("e2", "b", "c"))], &mut ErrorReporter::new());
    assert!(index.by_node("a").is_none());
    assert_eq!(ids(index.by_node("b")), vec!["e2"]);
}

#[test]
fn snapshot_handle_connection() {
    let index = index(&[Edge::new("e1", "a", "b").with_handles(Some("out"), None)]);
    let connection = &index.by_node("a").unwrap()["e1"];
    insta::assert_snapshot!(
        serde_json::to_string(connection).unwrap(),
        @r#"{"edgeId":"e1","source":"a","target":"b","sourceHandle":"out","targetHandle":null}"#
    );
}

// ============================================================================
// Properties
// ============================================================================

const NODES: [&str; 5] = ["n0", "n1", "n2", "n3", "n4"];
const HANDLES: [Option<&str>; 3] = [None, Some("h0"), Some("h1")];

fn edges_strategy() -> impl Strategy<Value = Vec<Edge>> {
    prop::collection::vec((0usize..5, 0usize..5, 0usize..3, 0usize..3), 0..20).prop_map(|seeds| {
        seeds
            .into_iter()
            .enumerate()
            .map(|(i, (s, t, sh, th))| {
                Edge::new(format!("e{i}"), NODES[s], NODES[t]).with_handles(HANDLES[sh], HANDLES[th])
            })
            .collect()
    })
}

fn id_set(map: Option<&flowboard::connection_index::ConnectionMap>) -> BTreeSet<String> {
    map.map(|m| m.keys().cloned().collect()).unwrap_or_default()
}

fn expected(edges: &[Edge], keep: impl Fn(&Edge) -> bool) -> BTreeSet<String> {
    edges.iter().filter(|e| keep(e)).map(|e| e.id.clone()).collect()
}

proptest! {
    #[test]
    fn node_scope_matches_edge_endpoints(edges in edges_strategy()) {
        let index = index(&edges);
        for node in NODES {
            prop_assert_eq!(
                id_set(index.by_node(node)),
                expected(&edges, |e| e.source == node || e.target == node)
            );
        }
    }
}

proptest! {
    #[test]
    fn role_and_handle_scopes_match_edges(edges in edges_strategy()) {
        let index = index(&edges);
        for node in NODES {
            prop_assert_eq!(
                id_set(index.by_role(node, HandleType::Source)),
                expected(&edges, |e| e.source == node)
            );
            prop_assert_eq!(
                id_set(index.by_role(node, HandleType::Target)),
                expected(&edges, |e| e.target == node)
            );
            for handle in HANDLES.into_iter().flatten() {
                prop_assert_eq!(
                    id_set(index.by_handle(node, HandleType::Source, handle)),
                    expected(&edges, |e| e.source == node && e.source_handle.as_deref() == Some(handle))
                );
                prop_assert_eq!(
                    id_set(index.by_handle(node, HandleType::Target, handle)),
                    expected(&edges, |e| e.target == node && e.target_handle.as_deref() == Some(handle))
                );
            }
        }
    }
}
