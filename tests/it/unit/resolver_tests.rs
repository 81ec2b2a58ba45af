//! Tests for absolute position resolution over the parent tree.
//!
//! Covers parent clamping, z inheritance, structural error reporting and the
//! idempotence / containment properties of a resolution pass.

use crate::helpers::measured_node;
use flowboard::error::{ErrorKind, ErrorReporter};
use flowboard::resolver::{NodeMeasurement, NodeResolver, NodeUpdate, ResolveOptions};
use flowboard::{Dimensions, EngineError, Node, NodeChange, NodeExtent, XYPosition};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

fn resolver_with(nodes: Vec<Node>, reporter: &mut ErrorReporter) -> NodeResolver {
    let mut resolver = NodeResolver::new();
    resolver.set_nodes(nodes.into_iter().map(Arc::new).collect());
    resolver.ensure_resolved(&ResolveOptions::default(), reporter);
    resolver
}

fn collecting_reporter() -> (ErrorReporter, Rc<RefCell<Vec<EngineError>>>) {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    let reporter = ErrorReporter::with_sink(move |e| sink.borrow_mut().push(e.clone()));
    (reporter, errors)
}

fn child_of(parent: &str, mut node: Node) -> Node {
    node.parent_id = Some(parent.to_string());
    node
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_parent_extent_child_clamped_to_parent_origin() {
    let mut reporter = ErrorReporter::new();
    let mut child = child_of("p", measured_node("c", -10.0, -10.0, 20.0, 20.0));
    child.extent = Some(NodeExtent::Parent);
    let resolver = resolver_with(vec![measured_node("p", 0.0, 0.0, 100.0, 100.0), child], &mut reporter);

    let c = resolver.get("c").unwrap();
    assert_eq!(c.internals.position_absolute, XYPosition::new(0.0, 0.0));
}

#[test]
fn test_nested_positions_accumulate() {
    let mut reporter = ErrorReporter::new();
    let nodes = vec![
        measured_node("a", 100.0, 100.0, 300.0, 300.0),
        child_of("a", measured_node("b", 20.0, 30.0, 200.0, 200.0)),
        child_of("b", measured_node("c", 5.0, 5.0, 10.0, 10.0)),
    ];
    let resolver = resolver_with(nodes, &mut reporter);
    assert_eq!(
        resolver.get("c").unwrap().internals.position_absolute,
        XYPosition::new(125.0, 135.0)
    );
}

#[test]
fn test_node_origin_shifts_absolute_position() {
    let mut reporter = ErrorReporter::new();
    let mut node = measured_node("a", 100.0, 100.0, 40.0, 20.0);
    node.origin = Some([0.5, 0.5]);
    let resolver = resolver_with(vec![node], &mut reporter);
    assert_eq!(
        resolver.get("a").unwrap().internals.position_absolute,
        XYPosition::new(80.0, 90.0)
    );
}

#[test]
fn test_unchanged_nodes_keep_their_resolved_entry() {
    let mut reporter = ErrorReporter::new();
    let nodes: Vec<Arc<Node>> = vec![
        Arc::new(measured_node("a", 0.0, 0.0, 10.0, 10.0)),
        Arc::new(measured_node("b", 50.0, 0.0, 10.0, 10.0)),
    ];
    let mut resolver = NodeResolver::new();
    resolver.set_nodes(nodes.clone());
    resolver.ensure_resolved(&ResolveOptions::default(), &mut reporter);
    let before_a = resolver.get("a").unwrap().clone();
    let before_b = resolver.get("b").unwrap().clone();

    let moved = Arc::new(measured_node("b", 60.0, 0.0, 10.0, 10.0));
    resolver.set_nodes(vec![nodes[0].clone(), moved]);
    resolver.ensure_resolved(&ResolveOptions::default(), &mut reporter);

    assert!(Arc::ptr_eq(resolver.get("a").unwrap(), &before_a));
    assert!(!Arc::ptr_eq(resolver.get("b").unwrap(), &before_b));
}

#[test]
fn test_lazy_resolution_runs_once() {
    let mut reporter = ErrorReporter::new();
    let mut resolver = NodeResolver::new();
    resolver.set_nodes(vec![Arc::new(measured_node("a", 0.0, 0.0, 10.0, 10.0))]);
    resolver.set_nodes(vec![Arc::new(measured_node("a", 5.0, 0.0, 10.0, 10.0))]);

    assert!(resolver.is_dirty());
    assert!(resolver.ensure_resolved(&ResolveOptions::default(), &mut reporter));
    assert!(!resolver.ensure_resolved(&ResolveOptions::default(), &mut reporter));
    assert_eq!(
        resolver.get("a").unwrap().internals.position_absolute,
        XYPosition::new(5.0, 0.0)
    );
}

#[test]
fn test_selection_elevates_without_flag() {
    let mut reporter = ErrorReporter::new();
    let mut node = measured_node("a", 0.0, 0.0, 10.0, 10.0);
    node.selected = true;
    node.z_index = Some(3);

    let mut resolver = NodeResolver::new();
    resolver.set_nodes(vec![Arc::new(node)]);
    let options = ResolveOptions {
        elevate_nodes_on_select: false,
        ..ResolveOptions::default()
    };
    resolver.ensure_resolved(&options, &mut reporter);
    assert_eq!(resolver.get("a").unwrap().internals.z, 3);
}

// ============================================================================
// Structural errors
// ============================================================================

#[test]
fn test_missing_parent_is_reported_and_treated_as_root() {
    let (mut reporter, errors) = collecting_reporter();
    let resolver = resolver_with(vec![child_of("ghost", measured_node("c", 10.0, 10.0, 5.0, 5.0))], &mut reporter);

    assert_eq!(
        resolver.get("c").unwrap().internals.position_absolute,
        XYPosition::new(10.0, 10.0)
    );
    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::Structural);
    assert!(matches!(&errors[0], EngineError::MissingParent { parent_id, .. } if parent_id == "ghost"));
}

#[test]
fn test_child_before_parent_is_reported() {
    let (mut reporter, errors) = collecting_reporter();
    let nodes = vec![
        child_of("p", measured_node("c", 10.0, 10.0, 5.0, 5.0)),
        measured_node("p", 100.0, 100.0, 50.0, 50.0),
    ];
    resolver_with(nodes, &mut reporter);
    assert!(matches!(
        errors.borrow().first(),
        Some(EngineError::ParentNotResolved { node_id, .. }) if node_id == "c"
    ));
}

#[test]
fn test_parent_cycle_is_reported_once_per_node() {
    let (mut reporter, errors) = collecting_reporter();
    let nodes = vec![
        child_of("b", measured_node("a", 0.0, 0.0, 5.0, 5.0)),
        child_of("a", measured_node("b", 0.0, 0.0, 5.0, 5.0)),
    ];
    let mut resolver = resolver_with(nodes, &mut reporter);
    resolver.mark_dirty();
    resolver.ensure_resolved(&ResolveOptions::default(), &mut reporter);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, EngineError::ParentCycle { .. })));
    assert_eq!(resolver.len(), 2);
}

// ============================================================================
// Measurement
// ============================================================================

#[test]
fn test_measurement_emits_dimension_change_and_expands_parent() {
    let mut reporter = ErrorReporter::new();
    let mut child = child_of("p", Node::new("c", 80.0, 80.0));
    child.expand_parent = true;
    let mut resolver = resolver_with(vec![measured_node("p", 0.0, 0.0, 100.0, 100.0), child], &mut reporter);

    let mut provider = |id: &str| {
        (id == "c").then(|| NodeMeasurement {
            dimensions: Dimensions::new(50.0, 50.0),
            handles: Vec::new(),
        })
    };
    let changes = resolver.update_node_internals(
        &[NodeUpdate::new("c")],
        &mut provider,
        &ResolveOptions::default(),
        &mut reporter,
    );

    assert!(changes.contains(&NodeChange::Dimensions {
        id: "c".into(),
        dimensions: Some(Dimensions::new(50.0, 50.0)),
        resizing: None,
        set_attributes: false,
    }));
    assert!(changes.iter().any(|c| matches!(
        c,
        NodeChange::Dimensions { id, dimensions: Some(d), set_attributes: true, .. }
            if id == "p" && d.width == 130.0 && d.height == 130.0
    )));
}

#[test]
fn test_unchanged_measurement_is_a_no_op() {
    let mut reporter = ErrorReporter::new();
    let mut node = measured_node("a", 0.0, 0.0, 10.0, 10.0);
    node.handles = crate::helpers::side_handles(&node);
    let mut resolver = resolver_with(vec![node], &mut reporter);

    let mut provider = |_: &str| {
        Some(NodeMeasurement {
            dimensions: Dimensions::new(10.0, 10.0),
            handles: Vec::new(),
        })
    };
    let changes = resolver.update_node_internals(
        &[NodeUpdate::new("a")],
        &mut provider,
        &ResolveOptions::default(),
        &mut reporter,
    );
    assert!(changes.is_empty());
}

// ============================================================================
// Properties
// ============================================================================

/// One generated node: position, size factors, optional parent pick, flags.
type NodeSeed = (f64, f64, f64, f64, Option<usize>, bool, bool);

fn seed_strategy() -> impl Strategy<Value = Vec<NodeSeed>> {
    prop::collection::vec(
        (
            -500.0..500.0f64,
            -500.0..500.0f64,
            0.1..1.0f64,
            0.1..1.0f64,
            prop::option::of(0usize..16),
            any::<bool>(),
            any::<bool>(),
        ),
        1..14,
    )
}

/// Nodes in parent-before-child order. Children are never larger than their
/// parent, so a parent box can always hold them.
fn build_tree(seeds: &[NodeSeed]) -> Vec<Node> {
    let mut nodes: Vec<Node> = Vec::with_capacity(seeds.len());
    for (i, &(x, y, fw, fh, parent, parent_extent, selected)) in seeds.iter().enumerate() {
        let parent = parent.filter(|_| i > 0).map(|p| p % i);
        let (width, height) = match parent {
            Some(p) => {
                let size = nodes[p].dimensions();
                (size.width * fw, size.height * fh)
            }
            None => (50.0 + fw * 300.0, 50.0 + fh * 300.0),
        };
        let mut node = measured_node(&format!("n{i}"), x, y, width, height);
        node.selected = selected;
        if let Some(p) = parent {
            node.parent_id = Some(nodes[p].id.clone());
            if parent_extent {
                node.extent = Some(NodeExtent::Parent);
            }
        }
        nodes.push(node);
    }
    nodes
}

proptest! {
    #[test]
    fn resolution_is_idempotent(seeds in seed_strategy()) {
        let mut reporter = ErrorReporter::new();
        let mut resolver = resolver_with(build_tree(&seeds), &mut reporter);
        let first: Vec<(XYPosition, i32)> = resolver
            .iter()
            .map(|n| (n.internals.position_absolute, n.internals.z))
            .collect();

        resolver.mark_dirty();
        resolver.ensure_resolved(&ResolveOptions::default(), &mut reporter);
        let second: Vec<(XYPosition, i32)> = resolver
            .iter()
            .map(|n| (n.internals.position_absolute, n.internals.z))
            .collect();

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert_eq!(a.0.x.to_bits(), b.0.x.to_bits());
            prop_assert_eq!(a.0.y.to_bits(), b.0.y.to_bits());
            prop_assert_eq!(a.1, b.1);
        }
    }
}

proptest! {
    #[test]
    fn parent_extent_children_stay_inside_parent(seeds in seed_strategy()) {
        let mut reporter = ErrorReporter::new();
        let resolver = resolver_with(build_tree(&seeds), &mut reporter);

        for node in resolver.iter() {
            if !node.user_node.has_parent_extent() {
                continue;
            }
            let parent = resolver.get(node.parent_id().unwrap()).unwrap();
            let (child, outer) = (node.rect(), parent.rect());
            prop_assert!(child.x >= outer.x - 1e-6, "{:?} left of {:?}", child, outer);
            prop_assert!(child.y >= outer.y - 1e-6, "{:?} above {:?}", child, outer);
            prop_assert!(child.right() <= outer.right() + 1e-6, "{:?} right of {:?}", child, outer);
            prop_assert!(child.bottom() <= outer.bottom() + 1e-6, "{:?} below {:?}", child, outer);
        }
    }
}

proptest! {
    #[test]
    fn children_never_below_parent_z(seeds in seed_strategy()) {
        let mut reporter = ErrorReporter::new();
        let resolver = resolver_with(build_tree(&seeds), &mut reporter);
        for node in resolver.iter() {
            if let Some(parent) = node.parent_id().and_then(|p| resolver.get(p)) {
                prop_assert!(node.internals.z >= parent.internals.z);
            }
        }
    }
}
