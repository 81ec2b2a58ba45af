//! Graph queries and edge helpers.

use crate::error::{EngineError, EngineResult};
use crate::geometry::{Bounds, Rect, XYPosition, overlapping_area};
use crate::resolver::NodeResolver;
use crate::types::{Connection, Edge, InternalNode, Node};
use crate::viewport::Transform;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Bounding rect of the given nodes' absolute boxes. Empty when none.
pub fn nodes_bounds<'a, I>(nodes: I) -> Rect
where
    I: IntoIterator<Item = &'a Arc<InternalNode>>,
{
    let bounds = nodes
        .into_iter()
        .fold(Bounds::EMPTY, |acc, node| acc.union(&node.rect().to_bounds()));
    if bounds.is_empty() {
        Rect::default()
    } else {
        bounds.to_rect()
    }
}

/// Ids of nodes inside a screen-space selection rect.
///
/// With `partially` any overlap counts, otherwise the node must be fully
/// covered. Unmeasured nodes and nodes being dragged always count.
pub fn nodes_inside(
    resolver: &NodeResolver,
    rect: Rect,
    transform: &Transform,
    partially: bool,
    exclude_non_selectable: bool,
) -> Vec<String> {
    let origin = transform.invert(XYPosition::new(rect.x, rect.y));
    let pane_rect = Rect::new(origin.x, origin.y, rect.width / transform.k, rect.height / transform.k);

    resolver
        .iter()
        .filter(|node| !node.user_node.hidden)
        .filter(|node| !exclude_non_selectable || node.is_selectable())
        .filter(|node| {
            let node_rect = node.rect();
            let overlap = overlapping_area(&pane_rect, &node_rect);
            let area = node_rect.width * node_rect.height;
            !node.has_dimensions()
                || (partially && overlap > 0.0)
                || overlap >= area
                || node.user_node.dragging
        })
        .map(|node| node.id().to_string())
        .collect()
}

/// Edges with either end on one of `node_ids`.
pub fn connected_edges<'a>(node_ids: &[&str], edges: &'a [Arc<Edge>]) -> Vec<&'a Arc<Edge>> {
    let ids: HashSet<&str> = node_ids.iter().copied().collect();
    edges
        .iter()
        .filter(|e| ids.contains(e.source.as_str()) || ids.contains(e.target.as_str()))
        .collect()
}

/// Nodes reached by edges leaving `node_id`.
pub fn outgoers<'a>(node_id: &str, nodes: &'a [Arc<Node>], edges: &[Arc<Edge>]) -> Vec<&'a Arc<Node>> {
    let targets: HashSet<&str> = edges
        .iter()
        .filter(|e| e.source == node_id)
        .map(|e| e.target.as_str())
        .collect();
    nodes.iter().filter(|n| targets.contains(n.id.as_str())).collect()
}

/// Nodes with edges arriving at `node_id`.
pub fn incomers<'a>(node_id: &str, nodes: &'a [Arc<Node>], edges: &[Arc<Edge>]) -> Vec<&'a Arc<Node>> {
    let sources: HashSet<&str> = edges
        .iter()
        .filter(|e| e.target == node_id)
        .map(|e| e.source.as_str())
        .collect();
    nodes.iter().filter(|n| sources.contains(n.id.as_str())).collect()
}

/// Deterministic id for an edge created from `connection`.
pub fn edge_id(connection: &Connection) -> String {
    format!(
        "xy-edge__{}{}-{}{}",
        connection.source,
        connection.source_handle.as_deref().unwrap_or(""),
        connection.target,
        connection.target_handle.as_deref().unwrap_or("")
    )
}

fn connection_exists(connection: &Connection, edges: &[Arc<Edge>]) -> bool {
    edges.iter().any(|e| {
        e.source == connection.source
            && e.target == connection.target
            && e.source_handle == connection.source_handle
            && e.target_handle == connection.target_handle
    })
}

fn check_complete(connection: &Connection) -> EngineResult<()> {
    if connection.source.is_empty() || connection.target.is_empty() {
        return Err(EngineError::IncompleteEdge {
            edge_id: edge_id(connection),
        });
    }
    Ok(())
}

/// Append an edge for `connection` unless an identical one exists.
pub fn add_edge(connection: &Connection, edges: &[Arc<Edge>]) -> EngineResult<Vec<Arc<Edge>>> {
    check_complete(connection)?;
    if connection_exists(connection, edges) {
        debug!(source = %connection.source, target = %connection.target, "Edge already exists");
        return Ok(edges.to_vec());
    }

    let edge = Edge {
        id: edge_id(connection),
        source: connection.source.clone(),
        target: connection.target.clone(),
        source_handle: connection.source_handle.clone(),
        target_handle: connection.target_handle.clone(),
        ..Default::default()
    };
    let mut next = edges.to_vec();
    next.push(Arc::new(edge));
    Ok(next)
}

/// Rewire edge `old_edge_id` to `connection`.
///
/// The edge moves to the end of the list. With `replace_id` it gets the id a
/// new edge for `connection` would have.
pub fn reconnect_edge(
    old_edge_id: &str,
    connection: &Connection,
    edges: &[Arc<Edge>],
    replace_id: bool,
) -> EngineResult<Vec<Arc<Edge>>> {
    check_complete(connection)?;
    let old = edges
        .iter()
        .find(|e| e.id == old_edge_id)
        .ok_or_else(|| EngineError::UnknownEdge {
            edge_id: old_edge_id.to_string(),
        })?;

    let edge = Edge {
        id: if replace_id {
            edge_id(connection)
        } else {
            old_edge_id.to_string()
        },
        source: connection.source.clone(),
        target: connection.target.clone(),
        source_handle: connection.source_handle.clone(),
        target_handle: connection.target_handle.clone(),
        ..(**old).clone()
    };

    let mut next: Vec<Arc<Edge>> = edges.iter().filter(|e| e.id != old_edge_id).cloned().collect();
    next.push(Arc::new(edge));
    Ok(next)
}
